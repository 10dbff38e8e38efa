//! High-level operations over the three remote services.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::apigateway::api::{Deployment, RestApi, Stage};
use crate::apigateway::http::HttpApiGateway;
use crate::apigateway::types::{
    CreateDeploymentRequest, CreateRestApiRequest, PatchOperation, UpdateRestApiRequest,
};
use crate::apigateway::ApiGatewayClient;
use crate::config::{ApiGatewaySpec, ConnectionSettings, Document, FunctionSpec};
use crate::credentials;
use crate::error::{Error, Result};
use crate::iam::http::HttpIam;
use crate::iam::IamClient;
use crate::lambda::http::HttpLambda;
use crate::lambda::types::{
    AddPermissionRequest, AddPermissionResponse, CreateFunctionRequest, FunctionCode,
    FunctionConfiguration, UpdateFunctionCodeRequest, UpdateFunctionConfigurationRequest,
};
use crate::lambda::LambdaClient;
use crate::normalize;
use crate::poll::PollPolicy;
use crate::reconcile::{reconcile_methods, reconcile_resources};
use crate::transport::{service_endpoint, Transport};

/// Statement id of the invoke grant; replaced on every run.
pub const STATEMENT_ID: &str = "ExecuteFromApiGateway";
pub const DEFAULT_RUNTIME: &str = "nodejs20.x";
const INVOKE_ACTION: &str = "lambda:InvokeFunction";
const INVOKE_PRINCIPAL: &str = "apigateway.amazonaws.com";

#[derive(Clone)]
pub struct Clients {
    pub apigateway: Arc<dyn ApiGatewayClient>,
    pub lambda: Arc<dyn LambdaClient>,
    pub iam: Arc<dyn IamClient>,
}

impl Clients {
    /// Network-backed clients sharing one signed transport.
    pub fn http(settings: &ConnectionSettings) -> Result<Clients> {
        let credentials = credentials::resolve(settings)?;
        if credentials.is_none() {
            warn!("no credentials found, requests will be sent unsigned");
        }
        let region = settings.region.as_str();
        let endpoint = settings.endpoint.as_deref();
        let transport = Arc::new(Transport::new(region, credentials));
        Ok(Clients {
            apigateway: Arc::new(HttpApiGateway::new(
                transport.clone(),
                service_endpoint("apigateway", region, endpoint),
            )),
            lambda: Arc::new(HttpLambda::new(
                transport.clone(),
                service_endpoint("lambda", region, endpoint),
            )),
            iam: Arc::new(HttpIam::new(
                transport,
                service_endpoint("iam", region, endpoint),
            )),
        })
    }
}

pub struct Deployer {
    document: Document,
    clients: Clients,
    policy: PollPolicy,
}

impl Deployer {
    pub fn new(document: Document, clients: Clients) -> Self {
        let policy = document.config.consistency.poll_policy();
        Deployer {
            document,
            clients,
            policy,
        }
    }

    fn api_spec(&self) -> Result<&ApiGatewaySpec> {
        self.document.api_gateway.as_ref().ok_or_else(|| {
            Error::Configuration("the configuration has no apiGateway section".to_string())
        })
    }

    fn function_spec(&self) -> Result<&FunctionSpec> {
        self.document
            .lambda
            .as_ref()
            .ok_or_else(|| Error::Configuration("the configuration has no lambda section".to_string()))
    }

    async fn find_api(&self) -> Result<RestApi> {
        let name = &self.api_spec()?.name;
        self.clients
            .apigateway
            .find_rest_api_by_name(name)
            .await?
            .ok_or_else(|| Error::not_found("restApi", name))
    }

    async fn fetch_or_create_api(&self, spec: &ApiGatewaySpec) -> Result<RestApi> {
        let client = &self.clients.apigateway;
        let Some(api) = client.find_rest_api_by_name(&spec.name).await? else {
            info!(name = %spec.name, "creating API");
            let api = client
                .create_rest_api(CreateRestApiRequest {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                })
                .await?;
            return Ok(api);
        };
        match &spec.description {
            Some(description) if api.description.as_ref() != Some(description) => {
                info!(name = %spec.name, "updating API description");
                let api = client
                    .update_rest_api(
                        &api.id,
                        UpdateRestApiRequest {
                            patch_operations: vec![PatchOperation::replace(
                                "/description",
                                Some(description.clone()),
                            )],
                        },
                    )
                    .await?;
                Ok(api)
            }
            _ => Ok(api),
        }
    }

    async fn get_function(&self, function_name: &str) -> Result<FunctionConfiguration> {
        match self.clients.lambda.get_function(function_name).await {
            Ok(function) => Ok(function),
            Err(e) if e.is_not_found() => Err(Error::not_found("function", function_name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Converges the remote API with the configured resource tree, creating
    /// the API first when none carries the configured name.
    pub async fn update_api(&self) -> Result<RestApi> {
        let spec = self.api_spec()?;
        let mut tree = normalize::desired_tree(spec)?;
        let lambda_arn = if normalize::uses_lambda(&tree) {
            let function = self.function_spec()?;
            Some(self.get_function(&function.function_name).await?.function_arn)
        } else {
            None
        };
        normalize::finish(
            &mut tree,
            &self.document.config.region,
            lambda_arn.as_deref(),
            &self.document.base_dir,
        )?;

        let client = self.clients.apigateway.as_ref();
        let api = self.fetch_or_create_api(spec).await?;
        let resources = reconcile_resources(client, &api, &tree, &self.policy).await?;
        for resource in &resources {
            let Some(methods) = tree.get(&resource.path) else {
                continue;
            };
            reconcile_methods(client, resource, methods).await?;
        }
        info!(name = %api.name, id = %api.id, "API converged");
        Ok(api)
    }

    pub async fn deploy_api(
        &self,
        description: Option<String>,
        stage_name: &str,
        stage_description: Option<String>,
    ) -> Result<Deployment> {
        let api = self.find_api().await?;
        info!(name = %api.name, stage = %stage_name, "creating deployment");
        let deployment = self
            .clients
            .apigateway
            .create_deployment(
                &api.id,
                CreateDeploymentRequest {
                    stage_name: Some(stage_name.to_string()),
                    stage_description,
                    description,
                },
            )
            .await?;
        Ok(deployment)
    }

    pub async fn get_api_stages(&self) -> Result<Vec<Stage>> {
        let api = self.find_api().await?;
        let mut stages = self.clients.apigateway.get_stages(&api.id).await?;
        stages.sort_by(|a, b| a.stage_name.cmp(&b.stage_name));
        Ok(stages)
    }

    /// Creates the configured function from `archive`, or updates its
    /// configuration and then its code when it already exists.
    pub async fn publish_function(&self, archive: &[u8]) -> Result<FunctionConfiguration> {
        let spec = self.function_spec()?;
        let role = match self.clients.iam.get_role(&spec.role_name).await {
            Ok(role) => role,
            Err(e) if e.is_not_found() => return Err(Error::not_found("role", &spec.role_name)),
            Err(e) => return Err(e.into()),
        };
        debug!(role = %role.arn, "resolved execution role");

        let lambda = &self.clients.lambda;
        match lambda.get_function(&spec.function_name).await {
            Ok(_) => {
                info!(function = %spec.function_name, "updating function configuration");
                lambda
                    .update_function_configuration(UpdateFunctionConfigurationRequest {
                        function_name: spec.function_name.clone(),
                        role: role.arn,
                        settings: spec.settings.clone(),
                    })
                    .await?;
                info!(function = %spec.function_name, "updating function code");
                let function = lambda
                    .update_function_code(
                        &spec.function_name,
                        UpdateFunctionCodeRequest {
                            zip_file: archive.to_vec(),
                        },
                    )
                    .await?;
                Ok(function)
            }
            Err(e) if e.is_not_found() => {
                let mut settings = spec.settings.clone();
                settings
                    .runtime
                    .get_or_insert_with(|| DEFAULT_RUNTIME.to_string());
                info!(function = %spec.function_name, "creating function");
                let function = lambda
                    .create_function(CreateFunctionRequest {
                        function_name: spec.function_name.clone(),
                        role: role.arn,
                        code: FunctionCode {
                            zip_file: archive.to_vec(),
                        },
                        settings,
                    })
                    .await?;
                Ok(function)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lets the API service invoke the configured function from any API in
    /// the function's account and region.
    pub async fn grant_invoke_permission(&self) -> Result<AddPermissionResponse> {
        let spec = self.function_spec()?;
        let function = self.get_function(&spec.function_name).await?;
        let account_id = function.account_id().ok_or_else(|| {
            Error::Configuration(format!(
                "cannot read an account id from {}",
                function.function_arn
            ))
        })?;
        let source_arn = format!(
            "arn:aws:execute-api:{}:{}:*",
            self.document.config.region, account_id
        );

        let lambda = &self.clients.lambda;
        if let Err(e) = lambda
            .remove_permission(&spec.function_name, STATEMENT_ID)
            .await
        {
            warn!(function = %spec.function_name, error = %e, "could not remove previous permission");
        }
        info!(function = %spec.function_name, "granting invoke permission");
        let granted = lambda
            .add_permission(
                &spec.function_name,
                AddPermissionRequest {
                    statement_id: STATEMENT_ID.to_string(),
                    action: INVOKE_ACTION.to_string(),
                    principal: INVOKE_PRINCIPAL.to_string(),
                    source_arn: Some(source_arn),
                },
            )
            .await?;
        Ok(granted)
    }
}
