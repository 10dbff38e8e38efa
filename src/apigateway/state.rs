use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::api::{
    Deployment, Integration, IntegrationResponse, Method, MethodKey, MethodResponse, Resource,
    ResourceKey, RestApi, Stage,
};
use super::client::ApiGatewayClient;
use super::error::ApiGatewayError;
use super::types::*;
use crate::journal::RecordedCall;

fn short_id() -> String {
    Uuid::new_v4()
        .to_string()
        .replace('-', "")
        .chars()
        .take(10)
        .collect()
}

struct StoredResource {
    resource: Resource,
    methods: BTreeMap<String, Method>,
    hidden_reads: u32,
}

struct StoredApi {
    api: RestApi,
    resources: HashMap<String, StoredResource>,
    // Deleted resources listings keep reporting while lagging.
    tombstones: Vec<(Resource, u32)>,
    deployments: HashMap<String, Deployment>,
    stages: BTreeMap<String, Stage>,
    resource_counter: u64,
}

struct ApiGatewayStateInner {
    apis: HashMap<String, StoredApi>,
    region: String,
    read_lag: u32,
    calls: Vec<RecordedCall>,
    failures: HashMap<&'static str, ApiGatewayError>,
}

impl ApiGatewayStateInner {
    fn record(&mut self, operation: &'static str, target: impl Into<String>) {
        self.calls.push(RecordedCall {
            operation,
            target: target.into(),
        });
    }

    fn check(
        &mut self,
        operation: &'static str,
        target: impl Into<String>,
    ) -> Result<(), ApiGatewayError> {
        self.record(operation, target);
        match self.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct ApiGatewayState {
    inner: Arc<Mutex<ApiGatewayStateInner>>,
}

impl ApiGatewayState {
    pub fn new(region: String) -> Self {
        ApiGatewayState {
            inner: Arc::new(Mutex::new(ApiGatewayStateInner {
                apis: HashMap::new(),
                region,
                read_lag: 0,
                calls: Vec::new(),
                failures: HashMap::new(),
            })),
        }
    }

    pub async fn set_read_lag(&self, lag: u32) {
        self.inner.lock().await.read_lag = lag;
    }

    pub async fn fail_next(&self, operation: &'static str, err: ApiGatewayError) {
        self.inner.lock().await.failures.insert(operation, err);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn writes(&self) -> Vec<RecordedCall> {
        self.calls()
            .await
            .into_iter()
            .filter(RecordedCall::is_write)
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }
}

#[async_trait]
impl ApiGatewayClient for ApiGatewayState {
    // --- REST APIs ---

    async fn get_rest_apis(&self) -> Result<Vec<RestApi>, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("get_rest_apis", "")?;
        let mut apis: Vec<RestApi> = state.apis.values().map(|s| s.api.clone()).collect();
        apis.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apis)
    }

    async fn create_rest_api(
        &self,
        req: CreateRestApiRequest,
    ) -> Result<RestApi, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("create_rest_api", req.name.clone())?;
        let id = short_id();
        let api = RestApi {
            id: id.clone(),
            name: req.name,
            description: req.description,
        };
        let root_id = short_id();
        let root = StoredResource {
            resource: Resource {
                rest_api_id: id.clone(),
                id: root_id.clone(),
                parent_id: None,
                path_part: None,
                path: "/".to_string(),
                resource_methods: Default::default(),
            },
            methods: BTreeMap::new(),
            hidden_reads: 0,
        };
        let mut resources = HashMap::new();
        resources.insert(root_id, root);
        state.apis.insert(
            id,
            StoredApi {
                api: api.clone(),
                resources,
                tombstones: Vec::new(),
                deployments: HashMap::new(),
                stages: BTreeMap::new(),
                resource_counter: 1,
            },
        );
        Ok(api)
    }

    async fn update_rest_api(
        &self,
        rest_api_id: &str,
        req: UpdateRestApiRequest,
    ) -> Result<RestApi, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("update_rest_api", rest_api_id)?;
        let stored = get_api_mut(&mut state.apis, rest_api_id)?;
        for op in req.patch_operations {
            match (op.op.as_str(), op.path.as_str()) {
                ("replace", "/name") => {
                    if let Some(v) = op.value {
                        stored.api.name = v;
                    }
                }
                ("replace", "/description") => {
                    stored.api.description = op.value;
                }
                (_, path) => {
                    return Err(ApiGatewayError::BadRequestException(format!(
                        "Invalid patch path {}",
                        path
                    )))
                }
            }
        }
        Ok(stored.api.clone())
    }

    // --- Resources ---

    async fn get_resources(&self, rest_api_id: &str) -> Result<Vec<Resource>, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("get_resources", rest_api_id)?;
        let stored = get_api_mut(&mut state.apis, rest_api_id)?;

        let mut resources: Vec<Resource> = Vec::new();
        for entry in stored.resources.values_mut() {
            if entry.hidden_reads > 0 {
                entry.hidden_reads -= 1;
                continue;
            }
            let mut resource = entry.resource.clone();
            resource.resource_methods = entry.methods.keys().cloned().collect();
            resources.push(resource);
        }
        for (resource, remaining) in stored.tombstones.iter_mut() {
            resources.push(resource.clone());
            *remaining -= 1;
        }
        stored.tombstones.retain(|(_, remaining)| *remaining > 0);

        resources.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(resources)
    }

    async fn create_resource(
        &self,
        rest_api_id: &str,
        parent_id: &str,
        req: CreateResourceRequest,
    ) -> Result<Resource, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        let lag = state.read_lag;
        let stored = get_api_mut(&mut state.apis, rest_api_id)?;
        let parent_path = get_resource(&stored.resources, parent_id)?.resource.path.clone();

        let path = if parent_path == "/" {
            format!("/{}", req.path_part)
        } else {
            format!("{}/{}", parent_path, req.path_part)
        };
        state.check("create_resource", path.clone())?;
        let stored = get_api_mut(&mut state.apis, rest_api_id)?;

        if stored.resources.values().any(|r| r.resource.path == path) {
            return Err(ApiGatewayError::ConflictException(format!(
                "Another resource with the same parent already has this name: {}",
                req.path_part
            )));
        }

        stored.resource_counter += 1;
        let id = format!("{:010}", stored.resource_counter);
        let resource = Resource {
            rest_api_id: rest_api_id.to_string(),
            id: id.clone(),
            parent_id: Some(parent_id.to_string()),
            path_part: Some(req.path_part),
            path,
            resource_methods: Default::default(),
        };
        stored.resources.insert(
            id,
            StoredResource {
                resource: resource.clone(),
                methods: BTreeMap::new(),
                hidden_reads: lag,
            },
        );
        Ok(resource)
    }

    async fn delete_resource(&self, key: &ResourceKey) -> Result<(), ApiGatewayError> {
        let mut state = self.inner.lock().await;
        let lag = state.read_lag;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let path = get_resource(&stored.resources, &key.resource_id)?.resource.path.clone();
        state.check("delete_resource", path.clone())?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;

        let prefix = format!("{}/", path);
        let doomed: Vec<String> = stored
            .resources
            .values()
            .filter(|r| r.resource.path == path || r.resource.path.starts_with(&prefix))
            .map(|r| r.resource.id.clone())
            .collect();
        for id in doomed {
            if let Some(entry) = stored.resources.remove(&id) {
                if lag > 0 && entry.hidden_reads == 0 {
                    stored.tombstones.push((entry.resource, lag));
                }
            }
        }
        Ok(())
    }

    // --- Methods ---

    async fn get_method(&self, key: &MethodKey) -> Result<Method, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("get_method", key.to_string())?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        Ok(get_method_mut(&mut resource.methods, &key.http_method)?.clone())
    }

    async fn put_method(
        &self,
        key: &MethodKey,
        req: PutMethodRequest,
    ) -> Result<Method, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("put_method", key.to_string())?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        let verb = key.http_method.to_uppercase();
        if resource.methods.contains_key(&verb) {
            return Err(ApiGatewayError::ConflictException(
                "Method already exists for this resource".to_string(),
            ));
        }

        let method = Method {
            key: resource.resource.method_key(&verb),
            authorization_type: req.authorization_type,
            api_key_required: req.api_key_required,
            request_parameters: req.request_parameters,
            request_models: req.request_models,
            method_integration: None,
            method_responses: BTreeMap::new(),
        };
        resource.methods.insert(verb, method.clone());
        Ok(method)
    }

    async fn delete_method(&self, key: &MethodKey) -> Result<(), ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("delete_method", key.to_string())?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        if resource
            .methods
            .remove(&key.http_method.to_uppercase())
            .is_none()
        {
            return Err(ApiGatewayError::NotFoundException(format!(
                "Invalid Method identifier specified: {}",
                key.http_method
            )));
        }
        Ok(())
    }

    // --- Integration ---

    async fn put_integration(
        &self,
        key: &MethodKey,
        req: PutIntegrationRequest,
    ) -> Result<Integration, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("put_integration", key.to_string())?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        let method = get_method_mut(&mut resource.methods, &key.http_method)?;

        let integration = Integration {
            method: method.key.clone(),
            integration_type: req.integration_type,
            uri: req.uri,
            http_method: req.integration_http_method,
            passthrough_behavior: Some(
                req.passthrough_behavior
                    .unwrap_or_else(|| "WHEN_NO_MATCH".to_string()),
            ),
            request_parameters: req.request_parameters,
            request_templates: req
                .request_templates
                .into_iter()
                .map(|(k, v)| (k, if v.is_empty() { None } else { Some(v) }))
                .collect(),
            other: req.other,
            integration_responses: BTreeMap::new(),
        };
        method.method_integration = Some(integration.clone());
        Ok(integration)
    }

    // --- MethodResponse ---

    async fn put_method_response(
        &self,
        key: &MethodKey,
        status_code: &str,
        req: PutMethodResponseRequest,
    ) -> Result<MethodResponse, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("put_method_response", format!("{} {}", key, status_code))?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        let method = get_method_mut(&mut resource.methods, &key.http_method)?;
        if method.method_responses.contains_key(status_code) {
            return Err(ApiGatewayError::ConflictException(format!(
                "Response already exists for this resource: {}",
                status_code
            )));
        }

        let mr = MethodResponse {
            status_code: status_code.to_string(),
            response_parameters: req.response_parameters,
            response_models: req.response_models,
        };
        method
            .method_responses
            .insert(status_code.to_string(), mr.clone());
        Ok(mr)
    }

    async fn delete_method_response(
        &self,
        key: &MethodKey,
        status_code: &str,
    ) -> Result<(), ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("delete_method_response", format!("{} {}", key, status_code))?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        let method = get_method_mut(&mut resource.methods, &key.http_method)?;
        if method.method_responses.remove(status_code).is_none() {
            return Err(ApiGatewayError::NotFoundException(format!(
                "Invalid Response status code specified: {}",
                status_code
            )));
        }
        Ok(())
    }

    // --- IntegrationResponse ---

    async fn put_integration_response(
        &self,
        key: &MethodKey,
        status_code: &str,
        req: PutIntegrationResponseRequest,
    ) -> Result<IntegrationResponse, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("put_integration_response", format!("{} {}", key, status_code))?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        let method = get_method_mut(&mut resource.methods, &key.http_method)?;
        if !method.method_responses.contains_key(status_code) {
            return Err(ApiGatewayError::NotFoundException(format!(
                "Invalid Response status code specified: {}",
                status_code
            )));
        }
        let integration = method.method_integration.as_mut().ok_or_else(|| {
            ApiGatewayError::NotFoundException("Invalid Integration identifier specified".to_string())
        })?;

        let ir = IntegrationResponse {
            status_code: status_code.to_string(),
            selection_pattern: req.selection_pattern,
            response_parameters: req.response_parameters,
            // An empty template comes back as null.
            response_templates: req
                .response_templates
                .into_iter()
                .map(|(k, v)| (k, if v.is_empty() { None } else { Some(v) }))
                .collect(),
        };
        integration
            .integration_responses
            .insert(status_code.to_string(), ir.clone());
        Ok(ir)
    }

    async fn delete_integration_response(
        &self,
        key: &MethodKey,
        status_code: &str,
    ) -> Result<(), ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("delete_integration_response", format!("{} {}", key, status_code))?;
        let stored = get_api_mut(&mut state.apis, &key.rest_api_id)?;
        let resource = get_resource_mut(&mut stored.resources, &key.resource_id)?;
        let method = get_method_mut(&mut resource.methods, &key.http_method)?;
        let removed = method
            .method_integration
            .as_mut()
            .and_then(|i| i.integration_responses.remove(status_code));
        if removed.is_none() {
            return Err(ApiGatewayError::NotFoundException(format!(
                "Invalid Response status code specified: {}",
                status_code
            )));
        }
        Ok(())
    }

    // --- Deployments ---

    async fn create_deployment(
        &self,
        rest_api_id: &str,
        req: CreateDeploymentRequest,
    ) -> Result<Deployment, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("create_deployment", rest_api_id)?;
        let region = state.region.clone();
        let stored = get_api_mut(&mut state.apis, rest_api_id)?;

        let id = short_id();
        let deployment = Deployment {
            rest_api_id: rest_api_id.to_string(),
            id: id.clone(),
            description: req.description,
        };

        if let Some(ref stage_name) = req.stage_name {
            let stage = stored
                .stages
                .entry(stage_name.clone())
                .or_insert_with(|| Stage {
                    rest_api_id: rest_api_id.to_string(),
                    stage_name: stage_name.clone(),
                    deployment_id: None,
                    description: req.stage_description.clone(),
                    invoke_url: super::api::invoke_url(rest_api_id, &region, stage_name),
                });
            stage.deployment_id = Some(id.clone());
        }

        stored.deployments.insert(id, deployment.clone());
        Ok(deployment)
    }

    // --- Stages ---

    async fn get_stages(&self, rest_api_id: &str) -> Result<Vec<Stage>, ApiGatewayError> {
        let mut state = self.inner.lock().await;
        state.check("get_stages", rest_api_id)?;
        let stored = get_api_mut(&mut state.apis, rest_api_id)?;
        Ok(stored.stages.values().cloned().collect())
    }
}

// --- Helpers ---

fn get_api_mut<'a>(
    apis: &'a mut HashMap<String, StoredApi>,
    api_id: &str,
) -> Result<&'a mut StoredApi, ApiGatewayError> {
    apis.get_mut(api_id).ok_or_else(|| {
        ApiGatewayError::NotFoundException(format!(
            "Invalid REST API identifier specified: {}",
            api_id
        ))
    })
}

fn get_resource<'a>(
    resources: &'a HashMap<String, StoredResource>,
    resource_id: &str,
) -> Result<&'a StoredResource, ApiGatewayError> {
    resources.get(resource_id).ok_or_else(|| {
        ApiGatewayError::NotFoundException(format!(
            "Invalid Resource identifier specified: {}",
            resource_id
        ))
    })
}

fn get_resource_mut<'a>(
    resources: &'a mut HashMap<String, StoredResource>,
    resource_id: &str,
) -> Result<&'a mut StoredResource, ApiGatewayError> {
    resources.get_mut(resource_id).ok_or_else(|| {
        ApiGatewayError::NotFoundException(format!(
            "Invalid Resource identifier specified: {}",
            resource_id
        ))
    })
}

fn get_method_mut<'a>(
    methods: &'a mut BTreeMap<String, Method>,
    http_method: &str,
) -> Result<&'a mut Method, ApiGatewayError> {
    methods
        .get_mut(&http_method.to_uppercase())
        .ok_or_else(|| {
            ApiGatewayError::NotFoundException(format!(
                "Invalid Method identifier specified: {}",
                http_method
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn api_with_root(state: &ApiGatewayState) -> (RestApi, Resource) {
        let api = state
            .create_rest_api(CreateRestApiRequest {
                name: "pets".into(),
                description: None,
            })
            .await
            .unwrap();
        let root = state.get_resources(&api.id).await.unwrap().remove(0);
        (api, root)
    }

    fn resource_request(part: &str) -> CreateResourceRequest {
        CreateResourceRequest {
            path_part: part.into(),
        }
    }

    #[tokio::test]
    async fn new_api_has_root_resource() {
        let state = ApiGatewayState::new("us-east-1".into());
        let (_, root) = api_with_root(&state).await;
        assert_eq!(root.path, "/");
        assert!(root.parent_id.is_none());
    }

    #[tokio::test]
    async fn deleting_a_resource_removes_its_subtree() {
        let state = ApiGatewayState::new("us-east-1".into());
        let (api, root) = api_with_root(&state).await;
        let a = state
            .create_resource(&api.id, &root.id, resource_request("a"))
            .await
            .unwrap();
        state
            .create_resource(&api.id, &a.id, resource_request("b"))
            .await
            .unwrap();
        state
            .create_resource(&api.id, &root.id, resource_request("ab"))
            .await
            .unwrap();

        state.delete_resource(&a.key()).await.unwrap();

        let paths: Vec<String> = state
            .get_resources(&api.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["/", "/ab"]);
    }

    #[tokio::test]
    async fn read_lag_hides_fresh_resources_for_configured_listings() {
        let state = ApiGatewayState::new("us-east-1".into());
        let (api, root) = api_with_root(&state).await;
        state.set_read_lag(2).await;
        state
            .create_resource(&api.id, &root.id, resource_request("late"))
            .await
            .unwrap();

        assert_eq!(state.get_resources(&api.id).await.unwrap().len(), 1);
        assert_eq!(state.get_resources(&api.id).await.unwrap().len(), 1);
        assert_eq!(state.get_resources(&api.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn replacing_integration_drops_its_responses() {
        let state = ApiGatewayState::new("us-east-1".into());
        let (api, root) = api_with_root(&state).await;
        let key = root.method_key("GET");
        state
            .put_method(
                &key,
                PutMethodRequest {
                    authorization_type: "NONE".into(),
                    api_key_required: false,
                    request_parameters: BTreeMap::new(),
                    request_models: BTreeMap::new(),
                },
            )
            .await
            .unwrap();
        let integration = PutIntegrationRequest {
            integration_type: "MOCK".into(),
            uri: None,
            integration_http_method: None,
            passthrough_behavior: None,
            request_parameters: BTreeMap::new(),
            request_templates: BTreeMap::new(),
            other: serde_json::Map::new(),
        };
        state.put_integration(&key, integration.clone()).await.unwrap();
        state
            .put_method_response(
                &key,
                "200",
                PutMethodResponseRequest {
                    response_parameters: BTreeMap::new(),
                    response_models: BTreeMap::new(),
                },
            )
            .await
            .unwrap();
        state
            .put_integration_response(
                &key,
                "200",
                PutIntegrationResponseRequest {
                    selection_pattern: None,
                    response_parameters: BTreeMap::new(),
                    response_templates: BTreeMap::from([(
                        "application/json".to_string(),
                        String::new(),
                    )]),
                },
            )
            .await
            .unwrap();

        let method = state.get_method(&key).await.unwrap();
        let integration_before = method.method_integration.unwrap();
        let ir = &integration_before.integration_responses["200"];
        assert_eq!(ir.response_templates["application/json"], None);

        state.put_integration(&key, integration).await.unwrap();
        let method = state.get_method(&key).await.unwrap();
        assert!(method
            .method_integration
            .unwrap()
            .integration_responses
            .is_empty());
        assert_eq!(api.name, "pets");
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let state = ApiGatewayState::new("us-east-1".into());
        state
            .fail_next(
                "get_rest_apis",
                ApiGatewayError::TooManyRequestsException("slow down".into()),
            )
            .await;
        assert!(state.get_rest_apis().await.is_err());
        assert!(state.get_rest_apis().await.is_ok());
    }
}
