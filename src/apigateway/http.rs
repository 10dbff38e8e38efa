//! REST-JSON backend talking to the real service (or anything speaking its
//! wire protocol).

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Method as HttpMethod, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::api::{
    Deployment, Integration, IntegrationResponse, Method, MethodKey, MethodResponse, Resource,
    ResourceKey, RestApi, Stage,
};
use super::client::ApiGatewayClient;
use super::error::ApiGatewayError;
use super::types::*;
use crate::transport::{RawResponse, Transport};

const SERVICE: &str = "apigateway";
const PAGE_SIZE: &str = "500";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'+');

fn seg(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

fn method_path(key: &MethodKey) -> String {
    format!(
        "/restapis/{}/resources/{}/methods/{}",
        seg(&key.rest_api_id),
        seg(&key.resource_id),
        seg(&key.http_method)
    )
}

pub struct HttpApiGateway {
    transport: Arc<Transport>,
    endpoint: String,
}

impl HttpApiGateway {
    pub fn new(transport: Arc<Transport>, endpoint: impl Into<String>) -> Self {
        HttpApiGateway {
            transport,
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiGatewayError> {
        let mut url = Url::parse(&format!("{}{}", self.endpoint, path))
            .map_err(|e| ApiGatewayError::Transport(format!("bad url {}: {}", path, e)))?;
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url.set_query(Some(&encoded));
        }
        Ok(url)
    }

    async fn exchange(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, ApiGatewayError> {
        debug!(%method, path = url.path(), "apigateway request");
        let response = self
            .transport
            .send(SERVICE, method, url, body.map(|b| ("application/json", b)))
            .await
            .map_err(|e| ApiGatewayError::Transport(e.to_string()))?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiGatewayError::from_response(
                response.status,
                response.error_type.as_deref(),
                response.error_message(),
            ))
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, ApiGatewayError> {
        let payload = match body {
            Some(body) => Some(
                serde_json::to_vec(body)
                    .map_err(|e| ApiGatewayError::Transport(e.to_string()))?,
            ),
            None => None,
        };
        let response = self.exchange(method, url, payload).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            ApiGatewayError::Transport(format!("malformed response body: {}", e))
        })
    }

    async fn call_empty(&self, method: HttpMethod, url: Url) -> Result<(), ApiGatewayError> {
        self.exchange(method, url, None).await.map(|_| ())
    }
}

#[async_trait]
impl ApiGatewayClient for HttpApiGateway {
    async fn get_rest_apis(&self) -> Result<Vec<RestApi>, ApiGatewayError> {
        let mut apis = Vec::new();
        let mut position: Option<String> = None;
        loop {
            let mut query = vec![("limit", PAGE_SIZE)];
            if let Some(ref p) = position {
                query.push(("position", p.as_str()));
            }
            let url = self.url("/restapis", &query)?;
            let page: RestApisOutput = self.call(HttpMethod::GET, url, None::<&()>).await?;
            apis.extend(page.items.into_iter().map(RestApi::from));
            match page.position {
                Some(next) if !next.is_empty() => position = Some(next),
                _ => break,
            }
        }
        Ok(apis)
    }

    async fn create_rest_api(
        &self,
        req: CreateRestApiRequest,
    ) -> Result<RestApi, ApiGatewayError> {
        let url = self.url("/restapis", &[])?;
        let out: RestApiOutput = self.call(HttpMethod::POST, url, Some(&req)).await?;
        Ok(out.into())
    }

    async fn update_rest_api(
        &self,
        rest_api_id: &str,
        req: UpdateRestApiRequest,
    ) -> Result<RestApi, ApiGatewayError> {
        let url = self.url(&format!("/restapis/{}", seg(rest_api_id)), &[])?;
        let out: RestApiOutput = self.call(HttpMethod::PATCH, url, Some(&req)).await?;
        Ok(out.into())
    }

    async fn get_resources(&self, rest_api_id: &str) -> Result<Vec<Resource>, ApiGatewayError> {
        let path = format!("/restapis/{}/resources", seg(rest_api_id));
        let mut resources = Vec::new();
        let mut position: Option<String> = None;
        loop {
            let mut query = vec![("limit", PAGE_SIZE)];
            if let Some(ref p) = position {
                query.push(("position", p.as_str()));
            }
            let url = self.url(&path, &query)?;
            let page: ResourcesOutput = self.call(HttpMethod::GET, url, None::<&()>).await?;
            resources.extend(
                page.items
                    .into_iter()
                    .map(|out| Resource::from_output(rest_api_id, out)),
            );
            match page.position {
                Some(next) if !next.is_empty() => position = Some(next),
                _ => break,
            }
        }
        resources.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(resources)
    }

    async fn create_resource(
        &self,
        rest_api_id: &str,
        parent_id: &str,
        req: CreateResourceRequest,
    ) -> Result<Resource, ApiGatewayError> {
        let url = self.url(
            &format!("/restapis/{}/resources/{}", seg(rest_api_id), seg(parent_id)),
            &[],
        )?;
        let out: ResourceOutput = self.call(HttpMethod::POST, url, Some(&req)).await?;
        Ok(Resource::from_output(rest_api_id, out))
    }

    async fn delete_resource(&self, key: &ResourceKey) -> Result<(), ApiGatewayError> {
        let url = self.url(
            &format!(
                "/restapis/{}/resources/{}",
                seg(&key.rest_api_id),
                seg(&key.resource_id)
            ),
            &[],
        )?;
        self.call_empty(HttpMethod::DELETE, url).await
    }

    async fn get_method(&self, key: &MethodKey) -> Result<Method, ApiGatewayError> {
        let url = self.url(&method_path(key), &[])?;
        let out: MethodOutput = self.call(HttpMethod::GET, url, None::<&()>).await?;
        Ok(Method::from_output(key.clone(), out))
    }

    async fn put_method(
        &self,
        key: &MethodKey,
        req: PutMethodRequest,
    ) -> Result<Method, ApiGatewayError> {
        let url = self.url(&method_path(key), &[])?;
        let out: MethodOutput = self.call(HttpMethod::PUT, url, Some(&req)).await?;
        Ok(Method::from_output(key.clone(), out))
    }

    async fn delete_method(&self, key: &MethodKey) -> Result<(), ApiGatewayError> {
        let url = self.url(&method_path(key), &[])?;
        self.call_empty(HttpMethod::DELETE, url).await
    }

    async fn put_integration(
        &self,
        key: &MethodKey,
        req: PutIntegrationRequest,
    ) -> Result<Integration, ApiGatewayError> {
        let url = self.url(&format!("{}/integration", method_path(key)), &[])?;
        let out: IntegrationOutput = self.call(HttpMethod::PUT, url, Some(&req)).await?;
        Ok(Integration::from_output(key.clone(), out))
    }

    async fn put_method_response(
        &self,
        key: &MethodKey,
        status_code: &str,
        req: PutMethodResponseRequest,
    ) -> Result<MethodResponse, ApiGatewayError> {
        let url = self.url(
            &format!("{}/responses/{}", method_path(key), seg(status_code)),
            &[],
        )?;
        let out: MethodResponseOutput = self.call(HttpMethod::PUT, url, Some(&req)).await?;
        Ok(out.into())
    }

    async fn delete_method_response(
        &self,
        key: &MethodKey,
        status_code: &str,
    ) -> Result<(), ApiGatewayError> {
        let url = self.url(
            &format!("{}/responses/{}", method_path(key), seg(status_code)),
            &[],
        )?;
        self.call_empty(HttpMethod::DELETE, url).await
    }

    async fn put_integration_response(
        &self,
        key: &MethodKey,
        status_code: &str,
        req: PutIntegrationResponseRequest,
    ) -> Result<IntegrationResponse, ApiGatewayError> {
        let url = self.url(
            &format!(
                "{}/integration/responses/{}",
                method_path(key),
                seg(status_code)
            ),
            &[],
        )?;
        let out: IntegrationResponseOutput =
            self.call(HttpMethod::PUT, url, Some(&req)).await?;
        Ok(out.into())
    }

    async fn delete_integration_response(
        &self,
        key: &MethodKey,
        status_code: &str,
    ) -> Result<(), ApiGatewayError> {
        let url = self.url(
            &format!(
                "{}/integration/responses/{}",
                method_path(key),
                seg(status_code)
            ),
            &[],
        )?;
        self.call_empty(HttpMethod::DELETE, url).await
    }

    async fn create_deployment(
        &self,
        rest_api_id: &str,
        req: CreateDeploymentRequest,
    ) -> Result<Deployment, ApiGatewayError> {
        let url = self.url(&format!("/restapis/{}/deployments", seg(rest_api_id)), &[])?;
        let out: DeploymentOutput = self.call(HttpMethod::POST, url, Some(&req)).await?;
        Ok(Deployment::from_output(rest_api_id, out))
    }

    async fn get_stages(&self, rest_api_id: &str) -> Result<Vec<Stage>, ApiGatewayError> {
        let url = self.url(&format!("/restapis/{}/stages", seg(rest_api_id)), &[])?;
        let out: StagesOutput = self.call(HttpMethod::GET, url, None::<&()>).await?;
        let region = self.transport.region();
        let mut stages: Vec<Stage> = out
            .item
            .into_iter()
            .map(|s| Stage::from_output(rest_api_id, region, s))
            .collect();
        stages.sort_by(|a, b| a.stage_name.cmp(&b.stage_name));
        Ok(stages)
    }
}
