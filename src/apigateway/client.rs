use async_trait::async_trait;

use super::api::{
    Deployment, Integration, IntegrationResponse, Method, MethodKey, MethodResponse, Resource,
    ResourceKey, RestApi, Stage,
};
use super::error::ApiGatewayError;
use super::types::*;

/// CRUD primitives against the API management service.
///
/// Writes are not guaranteed to be visible to the very next read; callers that
/// need read-your-writes poll (see [`crate::poll`]).
#[async_trait]
pub trait ApiGatewayClient: Send + Sync {
    async fn get_rest_apis(&self) -> Result<Vec<RestApi>, ApiGatewayError>;

    async fn create_rest_api(&self, req: CreateRestApiRequest)
        -> Result<RestApi, ApiGatewayError>;

    async fn update_rest_api(
        &self,
        rest_api_id: &str,
        req: UpdateRestApiRequest,
    ) -> Result<RestApi, ApiGatewayError>;

    /// Every resource of the API, sorted by path.
    async fn get_resources(&self, rest_api_id: &str) -> Result<Vec<Resource>, ApiGatewayError>;

    async fn create_resource(
        &self,
        rest_api_id: &str,
        parent_id: &str,
        req: CreateResourceRequest,
    ) -> Result<Resource, ApiGatewayError>;

    /// Deleting a resource removes its whole subtree.
    async fn delete_resource(&self, key: &ResourceKey) -> Result<(), ApiGatewayError>;

    async fn get_method(&self, key: &MethodKey) -> Result<Method, ApiGatewayError>;

    async fn put_method(
        &self,
        key: &MethodKey,
        req: PutMethodRequest,
    ) -> Result<Method, ApiGatewayError>;

    async fn delete_method(&self, key: &MethodKey) -> Result<(), ApiGatewayError>;

    /// Create-or-replace. Replacing drops the integration's responses.
    async fn put_integration(
        &self,
        key: &MethodKey,
        req: PutIntegrationRequest,
    ) -> Result<Integration, ApiGatewayError>;

    async fn put_method_response(
        &self,
        key: &MethodKey,
        status_code: &str,
        req: PutMethodResponseRequest,
    ) -> Result<MethodResponse, ApiGatewayError>;

    async fn delete_method_response(
        &self,
        key: &MethodKey,
        status_code: &str,
    ) -> Result<(), ApiGatewayError>;

    async fn put_integration_response(
        &self,
        key: &MethodKey,
        status_code: &str,
        req: PutIntegrationResponseRequest,
    ) -> Result<IntegrationResponse, ApiGatewayError>;

    async fn delete_integration_response(
        &self,
        key: &MethodKey,
        status_code: &str,
    ) -> Result<(), ApiGatewayError>;

    async fn create_deployment(
        &self,
        rest_api_id: &str,
        req: CreateDeploymentRequest,
    ) -> Result<Deployment, ApiGatewayError>;

    /// Stages sorted by name, each with its invocation URL filled in.
    async fn get_stages(&self, rest_api_id: &str) -> Result<Vec<Stage>, ApiGatewayError>;

    async fn find_rest_api_by_name(&self, name: &str) -> Result<Option<RestApi>, ApiGatewayError> {
        let apis = self.get_rest_apis().await?;
        Ok(apis.into_iter().find(|api| api.name == name))
    }
}
