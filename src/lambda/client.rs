use async_trait::async_trait;

use super::error::LambdaError;
use super::types::*;

/// Function publishing and permission primitives of the compute service.
#[async_trait]
pub trait LambdaClient: Send + Sync {
    async fn get_function(&self, function_name: &str)
        -> Result<FunctionConfiguration, LambdaError>;

    async fn create_function(
        &self,
        req: CreateFunctionRequest,
    ) -> Result<FunctionConfiguration, LambdaError>;

    async fn update_function_configuration(
        &self,
        req: UpdateFunctionConfigurationRequest,
    ) -> Result<FunctionConfiguration, LambdaError>;

    async fn update_function_code(
        &self,
        function_name: &str,
        req: UpdateFunctionCodeRequest,
    ) -> Result<FunctionConfiguration, LambdaError>;

    async fn add_permission(
        &self,
        function_name: &str,
        req: AddPermissionRequest,
    ) -> Result<AddPermissionResponse, LambdaError>;

    async fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
    ) -> Result<(), LambdaError>;
}
