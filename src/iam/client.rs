use async_trait::async_trait;

use super::error::IamError;

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub role_name: String,
    pub arn: String,
}

/// Read-only view of the identity service: roles are looked up, never created.
#[async_trait]
pub trait IamClient: Send + Sync {
    async fn get_role(&self, role_name: &str) -> Result<Role, IamError>;
}
