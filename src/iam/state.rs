use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::client::{IamClient, Role};
use super::error::IamError;
use crate::journal::RecordedCall;

struct IamStateInner {
    roles: HashMap<String, Role>,
    account_id: String,
    calls: Vec<RecordedCall>,
}

/// In-process identity backend with a fixed set of roles.
pub struct IamState {
    inner: Arc<Mutex<IamStateInner>>,
}

impl IamState {
    pub fn new(account_id: String) -> Self {
        IamState {
            inner: Arc::new(Mutex::new(IamStateInner {
                roles: HashMap::new(),
                account_id,
                calls: Vec::new(),
            })),
        }
    }

    /// Registers a role and returns its ARN.
    pub async fn add_role(&self, role_name: &str) -> String {
        let mut inner = self.inner.lock().await;
        let arn = format!("arn:aws:iam::{}:role/{}", inner.account_id, role_name);
        inner.roles.insert(
            role_name.to_string(),
            Role {
                role_name: role_name.to_string(),
                arn: arn.clone(),
            },
        );
        arn
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().await.calls.clone()
    }
}

#[async_trait]
impl IamClient for IamState {
    async fn get_role(&self, role_name: &str) -> Result<Role, IamError> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(RecordedCall {
            operation: "get_role",
            target: role_name.to_string(),
        });
        inner.roles.get(role_name).cloned().ok_or_else(|| {
            IamError::NoSuchEntity(format!(
                "The role with name {} cannot be found.",
                role_name
            ))
        })
    }
}
