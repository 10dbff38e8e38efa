//! Query-protocol backend: form-encoded requests, XML responses.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use tracing::debug;

use super::client::{IamClient, Role};
use super::error::IamError;
use crate::transport::Transport;

const SERVICE: &str = "iam";
const API_VERSION: &str = "2010-05-08";
const FORM: &str = "application/x-www-form-urlencoded; charset=utf-8";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleResponse {
    get_role_result: GetRoleResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetRoleResult {
    role: RoleXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleXml {
    role_name: String,
    arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    error: ErrorXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorXml {
    code: String,
    #[serde(default)]
    message: String,
}

fn parse_role(body: &str) -> Result<Role, IamError> {
    let parsed: GetRoleResponse = quick_xml::de::from_str(body)
        .map_err(|e| IamError::Transport(format!("malformed GetRole response: {}", e)))?;
    Ok(Role {
        role_name: parsed.get_role_result.role.role_name,
        arn: parsed.get_role_result.role.arn,
    })
}

fn parse_error(status: u16, body: &str) -> IamError {
    match quick_xml::de::from_str::<ErrorResponse>(body) {
        Ok(parsed) => IamError::from_code(&parsed.error.code, parsed.error.message),
        Err(_) => IamError::Unrecognized {
            error_type: format!("HTTP {}", status),
            message: body.to_string(),
        },
    }
}

pub struct HttpIam {
    transport: Arc<Transport>,
    endpoint: String,
}

impl HttpIam {
    pub fn new(transport: Arc<Transport>, endpoint: impl Into<String>) -> Self {
        HttpIam {
            transport,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl IamClient for HttpIam {
    async fn get_role(&self, role_name: &str) -> Result<Role, IamError> {
        let url = Url::parse(&format!("{}/", self.endpoint))
            .map_err(|e| IamError::Transport(format!("bad endpoint: {}", e)))?;
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("Action", "GetRole")
            .append_pair("RoleName", role_name)
            .append_pair("Version", API_VERSION)
            .finish();

        debug!(role = role_name, "iam GetRole");
        let response = self
            .transport
            .send(SERVICE, Method::POST, url, Some((FORM, body.into_bytes())))
            .await
            .map_err(|e| IamError::Transport(e.to_string()))?;
        let text = String::from_utf8_lossy(&response.body);
        if response.is_success() {
            parse_role(&text)
        } else {
            Err(parse_error(response.status, &text))
        }
    }
}
