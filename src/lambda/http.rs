use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::client::LambdaClient;
use super::error::LambdaError;
use super::types::*;
use crate::transport::{RawResponse, Transport};

const SERVICE: &str = "lambda";
const API_PREFIX: &str = "/2015-03-31/functions";

const NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn function_path(function_name: &str) -> String {
    format!(
        "{}/{}",
        API_PREFIX,
        utf8_percent_encode(function_name, NAME)
    )
}

pub struct HttpLambda {
    transport: Arc<Transport>,
    endpoint: String,
}

impl HttpLambda {
    pub fn new(transport: Arc<Transport>, endpoint: impl Into<String>) -> Self {
        HttpLambda {
            transport,
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, LambdaError> {
        Url::parse(&format!("{}{}", self.endpoint, path))
            .map_err(|e| LambdaError::Transport(format!("bad url {}: {}", path, e)))
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, LambdaError> {
        let url = self.url(path)?;
        debug!(%method, path, "lambda request");
        let response = self
            .transport
            .send(SERVICE, method, url, body.map(|b| ("application/json", b)))
            .await
            .map_err(|e| LambdaError::Transport(e.to_string()))?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(LambdaError::from_response(
                response.status,
                response.error_type.as_deref(),
                response.error_message(),
            ))
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, LambdaError> {
        let payload = match body {
            Some(body) => {
                Some(serde_json::to_vec(body).map_err(|e| LambdaError::Transport(e.to_string()))?)
            }
            None => None,
        };
        let response = self.exchange(method, path, payload).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| LambdaError::Transport(format!("malformed response body: {}", e)))
    }
}

#[async_trait]
impl LambdaClient for HttpLambda {
    async fn get_function(
        &self,
        function_name: &str,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let out: GetFunctionResponse = self
            .call(Method::GET, &function_path(function_name), None::<&()>)
            .await?;
        Ok(out.configuration)
    }

    async fn create_function(
        &self,
        req: CreateFunctionRequest,
    ) -> Result<FunctionConfiguration, LambdaError> {
        self.call(Method::POST, API_PREFIX, Some(&req)).await
    }

    async fn update_function_configuration(
        &self,
        req: UpdateFunctionConfigurationRequest,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let path = format!("{}/configuration", function_path(&req.function_name));
        self.call(Method::PUT, &path, Some(&req)).await
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        req: UpdateFunctionCodeRequest,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let path = format!("{}/code", function_path(function_name));
        self.call(Method::PUT, &path, Some(&req)).await
    }

    async fn add_permission(
        &self,
        function_name: &str,
        req: AddPermissionRequest,
    ) -> Result<AddPermissionResponse, LambdaError> {
        let path = format!("{}/policy", function_path(function_name));
        self.call(Method::POST, &path, Some(&req)).await
    }

    async fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
    ) -> Result<(), LambdaError> {
        let path = format!(
            "{}/policy/{}",
            function_path(function_name),
            utf8_percent_encode(statement_id, NAME)
        );
        self.exchange(Method::DELETE, &path, None).await.map(|_| ())
    }
}
