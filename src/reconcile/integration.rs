//! Integration request, method responses and integration responses of one
//! method, reconciled in that order.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::apigateway::api::{Integration, IntegrationResponse, Method, MethodKey, MethodResponse};
use crate::apigateway::types::{
    PutIntegrationRequest, PutIntegrationResponseRequest, PutMethodResponseRequest,
};
use crate::apigateway::ApiGatewayClient;
use crate::config::{IntegrationSpec, IntegrationType, MethodSpec, ResponseSpec, TemplateSource};
use crate::error::{Error, Result};
use crate::tasks::Sequence;

/// One write against a response keyed by status code.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOp<R> {
    Delete(String),
    Create(String, R),
    Replace(String, R),
}

impl<R> ResponseOp<R> {
    pub fn status_code(&self) -> &str {
        match self {
            ResponseOp::Delete(code)
            | ResponseOp::Create(code, _)
            | ResponseOp::Replace(code, _) => code,
        }
    }
}

pub fn header_parameter(header: &str) -> String {
    format!("method.response.header.{}", header)
}

pub fn method_response_request(spec: &ResponseSpec) -> PutMethodResponseRequest {
    PutMethodResponseRequest {
        response_parameters: spec
            .response_headers
            .keys()
            .map(|header| (header_parameter(header), false))
            .collect(),
        response_models: spec.response_models.clone().unwrap_or_else(|| {
            BTreeMap::from([("application/json".to_string(), "Empty".to_string())])
        }),
    }
}

pub fn integration_response_request(spec: &ResponseSpec) -> PutIntegrationResponseRequest {
    PutIntegrationResponseRequest {
        selection_pattern: spec.selection_pattern.clone(),
        response_parameters: spec
            .response_headers
            .iter()
            .map(|(header, value)| (header_parameter(header), value.clone()))
            .collect(),
        response_templates: spec.response_templates.clone().unwrap_or_else(|| {
            BTreeMap::from([("application/json".to_string(), String::new())])
        }),
    }
}

/// The service reports empty templates as `null`.
pub fn normalize_templates(templates: &BTreeMap<String, Option<String>>) -> BTreeMap<String, String> {
    templates
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
        .collect()
}

fn method_response_matches(current: &MethodResponse, desired: &PutMethodResponseRequest) -> bool {
    current.response_models == desired.response_models
        && current.response_parameters == desired.response_parameters
}

fn integration_response_matches(
    current: &IntegrationResponse,
    desired: &PutIntegrationResponseRequest,
) -> bool {
    current.selection_pattern == desired.selection_pattern
        && current.response_parameters == desired.response_parameters
        && normalize_templates(&current.response_templates) == desired.response_templates
}

fn plan_responses<C, R>(
    current: &BTreeMap<String, C>,
    desired: &BTreeMap<String, ResponseSpec>,
    build: impl Fn(&ResponseSpec) -> R,
    matches: impl Fn(&C, &R) -> bool,
) -> Sequence<ResponseOp<R>> {
    let mut ops = Sequence::new();
    for status_code in current.keys() {
        if !desired.contains_key(status_code) {
            ops.push(ResponseOp::Delete(status_code.clone()));
        }
    }
    for (status_code, spec) in desired {
        let request = build(spec);
        match current.get(status_code) {
            None => ops.push(ResponseOp::Create(status_code.clone(), request)),
            Some(existing) if !matches(existing, &request) => {
                ops.push(ResponseOp::Replace(status_code.clone(), request))
            }
            Some(_) => {}
        }
    }
    ops
}

pub fn plan_method_responses(
    current: &BTreeMap<String, MethodResponse>,
    desired: &BTreeMap<String, ResponseSpec>,
) -> Sequence<ResponseOp<PutMethodResponseRequest>> {
    plan_responses(current, desired, method_response_request, method_response_matches)
}

pub fn plan_integration_responses(
    current: &BTreeMap<String, IntegrationResponse>,
    desired: &BTreeMap<String, ResponseSpec>,
) -> Sequence<ResponseOp<PutIntegrationResponseRequest>> {
    plan_responses(
        current,
        desired,
        integration_response_request,
        integration_response_matches,
    )
}

/// Wire name of a desired integration key on the remote side.
fn remote_field(key: &str) -> &str {
    match key {
        "integrationHttpMethod" => "httpMethod",
        other => other,
    }
}

/// The service omits empty maps and lists and reports empty map values
/// (templates) as `null`.
fn comparable(value: Value) -> Value {
    match value {
        Value::Object(map) if map.is_empty() => Value::Null,
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| match v {
                    Value::Null => (k, Value::String(String::new())),
                    v => (k, v),
                })
                .collect(),
        ),
        other => other,
    }
}

/// Names of the desired integration fields that differ from the remote
/// integration. Only keys present in the desired spec are compared.
pub fn integration_diff(current: &Integration, desired: &IntegrationSpec) -> Result<Vec<String>> {
    let desired = serde_json::to_value(desired)
        .map_err(|e| Error::Configuration(format!("unrepresentable integration: {}", e)))?;
    let Value::Object(fields) = desired else {
        return Ok(Vec::new());
    };
    Ok(fields
        .into_iter()
        .filter(|(key, value)| {
            comparable(current.field(remote_field(key))) != comparable(value.clone())
        })
        .map(|(key, _)| key)
        .collect())
}

/// Full create-or-replace request for a desired integration.
pub fn integration_request(spec: &IntegrationSpec, key: &MethodKey) -> Result<PutIntegrationRequest> {
    let integration_type = match spec.integration_type {
        None => {
            return Err(Error::Configuration(format!(
                "{} has no integration type",
                key
            )))
        }
        Some(IntegrationType::Lambda) => {
            return Err(Error::Configuration(format!(
                "{} uses a Lambda integration that was never expanded",
                key
            )))
        }
        Some(t) => t.as_str().to_string(),
    };

    let mut request_templates = BTreeMap::new();
    for (content_type, template) in &spec.request_templates {
        match template {
            TemplateSource::Inline(text) => {
                request_templates.insert(content_type.clone(), text.clone());
            }
            TemplateSource::File { file } => {
                return Err(Error::Configuration(format!(
                    "{} request template {} could not be read",
                    key,
                    file.display()
                )))
            }
        }
    }

    let mut other = spec.other.clone();
    let passthrough_behavior = match other.remove("passthroughBehavior") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(v) => {
            return Err(Error::Configuration(format!(
                "{} passthroughBehavior must be a string, got {}",
                key, v
            )))
        }
    };
    let request_parameters = match other.remove("requestParameters") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(v) => serde_json::from_value(v).map_err(|e| {
            Error::Configuration(format!("{} requestParameters: {}", key, e))
        })?,
    };

    Ok(PutIntegrationRequest {
        integration_type,
        uri: spec.uri.clone(),
        integration_http_method: spec.integration_http_method.clone(),
        passthrough_behavior,
        request_parameters,
        request_templates,
        other,
    })
}

async fn check_integration_request(
    client: &dyn ApiGatewayClient,
    method: Method,
    spec: &IntegrationSpec,
) -> Result<Method> {
    let key = method.key.clone();
    let needs_put = match &method.method_integration {
        None => {
            debug!(method = %key, "integration missing");
            true
        }
        Some(current) => {
            let diff = integration_diff(current, spec)?;
            if !diff.is_empty() {
                debug!(method = %key, fields = ?diff, "integration differs");
            }
            !diff.is_empty()
        }
    };
    if !needs_put {
        return Ok(method);
    }

    let request = integration_request(spec, &key)?;
    info!(method = %key, integration_type = %request.integration_type, "putting integration");
    let integration = client.put_integration(&key, request).await?;
    Ok(Method {
        method_integration: Some(integration),
        ..method
    })
}

async fn check_method_responses(
    client: &dyn ApiGatewayClient,
    method: Method,
    desired: &BTreeMap<String, ResponseSpec>,
) -> Result<Method> {
    let key = method.key.clone();
    let ops = plan_method_responses(&method.method_responses, desired);
    if ops.is_empty() {
        return Ok(method);
    }

    let mut responses = method.method_responses;
    for op in ops {
        match op {
            ResponseOp::Delete(status_code) => {
                info!(method = %key, status_code = %status_code, "deleting method response");
                client.delete_method_response(&key, &status_code).await?;
                responses.remove(&status_code);
            }
            ResponseOp::Create(status_code, request) => {
                info!(method = %key, status_code = %status_code, "creating method response");
                let created = client.put_method_response(&key, &status_code, request).await?;
                responses.insert(status_code, created);
            }
            ResponseOp::Replace(status_code, request) => {
                info!(method = %key, status_code = %status_code, "replacing method response");
                client.delete_method_response(&key, &status_code).await?;
                let created = client.put_method_response(&key, &status_code, request).await?;
                responses.insert(status_code, created);
            }
        }
    }
    Ok(Method {
        method_responses: responses,
        ..method
    })
}

async fn check_integration_responses(
    client: &dyn ApiGatewayClient,
    method: Method,
    desired: &BTreeMap<String, ResponseSpec>,
) -> Result<Method> {
    let key = method.key.clone();
    let Some(integration) = method.method_integration.clone() else {
        return Err(Error::not_found("integration", key.to_string()));
    };
    let ops = plan_integration_responses(&integration.integration_responses, desired);
    if ops.is_empty() {
        return Ok(method);
    }

    let mut responses = integration.integration_responses;
    for op in ops {
        match op {
            ResponseOp::Delete(status_code) => {
                info!(method = %key, status_code = %status_code, "deleting integration response");
                match client.delete_integration_response(&key, &status_code).await {
                    Ok(()) => {}
                    // Removing the method response may already have taken it.
                    Err(e) if e.is_not_found() => {
                        debug!(method = %key, status_code = %status_code, "integration response already gone")
                    }
                    Err(e) => return Err(e.into()),
                }
                responses.remove(&status_code);
            }
            ResponseOp::Create(status_code, request) | ResponseOp::Replace(status_code, request) => {
                info!(method = %key, status_code = %status_code, "putting integration response");
                let put = client
                    .put_integration_response(&key, &status_code, request)
                    .await?;
                responses.insert(status_code, put);
            }
        }
    }
    Ok(Method {
        method_integration: Some(Integration {
            integration_responses: responses,
            ..integration
        }),
        ..method
    })
}

/// Converges one method's integration and responses. Returns the method as
/// it now stands remotely.
pub async fn check_integration(
    client: &dyn ApiGatewayClient,
    method: Method,
    spec: &MethodSpec,
) -> Result<Method> {
    let method = check_integration_request(client, method, &spec.request).await?;
    let method = check_method_responses(client, method, &spec.responses).await?;
    check_integration_responses(client, method, &spec.responses).await
}
