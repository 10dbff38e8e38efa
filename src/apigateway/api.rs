use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::types::*;

#[derive(Debug, Clone, PartialEq)]
pub struct RestApi {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<RestApiOutput> for RestApi {
    fn from(out: RestApiOutput) -> Self {
        RestApi {
            id: out.id,
            name: out.name,
            description: out.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub rest_api_id: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub rest_api_id: String,
    pub id: String,
    pub parent_id: Option<String>,
    pub path_part: Option<String>,
    pub path: String,
    pub resource_methods: BTreeSet<String>,
}

impl Resource {
    pub fn from_output(rest_api_id: &str, out: ResourceOutput) -> Self {
        Resource {
            rest_api_id: rest_api_id.to_string(),
            id: out.id,
            parent_id: out.parent_id,
            path_part: out.path_part,
            path: out.path,
            resource_methods: out.resource_methods.into_keys().collect(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            rest_api_id: self.rest_api_id.clone(),
            resource_id: self.id.clone(),
        }
    }

    pub fn method_key(&self, http_method: &str) -> MethodKey {
        MethodKey {
            rest_api_id: self.rest_api_id.clone(),
            resource_id: self.id.clone(),
            resource_path: self.path.clone(),
            http_method: http_method.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub rest_api_id: String,
    pub resource_id: String,
    pub resource_path: String,
    pub http_method: String,
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.http_method, self.resource_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub key: MethodKey,
    pub authorization_type: String,
    pub api_key_required: bool,
    pub request_parameters: BTreeMap<String, bool>,
    pub request_models: BTreeMap<String, String>,
    pub method_integration: Option<Integration>,
    pub method_responses: BTreeMap<String, MethodResponse>,
}

impl Method {
    pub fn from_output(key: MethodKey, out: MethodOutput) -> Self {
        let method_integration = out
            .method_integration
            .map(|i| Integration::from_output(key.clone(), i));
        Method {
            key,
            authorization_type: out.authorization_type,
            api_key_required: out.api_key_required,
            request_parameters: out.request_parameters,
            request_models: out.request_models,
            method_integration,
            method_responses: out
                .method_responses
                .into_iter()
                .map(|(k, v)| (k, MethodResponse::from(v)))
                .collect(),
        }
    }

    pub fn http_method(&self) -> &str {
        &self.key.http_method
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    pub method: MethodKey,
    pub integration_type: String,
    pub uri: Option<String>,
    pub http_method: Option<String>,
    pub passthrough_behavior: Option<String>,
    pub request_parameters: BTreeMap<String, String>,
    pub request_templates: BTreeMap<String, Option<String>>,
    pub other: serde_json::Map<String, Value>,
    pub integration_responses: BTreeMap<String, IntegrationResponse>,
}

impl Integration {
    pub fn from_output(method: MethodKey, out: IntegrationOutput) -> Self {
        Integration {
            method,
            integration_type: out.integration_type,
            uri: out.uri,
            http_method: out.http_method,
            passthrough_behavior: out.passthrough_behavior,
            request_parameters: out.request_parameters,
            request_templates: out.request_templates,
            other: out.other,
            integration_responses: out
                .integration_responses
                .into_iter()
                .map(|(k, v)| (k, IntegrationResponse::from(v)))
                .collect(),
        }
    }

    // Absent fields read as `Null`.
    pub fn field(&self, name: &str) -> Value {
        match name {
            "type" => Value::String(self.integration_type.clone()),
            "uri" => opt_string(&self.uri),
            "httpMethod" => opt_string(&self.http_method),
            "passthroughBehavior" => opt_string(&self.passthrough_behavior),
            "requestParameters" => map_value(
                self.request_parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
            ),
            "requestTemplates" => map_value(
                self.request_templates
                    .iter()
                    .map(|(k, v)| (k.clone(), opt_string(v))),
            ),
            other => self.other.get(other).cloned().unwrap_or(Value::Null),
        }
    }
}

fn opt_string(v: &Option<String>) -> Value {
    v.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
}

fn map_value(entries: impl Iterator<Item = (String, Value)>) -> Value {
    let map: serde_json::Map<String, Value> = entries.collect();
    if map.is_empty() {
        Value::Null
    } else {
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodResponse {
    pub status_code: String,
    pub response_parameters: BTreeMap<String, bool>,
    pub response_models: BTreeMap<String, String>,
}

impl From<MethodResponseOutput> for MethodResponse {
    fn from(out: MethodResponseOutput) -> Self {
        MethodResponse {
            status_code: out.status_code,
            response_parameters: out.response_parameters,
            response_models: out.response_models,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationResponse {
    pub status_code: String,
    pub selection_pattern: Option<String>,
    pub response_parameters: BTreeMap<String, String>,
    pub response_templates: BTreeMap<String, Option<String>>,
}

impl From<IntegrationResponseOutput> for IntegrationResponse {
    fn from(out: IntegrationResponseOutput) -> Self {
        IntegrationResponse {
            status_code: out.status_code,
            selection_pattern: out.selection_pattern,
            response_parameters: out.response_parameters,
            response_templates: out.response_templates,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub rest_api_id: String,
    pub id: String,
    pub description: Option<String>,
}

impl Deployment {
    pub fn from_output(rest_api_id: &str, out: DeploymentOutput) -> Self {
        Deployment {
            rest_api_id: rest_api_id.to_string(),
            id: out.id,
            description: out.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub rest_api_id: String,
    pub stage_name: String,
    pub deployment_id: Option<String>,
    pub description: Option<String>,
    pub invoke_url: String,
}

impl Stage {
    pub fn from_output(rest_api_id: &str, region: &str, out: StageOutput) -> Self {
        Stage {
            invoke_url: invoke_url(rest_api_id, region, &out.stage_name),
            rest_api_id: rest_api_id.to_string(),
            stage_name: out.stage_name,
            deployment_id: out.deployment_id,
            description: out.description,
        }
    }
}

pub fn invoke_url(rest_api_id: &str, region: &str, stage_name: &str) -> String {
    format!(
        "https://{}.execute-api.{}.amazonaws.com/{}",
        rest_api_id, region, stage_name
    )
}
