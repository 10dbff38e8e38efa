use std::collections::BTreeMap;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::apigateway::api::{Method, MethodKey, Resource};
use crate::apigateway::types::PutMethodRequest;
use crate::apigateway::ApiGatewayClient;
use crate::config::MethodSpec;
use crate::error::Result;
use crate::normalize::DesiredMethods;
use crate::tasks::Sequence;

use super::integration::check_integration;

/// Required request parameters for every `{param}` placeholder in `path`.
/// A greedy `{name+}` yields `name`.
pub fn path_parameters(path: &str) -> BTreeMap<String, bool> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
        .map(|name| name.trim_end_matches('+'))
        .filter(|name| !name.is_empty())
        .map(|name| (format!("method.request.path.{}", name), true))
        .collect()
}

pub fn put_method_request(path: &str, spec: &MethodSpec) -> PutMethodRequest {
    PutMethodRequest {
        authorization_type: spec
            .authorization_type
            .clone()
            .unwrap_or_else(|| "NONE".to_string()),
        api_key_required: spec.api_key_required.unwrap_or(false),
        request_parameters: path_parameters(path),
        request_models: spec.request_models.clone().unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodPlan {
    pub delete: Sequence<String>,
    pub create: Sequence<String>,
}

pub fn plan_methods(resource: &Resource, desired: &DesiredMethods) -> MethodPlan {
    let mut plan = MethodPlan::default();
    for verb in &resource.resource_methods {
        if !desired.contains_key(verb) {
            plan.delete.push(verb.clone());
        }
    }
    for verb in desired.keys() {
        if !resource.resource_methods.contains(verb) {
            plan.create.push(verb.clone());
        }
    }
    plan
}

/// Converges the methods of one resource and everything below them.
/// Returns the resulting methods keyed by verb.
pub async fn reconcile_methods(
    client: &dyn ApiGatewayClient,
    resource: &Resource,
    desired: &DesiredMethods,
) -> Result<BTreeMap<String, Method>> {
    debug!(path = %resource.path, "reconciling methods");
    let plan = plan_methods(resource, desired);

    // Reads carry no ordering constraint.
    let keys: Vec<MethodKey> = desired
        .keys()
        .filter(|verb| resource.resource_methods.contains(*verb))
        .map(|verb| resource.method_key(verb))
        .collect();
    let existing = try_join_all(keys.iter().map(|key| client.get_method(key))).await?;
    let mut methods: BTreeMap<String, Method> = existing
        .into_iter()
        .map(|m| (m.http_method().to_string(), m))
        .collect();

    for verb in plan.delete {
        info!(path = %resource.path, verb = %verb, "deleting method");
        client.delete_method(&resource.method_key(&verb)).await?;
    }

    for verb in plan.create {
        let Some(spec) = desired.get(&verb) else {
            continue;
        };
        info!(path = %resource.path, verb = %verb, "creating method");
        let method = client
            .put_method(
                &resource.method_key(&verb),
                put_method_request(&resource.path, spec),
            )
            .await?;
        methods.insert(verb, method);
    }

    let mut converged = BTreeMap::new();
    for (verb, spec) in desired {
        let Some(method) = methods.remove(verb) else {
            continue;
        };
        let method = check_integration(client, method, spec).await?;
        converged.insert(verb.clone(), method);
    }
    Ok(converged)
}
