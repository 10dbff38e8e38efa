use std::collections::{BTreeMap, HashSet};

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::apigateway::api::{Resource, RestApi};
use crate::apigateway::types::CreateResourceRequest;
use crate::apigateway::ApiGatewayClient;
use crate::error::{Error, Result};
use crate::normalize::DesiredResourceTree;
use crate::poll::{poll_until, PollPolicy};

/// `/a/b` -> `/a`, `/a` -> `/`. The root has no parent.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Default)]
pub struct ResourcePlan {
    /// Top-most undesired resources; the service removes their subtrees.
    pub delete: Vec<Resource>,
    /// Missing paths, parents before children.
    pub create: Vec<String>,
}

pub fn plan_resources(current: &[Resource], desired: &DesiredResourceTree) -> ResourcePlan {
    let existing: HashSet<&str> = current.iter().map(|r| r.path.as_str()).collect();
    let delete = current
        .iter()
        .filter(|r| r.path != "/" && !desired.contains_key(&r.path))
        .filter(|r| parent_path(&r.path).map_or(true, |p| desired.contains_key(p)))
        .cloned()
        .collect();
    // BTreeMap keys are sorted, and a parent is a prefix of its children.
    let create = desired
        .keys()
        .filter(|path| !existing.contains(path.as_str()))
        .cloned()
        .collect();
    ResourcePlan { delete, create }
}

/// Converges the resource tree of `api` and returns the resulting resources
/// sorted by path.
pub async fn reconcile_resources(
    client: &dyn ApiGatewayClient,
    api: &RestApi,
    desired: &DesiredResourceTree,
    policy: &PollPolicy,
) -> Result<Vec<Resource>> {
    debug!(api = %api.name, "reconciling resources");
    let api_id = api.id.as_str();
    let mut current = client.get_resources(api_id).await?;
    let plan = plan_resources(&current, desired);

    if !plan.delete.is_empty() {
        let keys: Vec<_> = plan
            .delete
            .iter()
            .map(|resource| {
                info!(path = %resource.path, "deleting resource");
                resource.key()
            })
            .collect();
        try_join_all(keys.iter().map(|key| client.delete_resource(key))).await?;

        let deleted: HashSet<String> = plan.delete.iter().map(|r| r.id.clone()).collect();
        current = poll_until(
            "resource deletion",
            policy,
            move || client.get_resources(api_id),
            |resources: &Vec<Resource>| resources.iter().all(|r| !deleted.contains(&r.id)),
        )
        .await?;
    }

    if plan.create.is_empty() {
        return Ok(current);
    }

    let mut ids: BTreeMap<String, String> = current
        .iter()
        .map(|r| (r.path.clone(), r.id.clone()))
        .collect();
    for path in &plan.create {
        let parent = parent_path(path).unwrap_or("/");
        let parent_id = ids
            .get(parent)
            .cloned()
            .ok_or_else(|| Error::not_found("resource", parent))?;
        info!(path = %path, "creating resource");
        let created = client
            .create_resource(
                api_id,
                &parent_id,
                CreateResourceRequest {
                    path_part: basename(path).to_string(),
                },
            )
            .await?;
        ids.insert(path.clone(), created.id);
    }

    poll_until(
        "resource creation",
        policy,
        move || client.get_resources(api_id),
        |resources: &Vec<Resource>| {
            let listed: HashSet<&str> = resources.iter().map(|r| r.path.as_str()).collect();
            desired.keys().all(|path| listed.contains(path.as_str()))
        },
    )
    .await
}
