//! Expansion of the configured resources into a fully explicit tree.
//!
//! Every step only fills gaps, so running any of them twice changes nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{ApiGatewaySpec, IntegrationType, MethodSpec, ResourceEntry, TemplateSource};
use crate::error::{Error, Result};

pub const DEFAULT_METHOD_KEY: &str = "_DEFAULT_";

const LAMBDA_REQUEST_TEMPLATE: &str = include_str!("../assets/lambda_request_template.vtl");

/// Verb to method spec for one path.
pub type DesiredMethods = BTreeMap<String, MethodSpec>;

/// Path to its methods. Every ancestor of every path is a key, `/` included.
pub type DesiredResourceTree = BTreeMap<String, DesiredMethods>;

fn validate_path(path: &str) -> Result<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(Error::Configuration(format!(
            "resource path {:?} must start with / and have no empty segments",
            path
        )));
    }
    Ok(())
}

/// `/a/b` -> `["/", "/a", "/a/b"]`
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

/// Adds `/` and every missing ancestor path with no methods.
pub fn expand_ancestors(resources: &mut BTreeMap<String, ResourceEntry>) {
    let declared: Vec<String> = resources.keys().cloned().collect();
    resources.entry("/".to_string()).or_default();
    for path in declared {
        for ancestor in ancestors(&path) {
            resources.entry(ancestor).or_default();
        }
    }
}

/// Replaces verb lists with concrete specs: the named definition, else
/// `_DEFAULT_`, else an empty spec. Verbs are upper-cased.
pub fn expand_method_lists(
    resources: BTreeMap<String, ResourceEntry>,
    definitions: &BTreeMap<String, MethodSpec>,
) -> DesiredResourceTree {
    resources
        .into_iter()
        .map(|(path, entry)| {
            let methods = match entry {
                ResourceEntry::Methods(verbs) => verbs
                    .into_iter()
                    .map(|verb| {
                        let spec = definitions
                            .get(&verb)
                            .or_else(|| definitions.get(DEFAULT_METHOD_KEY))
                            .cloned()
                            .unwrap_or_default();
                        (verb.to_uppercase(), spec)
                    })
                    .collect(),
                ResourceEntry::Definitions(specs) => specs
                    .into_iter()
                    .map(|(verb, spec)| (verb.to_uppercase(), spec))
                    .collect(),
            };
            (path, methods)
        })
        .collect()
}

/// Builds the explicit tree from the configured resources. Lambda shorthand
/// and template files are left for [`finish`].
pub fn desired_tree(spec: &ApiGatewaySpec) -> Result<DesiredResourceTree> {
    for path in spec.resources.keys() {
        validate_path(path)?;
    }
    let mut resources = spec.resources.clone();
    expand_ancestors(&mut resources);
    Ok(expand_method_lists(resources, &spec.method_definitions))
}

pub fn uses_lambda(tree: &DesiredResourceTree) -> bool {
    tree.values()
        .flat_map(|methods| methods.values())
        .any(|spec| spec.request.integration_type == Some(IntegrationType::Lambda))
}

pub fn lambda_invocation_uri(region: &str, lambda_arn: &str) -> String {
    format!(
        "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
        region, lambda_arn
    )
}

/// Rewrites every `Lambda` integration as an `AWS` POST to the function's
/// invocation URI, with the built-in request template unless one is
/// configured for `application/json`.
pub fn expand_lambda_integrations(tree: &mut DesiredResourceTree, region: &str, lambda_arn: &str) {
    let uri = lambda_invocation_uri(region, lambda_arn);
    for (path, methods) in tree.iter_mut() {
        for (verb, spec) in methods.iter_mut() {
            let request = &mut spec.request;
            if request.integration_type != Some(IntegrationType::Lambda) {
                continue;
            }
            debug!(path = %path, verb = %verb, "expanding lambda integration");
            request.integration_type = Some(IntegrationType::Aws);
            request.integration_http_method = Some("POST".to_string());
            request.uri = Some(uri.clone());
            request
                .request_templates
                .entry("application/json".to_string())
                .or_insert_with(|| TemplateSource::Inline(LAMBDA_REQUEST_TEMPLATE.to_string()));
        }
    }
}

/// Inlines `{file: ...}` request templates whose file exists. Missing files
/// stay as references and are returned so the caller can report them.
pub fn resolve_template_files(
    tree: &mut DesiredResourceTree,
    base_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut unresolved = Vec::new();
    for methods in tree.values_mut() {
        for spec in methods.values_mut() {
            for template in spec.request.request_templates.values_mut() {
                let TemplateSource::File { file } = template else {
                    continue;
                };
                let path = base_dir.join(&*file);
                if !path.is_file() {
                    unresolved.push(path);
                    continue;
                }
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| Error::io(format!("reading template {}", path.display()), e))?;
                *template = TemplateSource::Inline(text);
            }
        }
    }
    Ok(unresolved)
}

/// Expands Lambda shorthand and inlines template files. A tree using the
/// shorthand needs `lambda_arn`.
pub fn finish(
    tree: &mut DesiredResourceTree,
    region: &str,
    lambda_arn: Option<&str>,
    base_dir: &Path,
) -> Result<()> {
    if uses_lambda(tree) {
        let arn = lambda_arn.ok_or_else(|| {
            Error::Configuration("Lambda integrations need a configured function".to_string())
        })?;
        expand_lambda_integrations(tree, region, arn);
    }
    for path in resolve_template_files(tree, base_dir)? {
        warn!(file = %path.display(), "request template file not found, left unresolved");
    }
    Ok(())
}
