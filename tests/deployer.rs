use std::path::PathBuf;
use std::sync::Arc;

use apigw_deployer::apigateway::error::ApiGatewayError;
use apigw_deployer::apigateway::state::ApiGatewayState;
use apigw_deployer::apigateway::ApiGatewayClient;
use apigw_deployer::config::Document;
use apigw_deployer::deployer::{DEFAULT_RUNTIME, STATEMENT_ID};
use apigw_deployer::iam::state::IamState;
use apigw_deployer::journal::RecordedCall;
use apigw_deployer::lambda::error::LambdaError;
use apigw_deployer::lambda::state::LambdaState;
use apigw_deployer::{Clients, Deployer, ErrorKind};

const ACCOUNT: &str = "123456789012";
const REGION: &str = "us-west-2";

const PETS: &str = r#"
config:
  region: us-west-2
  consistency:
    intervalMs: 0
    maxAttempts: 5
apiGateway:
  name: pets
  description: Pet store
  resources:
    /pets: [GET, POST]
    /pets/{petId}:
      GET:
        request:
          type: MOCK
          requestTemplates:
            application/json: '{"statusCode": 200}'
        responses:
          200:
            responseTemplates:
              application/json: ''
              text/plain: ''
  methodDefinitions:
    _DEFAULT_:
      request:
        type: MOCK
        requestTemplates:
          application/json: '{"statusCode": 200}'
      responses:
        200:
          responseHeaders:
            Access-Control-Allow-Origin: "'*'"
        400:
          selectionPattern: '^\[BadRequest\].*'
"#;

const LAMBDA_API: &str = r#"
config:
  region: us-west-2
  consistency:
    intervalMs: 0
    maxAttempts: 5
lambda:
  FunctionName: pets-fn
  RoleName: pets-role
  Handler: index.handler
apiGateway:
  name: pets
  resources:
    /pets: [GET]
  methodDefinitions:
    _DEFAULT_:
      request:
        type: Lambda
      responses:
        200: {}
"#;

struct Harness {
    apigateway: Arc<ApiGatewayState>,
    lambda: Arc<LambdaState>,
    iam: Arc<IamState>,
}

impl Harness {
    fn new() -> Self {
        Harness {
            apigateway: Arc::new(ApiGatewayState::new(REGION.to_string())),
            lambda: Arc::new(LambdaState::new(ACCOUNT.to_string(), REGION.to_string())),
            iam: Arc::new(IamState::new(ACCOUNT.to_string())),
        }
    }

    fn deployer(&self, yaml: &str) -> Deployer {
        self.deployer_in(yaml, PathBuf::new())
    }

    fn deployer_in(&self, yaml: &str, base_dir: PathBuf) -> Deployer {
        let document = Document::from_yaml(yaml, base_dir).unwrap();
        let clients = Clients {
            apigateway: self.apigateway.clone(),
            lambda: self.lambda.clone(),
            iam: self.iam.clone(),
        };
        Deployer::new(document, clients)
    }

    async fn paths(&self, api_id: &str) -> Vec<String> {
        self.apigateway
            .get_resources(api_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect()
    }
}

fn targets<'a>(calls: &'a [RecordedCall], operation: &str) -> Vec<&'a str> {
    calls
        .iter()
        .filter(|c| c.operation == operation)
        .map(|c| c.target.as_str())
        .collect()
}

#[tokio::test]
async fn update_builds_tree_and_second_run_writes_nothing() {
    let h = Harness::new();
    let deployer = h.deployer(PETS);

    let api = deployer.update_api().await.unwrap();
    assert_eq!(api.name, "pets");
    assert_eq!(h.paths(&api.id).await, vec!["/", "/pets", "/pets/{petId}"]);

    let resources = h.apigateway.get_resources(&api.id).await.unwrap();
    let by_id = resources.iter().find(|r| r.path == "/pets/{petId}").unwrap();
    let method = h
        .apigateway
        .get_method(&by_id.method_key("GET"))
        .await
        .unwrap();
    assert_eq!(method.authorization_type, "NONE");
    assert!(method.request_parameters["method.request.path.petId"]);
    assert_eq!(
        method.method_responses["200"].response_models["application/json"],
        "Empty"
    );

    let pets = resources.iter().find(|r| r.path == "/pets").unwrap();
    let listed: Vec<&str> = pets.resource_methods.iter().map(String::as_str).collect();
    assert_eq!(listed, vec!["GET", "POST"]);
    let post = h.apigateway.get_method(&pets.method_key("POST")).await.unwrap();
    let integration = post.method_integration.unwrap();
    assert_eq!(integration.integration_type, "MOCK");
    let ok = &integration.integration_responses["200"];
    assert_eq!(
        ok.response_parameters["method.response.header.Access-Control-Allow-Origin"],
        "'*'"
    );
    assert_eq!(
        integration.integration_responses["400"].selection_pattern.as_deref(),
        Some("^\\[BadRequest\\].*")
    );

    h.apigateway.clear_calls().await;
    deployer.update_api().await.unwrap();
    assert_eq!(h.apigateway.writes().await, vec![]);
}

#[tokio::test]
async fn empty_templates_reported_as_null_do_not_cause_rewrites() {
    let h = Harness::new();
    let deployer = h.deployer(PETS);
    let api = deployer.update_api().await.unwrap();

    let resources = h.apigateway.get_resources(&api.id).await.unwrap();
    let resource = resources.iter().find(|r| r.path == "/pets/{petId}").unwrap();
    let method = h
        .apigateway
        .get_method(&resource.method_key("GET"))
        .await
        .unwrap();
    let templates = &method.method_integration.unwrap().integration_responses["200"]
        .response_templates;
    assert_eq!(templates["application/json"], None);
    assert_eq!(templates["text/plain"], None);

    h.apigateway.clear_calls().await;
    deployer.update_api().await.unwrap();
    let calls = h.apigateway.writes().await;
    assert!(targets(&calls, "put_integration_response").is_empty());
}

#[tokio::test]
async fn empty_request_parameters_and_templates_do_not_cause_rewrites() {
    let h = Harness::new();
    let yaml = r#"
config:
  consistency: { intervalMs: 0 }
apiGateway:
  name: quiet
  resources:
    /pets:
      GET:
        request:
          type: MOCK
          requestParameters: {}
          requestTemplates:
            application/json: ''
        responses:
          200: {}
"#;
    let deployer = h.deployer(yaml);
    let api = deployer.update_api().await.unwrap();

    let resources = h.apigateway.get_resources(&api.id).await.unwrap();
    let pets = resources.iter().find(|r| r.path == "/pets").unwrap();
    let method = h.apigateway.get_method(&pets.method_key("GET")).await.unwrap();
    let integration = method.method_integration.unwrap();
    assert!(integration.request_parameters.is_empty());
    assert_eq!(integration.request_templates["application/json"], None);

    h.apigateway.clear_calls().await;
    deployer.update_api().await.unwrap();
    assert_eq!(h.apigateway.writes().await, vec![]);
}

#[tokio::test]
async fn parents_are_created_before_children() {
    let h = Harness::new();
    let yaml = r#"
config:
  consistency: { intervalMs: 0 }
apiGateway:
  name: deep
  resources:
    /a/b/c: [GET]
    /a-z: [GET]
  methodDefinitions:
    _DEFAULT_:
      request: { type: MOCK }
"#;
    h.deployer(yaml).update_api().await.unwrap();
    let calls = h.apigateway.calls().await;
    let created = targets(&calls, "create_resource");
    let position = |path: &str| created.iter().position(|p| *p == path).unwrap();
    assert!(position("/a") < position("/a/b"));
    assert!(position("/a/b") < position("/a/b/c"));
    assert_eq!(created.len(), 4);

    // Every method write comes after the resource it lives on exists.
    let last_create = calls
        .iter()
        .rposition(|c| c.operation == "create_resource")
        .unwrap();
    let first_method = calls
        .iter()
        .position(|c| c.operation == "put_method")
        .unwrap();
    assert!(last_create < first_method);
}

#[tokio::test]
async fn undesired_entities_are_deleted_exactly_once() {
    let h = Harness::new();
    let before = r#"
config:
  consistency: { intervalMs: 0 }
apiGateway:
  name: shrink
  resources:
    /keep: [GET, POST]
    /old/child: [GET]
  methodDefinitions:
    _DEFAULT_:
      request: { type: MOCK }
      responses:
        200: {}
        400: { selectionPattern: 'bad.*' }
"#;
    let after = r#"
config:
  consistency: { intervalMs: 0 }
apiGateway:
  name: shrink
  resources:
    /keep: [GET]
  methodDefinitions:
    _DEFAULT_:
      request: { type: MOCK }
      responses:
        200: {}
"#;
    let api = h.deployer(before).update_api().await.unwrap();
    h.apigateway.clear_calls().await;

    h.deployer(after).update_api().await.unwrap();
    let writes = h.apigateway.writes().await;
    assert_eq!(targets(&writes, "delete_resource"), vec!["/old"]);
    assert_eq!(targets(&writes, "delete_method"), vec!["POST:/keep"]);
    assert_eq!(targets(&writes, "delete_method_response"), vec!["GET:/keep 400"]);
    assert_eq!(
        targets(&writes, "delete_integration_response"),
        vec!["GET:/keep 400"]
    );
    assert!(targets(&writes, "create_resource").is_empty());
    assert!(targets(&writes, "put_method").is_empty());
    assert_eq!(h.paths(&api.id).await, vec!["/", "/keep"]);
}

#[tokio::test]
async fn changed_integration_is_replaced_with_its_responses() {
    let h = Harness::new();
    let api = h.deployer(PETS).update_api().await.unwrap();
    h.apigateway.clear_calls().await;

    let changed = PETS.replace(
        r#"application/json: '{"statusCode": 200}'
      responses:
        200:
          responseHeaders"#,
        r#"application/json: '{"statusCode": 201}'
      responses:
        200:
          responseHeaders"#,
    );
    assert_ne!(changed, PETS);
    h.deployer(&changed).update_api().await.unwrap();
    let writes = h.apigateway.writes().await;
    let mut replaced = targets(&writes, "put_integration");
    replaced.sort();
    assert_eq!(replaced, vec!["GET:/pets", "POST:/pets"]);
    assert_eq!(targets(&writes, "put_integration_response").len(), 4);
    assert!(targets(&writes, "put_method_response").is_empty());

    h.apigateway.clear_calls().await;
    h.deployer(&changed).update_api().await.unwrap();
    assert_eq!(h.apigateway.writes().await, vec![]);
    assert_eq!(h.paths(&api.id).await.len(), 3);
}

#[tokio::test]
async fn lagging_listings_are_polled_until_consistent() {
    let h = Harness::new();
    h.apigateway.set_read_lag(2).await;
    let api = h.deployer(PETS).update_api().await.unwrap();
    assert_eq!(h.paths(&api.id).await.len(), 3);
}

#[tokio::test]
async fn lag_beyond_the_attempt_cap_times_out() {
    let h = Harness::new();
    h.apigateway.set_read_lag(10).await;
    let yaml = PETS.replace("maxAttempts: 5", "maxAttempts: 2");
    let err = h.deployer(&yaml).update_api().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn remote_rejection_aborts_the_update() {
    let h = Harness::new();
    h.apigateway
        .fail_next(
            "put_integration",
            ApiGatewayError::BadRequestException("Invalid mapping expression".into()),
        )
        .await;
    let err = h.deployer(PETS).update_api().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert!(err.to_string().contains("Invalid mapping expression"));
}

#[tokio::test]
async fn description_drift_is_patched() {
    let h = Harness::new();
    let api = h.deployer(PETS).update_api().await.unwrap();
    assert_eq!(api.description.as_deref(), Some("Pet store"));

    let renamed = PETS.replace("description: Pet store", "description: Pet shop");
    h.apigateway.clear_calls().await;
    let api = h.deployer(&renamed).update_api().await.unwrap();
    assert_eq!(api.description.as_deref(), Some("Pet shop"));
    let writes = h.apigateway.writes().await;
    assert_eq!(targets(&writes, "update_rest_api"), vec![api.id.as_str()]);
    assert!(targets(&writes, "create_rest_api").is_empty());
}

#[tokio::test]
async fn template_files_are_read_relative_to_the_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("templates")).unwrap();
    std::fs::write(dir.path().join("templates/get.vtl"), "{\"id\": 7}").unwrap();
    let yaml = r#"
config:
  consistency: { intervalMs: 0 }
apiGateway:
  name: files
  resources:
    /item:
      GET:
        request:
          type: MOCK
          requestTemplates:
            application/json: { file: templates/get.vtl }
"#;
    let h = Harness::new();
    let api = h
        .deployer_in(yaml, dir.path().to_path_buf())
        .update_api()
        .await
        .unwrap();
    let resources = h.apigateway.get_resources(&api.id).await.unwrap();
    let item = resources.iter().find(|r| r.path == "/item").unwrap();
    let method = h.apigateway.get_method(&item.method_key("GET")).await.unwrap();
    assert_eq!(
        method.method_integration.unwrap().request_templates["application/json"].as_deref(),
        Some("{\"id\": 7}")
    );
}

#[tokio::test]
async fn missing_template_file_fails_only_when_sent() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = r#"
config:
  consistency: { intervalMs: 0 }
apiGateway:
  name: files
  resources:
    /item:
      GET:
        request:
          type: MOCK
          requestTemplates:
            application/json: { file: missing.vtl }
"#;
    let h = Harness::new();
    let err = h
        .deployer_in(yaml, dir.path().to_path_buf())
        .update_api()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn lambda_shorthand_points_at_the_published_function() {
    let h = Harness::new();
    h.iam.add_role("pets-role").await;
    let deployer = h.deployer(LAMBDA_API);
    let function = deployer.publish_function(b"zip-v1").await.unwrap();

    let api = deployer.update_api().await.unwrap();
    let resources = h.apigateway.get_resources(&api.id).await.unwrap();
    let pets = resources.iter().find(|r| r.path == "/pets").unwrap();
    let method = h.apigateway.get_method(&pets.method_key("GET")).await.unwrap();
    let integration = method.method_integration.unwrap();
    assert_eq!(integration.integration_type, "AWS");
    assert_eq!(integration.http_method.as_deref(), Some("POST"));
    assert_eq!(
        integration.uri.unwrap(),
        format!(
            "arn:aws:apigateway:us-west-2:lambda:path/2015-03-31/functions/{}/invocations",
            function.function_arn
        )
    );
    assert!(integration.request_templates["application/json"].is_some());

    h.apigateway.clear_calls().await;
    deployer.update_api().await.unwrap();
    assert_eq!(h.apigateway.writes().await, vec![]);
}

#[tokio::test]
async fn lambda_shorthand_without_function_is_not_found() {
    let h = Harness::new();
    let err = h.deployer(LAMBDA_API).update_api().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.apigateway.writes().await.is_empty());
}

#[tokio::test]
async fn deploy_requires_an_existing_api() {
    let h = Harness::new();
    let deployer = h.deployer(PETS);
    let err = deployer.deploy_api(None, "prod", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("pets"));

    let err = deployer.get_api_stages().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deployments_show_up_as_sorted_stages() {
    let h = Harness::new();
    let deployer = h.deployer(PETS);
    let api = deployer.update_api().await.unwrap();

    let prod = deployer
        .deploy_api(Some("first".into()), "prod", Some("production".into()))
        .await
        .unwrap();
    deployer.deploy_api(None, "dev", None).await.unwrap();

    let stages = deployer.get_api_stages().await.unwrap();
    let names: Vec<&str> = stages.iter().map(|s| s.stage_name.as_str()).collect();
    assert_eq!(names, vec!["dev", "prod"]);
    let prod_stage = &stages[1];
    assert_eq!(prod_stage.deployment_id.as_deref(), Some(prod.id.as_str()));
    assert_eq!(prod_stage.description.as_deref(), Some("production"));
    assert_eq!(
        prod_stage.invoke_url,
        format!("https://{}.execute-api.us-west-2.amazonaws.com/prod", api.id)
    );
}

#[tokio::test]
async fn publish_creates_then_updates() {
    let h = Harness::new();
    let role_arn = h.iam.add_role("pets-role").await;
    let deployer = h.deployer(LAMBDA_API);

    let created = deployer.publish_function(b"zip-v1").await.unwrap();
    assert_eq!(created.role.as_deref(), Some(role_arn.as_str()));
    assert_eq!(created.runtime.as_deref(), Some(DEFAULT_RUNTIME));
    assert_eq!(created.handler.as_deref(), Some("index.handler"));

    deployer.publish_function(b"zip-v2").await.unwrap();
    assert_eq!(h.lambda.code("pets-fn").await.unwrap(), b"zip-v2".to_vec());

    let calls = h.lambda.calls().await;
    let operations: Vec<&str> = calls.iter().map(|c| c.operation).collect();
    assert_eq!(
        operations,
        vec![
            "get_function",
            "create_function",
            "get_function",
            "update_function_configuration",
            "update_function_code",
        ]
    );
}

#[tokio::test]
async fn publish_needs_the_role() {
    let h = Harness::new();
    let err = h
        .deployer(LAMBDA_API)
        .publish_function(b"zip")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("pets-role"));
    assert!(h.lambda.calls().await.is_empty());
}

#[tokio::test]
async fn publish_stops_on_unexpected_lookup_errors() {
    let h = Harness::new();
    h.iam.add_role("pets-role").await;
    h.lambda
        .fail_next("get_function", LambdaError::ServiceException("down".into()))
        .await;
    let err = h
        .deployer(LAMBDA_API)
        .publish_function(b"zip")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    let calls = h.lambda.calls().await;
    assert!(targets(&calls, "create_function").is_empty());
}

#[tokio::test]
async fn invoke_permission_is_granted_and_replaced() {
    let h = Harness::new();
    h.iam.add_role("pets-role").await;
    let deployer = h.deployer(LAMBDA_API);
    deployer.publish_function(b"zip").await.unwrap();

    // Nothing to remove on the first run.
    deployer.grant_invoke_permission().await.unwrap();
    deployer.grant_invoke_permission().await.unwrap();

    let policy = h.lambda.policy("pets-fn").await;
    assert_eq!(policy.len(), 1);
    let statement = &policy[0];
    assert_eq!(statement.sid, STATEMENT_ID);
    assert_eq!(statement.action, "lambda:InvokeFunction");
    assert_eq!(
        statement.principal,
        serde_json::json!({"Service": "apigateway.amazonaws.com"})
    );
    assert_eq!(
        statement.source_arn.as_deref(),
        Some("arn:aws:execute-api:us-west-2:123456789012:*")
    );
}

#[tokio::test]
async fn permission_removal_failure_is_tolerated() {
    let h = Harness::new();
    h.iam.add_role("pets-role").await;
    let deployer = h.deployer(LAMBDA_API);
    deployer.publish_function(b"zip").await.unwrap();
    h.lambda
        .fail_next(
            "remove_permission",
            LambdaError::ServiceException("throttled".into()),
        )
        .await;

    let granted = deployer.grant_invoke_permission().await.unwrap();
    assert!(granted.statement.contains(STATEMENT_ID));
}

#[tokio::test]
async fn permission_for_missing_function_is_not_found() {
    let h = Harness::new();
    let err = h
        .deployer(LAMBDA_API)
        .grant_invoke_permission()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let calls = h.lambda.calls().await;
    assert!(targets(&calls, "add_permission").is_empty());
}

#[tokio::test]
async fn missing_sections_are_configuration_errors() {
    let h = Harness::new();
    let deployer = h.deployer("apiGateway:\n  name: only-api\n");
    let err = deployer.publish_function(b"zip").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let deployer = h.deployer("lambda:\n  FunctionName: f\n  RoleName: r\n");
    let err = deployer.update_api().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
