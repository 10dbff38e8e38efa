//! The network backends against a stub speaking the providers' wire formats.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use apigw_deployer::config::Document;
use apigw_deployer::iam::http::HttpIam;
use apigw_deployer::iam::IamClient;
use apigw_deployer::lambda::http::HttpLambda;
use apigw_deployer::lambda::LambdaClient;
use apigw_deployer::transport::Transport;
use apigw_deployer::{Clients, Deployer, ErrorKind};

const FUNCTION_ARN: &str = "arn:aws:lambda:us-west-2:123456789012:function:pets-fn";

#[derive(Debug, Clone)]
struct Captured {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

#[derive(Clone, Default)]
struct Stub {
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl Stub {
    fn capture(&self, method: &str, path: String, headers: &HeaderMap, body: String) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(Captured {
            method: method.to_string(),
            path,
            authorization,
            body,
        });
    }

    fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

fn aws_error(status: StatusCode, error_type: &'static str, message: &str) -> Response {
    (
        status,
        [("x-amzn-errortype", error_type)],
        Json(json!({ "message": message })),
    )
        .into_response()
}

async fn list_apis(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    stub.capture("GET", "/restapis".into(), &headers, String::new());
    assert_eq!(query.get("limit").map(String::as_str), Some("500"));
    match query.get("position").map(String::as_str) {
        None => Json(json!({
            "item": [{ "id": "other1", "name": "other" }],
            "position": "page-2"
        })),
        Some("page-2") => Json(json!({
            "item": [{ "id": "api1", "name": "pets", "description": "Pet store" }]
        })),
        Some(other) => panic!("unexpected position {}", other),
    }
}

async fn list_stages(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Path(api_id): Path<String>,
) -> Json<Value> {
    stub.capture("GET", format!("/restapis/{}/stages", api_id), &headers, String::new());
    Json(json!({
        "item": [
            { "stageName": "prod", "deploymentId": "d1", "description": "production" },
            { "stageName": "dev", "deploymentId": "d2" }
        ]
    }))
}

async fn create_deployment(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Path(api_id): Path<String>,
    body: String,
) -> Json<Value> {
    stub.capture("POST", format!("/restapis/{}/deployments", api_id), &headers, body.clone());
    let request: Value = serde_json::from_str(&body).unwrap();
    Json(json!({ "id": "d9", "description": request["description"] }))
}

async fn get_function(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    stub.capture(
        "GET",
        format!("/2015-03-31/functions/{}", name),
        &headers,
        String::new(),
    );
    if name != "pets-fn" {
        return aws_error(
            StatusCode::NOT_FOUND,
            "ResourceNotFoundException",
            &format!("Function not found: {}", name),
        );
    }
    Json(json!({
        "Configuration": {
            "FunctionName": "pets-fn",
            "FunctionArn": FUNCTION_ARN,
            "Runtime": "nodejs20.x",
            "CodeSize": 42
        }
    }))
    .into_response()
}

async fn add_permission(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: String,
) -> (StatusCode, Json<Value>) {
    stub.capture(
        "POST",
        format!("/2015-03-31/functions/{}/policy", name),
        &headers,
        body,
    );
    (
        StatusCode::CREATED,
        Json(json!({ "Statement": "{\"Sid\":\"ExecuteFromApiGateway\"}" })),
    )
}

async fn remove_permission(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Path((name, sid)): Path<(String, String)>,
) -> Response {
    stub.capture(
        "DELETE",
        format!("/2015-03-31/functions/{}/policy/{}", name, sid),
        &headers,
        String::new(),
    );
    aws_error(
        StatusCode::NOT_FOUND,
        "ResourceNotFoundException",
        "The resource you requested does not exist.",
    )
}

async fn iam(State(stub): State<Stub>, headers: HeaderMap, body: String) -> Response {
    stub.capture("POST", "/".into(), &headers, body.clone());
    let form: HashMap<String, String> = form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    assert_eq!(form.get("Action").map(String::as_str), Some("GetRole"));
    assert_eq!(form.get("Version").map(String::as_str), Some("2010-05-08"));
    let role = form.get("RoleName").cloned().unwrap_or_default();
    if role == "pets-role" {
        let xml = format!(
            r#"<GetRoleResponse xmlns="https://iam.amazonaws.com/doc/2010-05-08/">
  <GetRoleResult>
    <Role>
      <Path>/</Path>
      <RoleName>{role}</RoleName>
      <Arn>arn:aws:iam::123456789012:role/{role}</Arn>
    </Role>
  </GetRoleResult>
</GetRoleResponse>"#
        );
        ([(header::CONTENT_TYPE, "text/xml")], xml).into_response()
    } else {
        let xml = format!(
            r#"<ErrorResponse xmlns="https://iam.amazonaws.com/doc/2010-05-08/">
  <Error>
    <Type>Sender</Type>
    <Code>NoSuchEntity</Code>
    <Message>The role with name {role} cannot be found.</Message>
  </Error>
</ErrorResponse>"#
        );
        (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/xml")], xml).into_response()
    }
}

async fn start(stub: Stub) -> String {
    let app = Router::new()
        .route("/", post(iam))
        .route("/restapis", get(list_apis))
        .route("/restapis/{api_id}/stages", get(list_stages))
        .route("/restapis/{api_id}/deployments", post(create_deployment))
        .route("/2015-03-31/functions/{name}", get(get_function))
        .route("/2015-03-31/functions/{name}/policy", post(add_permission))
        .route(
            "/2015-03-31/functions/{name}/policy/{sid}",
            delete(remove_permission),
        )
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn deployer(endpoint: &str) -> Deployer {
    let yaml = format!(
        r#"
config:
  region: us-west-2
  accessKeyId: AKIDEXAMPLE
  secretAccessKey: wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY
  endpoint: {endpoint}
lambda:
  FunctionName: pets-fn
  RoleName: pets-role
apiGateway:
  name: pets
"#
    );
    let document = Document::from_yaml(&yaml, PathBuf::new()).unwrap();
    let clients = Clients::http(&document.config).unwrap();
    Deployer::new(document, clients)
}

fn unsigned_transport() -> Arc<Transport> {
    Arc::new(Transport::new("us-west-2", None))
}

#[tokio::test]
async fn stages_follow_api_pagination_and_are_sorted() {
    let stub = Stub::default();
    let endpoint = start(stub.clone()).await;

    let stages = deployer(&endpoint).get_api_stages().await.unwrap();
    let names: Vec<&str> = stages.iter().map(|s| s.stage_name.as_str()).collect();
    assert_eq!(names, vec!["dev", "prod"]);
    assert_eq!(
        stages[1].invoke_url,
        "https://api1.execute-api.us-west-2.amazonaws.com/prod"
    );
    assert_eq!(stages[1].description.as_deref(), Some("production"));

    let requests = stub.requests();
    let paths: Vec<&str> = requests.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/restapis", "/restapis", "/restapis/api1/stages"]);
}

#[tokio::test]
async fn deployment_carries_stage_and_descriptions() {
    let stub = Stub::default();
    let endpoint = start(stub.clone()).await;

    let deployment = deployer(&endpoint)
        .deploy_api(Some("release 7".into()), "prod", Some("production".into()))
        .await
        .unwrap();
    assert_eq!(deployment.id, "d9");
    assert_eq!(deployment.description.as_deref(), Some("release 7"));

    let requests = stub.requests();
    let posted = requests
        .iter()
        .find(|r| r.method == "POST" && r.path == "/restapis/api1/deployments")
        .unwrap();
    let body: Value = serde_json::from_str(&posted.body).unwrap();
    assert_eq!(
        body,
        json!({
            "stageName": "prod",
            "stageDescription": "production",
            "description": "release 7"
        })
    );
}

#[tokio::test]
async fn requests_are_signed_with_configured_keys() {
    let stub = Stub::default();
    let endpoint = start(stub.clone()).await;

    deployer(&endpoint).get_api_stages().await.unwrap();
    for request in stub.requests() {
        let authorization = request.authorization.unwrap();
        assert!(
            authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"),
            "{}",
            authorization
        );
        assert!(authorization.contains("/us-west-2/apigateway/aws4_request"));
    }
}

#[tokio::test]
async fn invoke_grant_survives_missing_statement() {
    let stub = Stub::default();
    let endpoint = start(stub.clone()).await;

    let granted = deployer(&endpoint).grant_invoke_permission().await.unwrap();
    assert!(granted.statement.contains("ExecuteFromApiGateway"));

    let requests = stub.requests();
    let methods: Vec<(&str, &str)> = requests
        .iter()
        .map(|r| (r.method.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(
        methods,
        vec![
            ("GET", "/2015-03-31/functions/pets-fn"),
            (
                "DELETE",
                "/2015-03-31/functions/pets-fn/policy/ExecuteFromApiGateway"
            ),
            ("POST", "/2015-03-31/functions/pets-fn/policy"),
        ]
    );
    let body: Value = serde_json::from_str(&requests[2].body).unwrap();
    assert_eq!(
        body,
        json!({
            "StatementId": "ExecuteFromApiGateway",
            "Action": "lambda:InvokeFunction",
            "Principal": "apigateway.amazonaws.com",
            "SourceArn": "arn:aws:execute-api:us-west-2:123456789012:*"
        })
    );
}

#[tokio::test]
async fn lambda_not_found_is_classified() {
    let stub = Stub::default();
    let endpoint = start(stub).await;
    let lambda = HttpLambda::new(unsigned_transport(), endpoint);

    let function = lambda.get_function("pets-fn").await.unwrap();
    assert_eq!(function.function_arn, FUNCTION_ARN);
    assert_eq!(function.account_id(), Some("123456789012"));

    let err = lambda.get_function("ghost").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.message(), "Function not found: ghost");
}

#[tokio::test]
async fn role_lookup_decodes_xml() {
    let stub = Stub::default();
    let endpoint = start(stub.clone()).await;
    let iam = HttpIam::new(unsigned_transport(), endpoint);

    let role = iam.get_role("pets-role").await.unwrap();
    assert_eq!(role.arn, "arn:aws:iam::123456789012:role/pets-role");

    let err = iam.get_role("ghost").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(stub.requests().iter().all(|r| r.authorization.is_none()));
}

#[tokio::test]
async fn publish_stops_when_role_is_missing() {
    let stub = Stub::default();
    let endpoint = start(stub.clone()).await;
    let yaml = format!(
        "config:\n  endpoint: {}\n  accessKeyId: AKID\n  secretAccessKey: secret\nlambda:\n  FunctionName: pets-fn\n  RoleName: ghost\n",
        endpoint
    );
    let document = Document::from_yaml(&yaml, PathBuf::new()).unwrap();
    let clients = Clients::http(&document.config).unwrap();
    let err = Deployer::new(document, clients)
        .publish_function(b"zip")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(stub.requests().len(), 1);
}
