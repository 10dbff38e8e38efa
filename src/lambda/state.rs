use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::client::LambdaClient;
use super::error::LambdaError;
use super::function::{LambdaFunction, PolicyStatement};
use super::types::*;
use crate::journal::RecordedCall;

struct LambdaStateInner {
    functions: HashMap<String, LambdaFunction>,
    account_id: String,
    region: String,
    calls: Vec<RecordedCall>,
    failures: HashMap<&'static str, LambdaError>,
}

impl LambdaStateInner {
    fn check(&mut self, operation: &'static str, target: &str) -> Result<(), LambdaError> {
        self.calls.push(RecordedCall {
            operation,
            target: target.to_string(),
        });
        match self.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn function_mut(&mut self, function_name: &str) -> Result<&mut LambdaFunction, LambdaError> {
        let err = not_found_err(&self.account_id, &self.region, function_name);
        self.functions.get_mut(function_name).ok_or(err)
    }
}

pub struct LambdaState {
    inner: Arc<Mutex<LambdaStateInner>>,
}

fn not_found_err(account_id: &str, region: &str, function_name: &str) -> LambdaError {
    LambdaError::ResourceNotFoundException(format!(
        "Function not found: arn:aws:lambda:{}:{}:function:{}",
        region, account_id, function_name
    ))
}

impl LambdaState {
    pub fn new(account_id: String, region: String) -> Self {
        LambdaState {
            inner: Arc::new(Mutex::new(LambdaStateInner {
                functions: HashMap::new(),
                account_id,
                region,
                calls: Vec::new(),
                failures: HashMap::new(),
            })),
        }
    }

    fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        base64::engine::general_purpose::STANDARD.encode(result)
    }

    fn now_iso() -> String {
        chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3f+0000")
            .to_string()
    }

    fn make_arn(account_id: &str, region: &str, function_name: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}",
            region, account_id, function_name
        )
    }

    pub async fn fail_next(&self, operation: &'static str, err: LambdaError) {
        self.inner.lock().await.failures.insert(operation, err);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn code(&self, function_name: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner.functions.get(function_name).map(|f| f.code.clone())
    }

    pub async fn settings(&self, function_name: &str) -> Option<FunctionSettings> {
        let inner = self.inner.lock().await;
        inner.functions.get(function_name).map(|f| f.settings.clone())
    }

    pub async fn policy(&self, function_name: &str) -> Vec<PolicyStatement> {
        let inner = self.inner.lock().await;
        inner
            .functions
            .get(function_name)
            .map(|f| f.policy_statements.clone())
            .unwrap_or_default()
    }
}

fn merge_settings(current: &mut FunctionSettings, update: FunctionSettings) {
    if update.runtime.is_some() {
        current.runtime = update.runtime;
    }
    if update.handler.is_some() {
        current.handler = update.handler;
    }
    if update.description.is_some() {
        current.description = update.description;
    }
    if update.timeout.is_some() {
        current.timeout = update.timeout;
    }
    if update.memory_size.is_some() {
        current.memory_size = update.memory_size;
    }
    if update.environment.is_some() {
        current.environment = update.environment;
    }
    current.extra.extend(update.extra);
}

#[async_trait]
impl LambdaClient for LambdaState {
    async fn get_function(
        &self,
        function_name: &str,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let mut inner = self.inner.lock().await;
        inner.check("get_function", function_name)?;
        Ok(inner.function_mut(function_name)?.configuration())
    }

    async fn create_function(
        &self,
        req: CreateFunctionRequest,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let mut inner = self.inner.lock().await;
        inner.check("create_function", &req.function_name)?;

        if inner.functions.contains_key(&req.function_name) {
            return Err(LambdaError::ResourceConflictException(format!(
                "Function already exist: {}",
                req.function_name
            )));
        }
        if req.settings.runtime.is_none() {
            return Err(LambdaError::InvalidParameterValueException(
                "Runtime is required for .zip deployment packages".to_string(),
            ));
        }

        let code_bytes = req.code.zip_file;
        let func = LambdaFunction {
            function_name: req.function_name.clone(),
            function_arn: Self::make_arn(&inner.account_id, &inner.region, &req.function_name),
            role: req.role,
            settings: req.settings,
            code_sha256: Self::compute_sha256(&code_bytes),
            code_size: code_bytes.len() as i64,
            code: code_bytes,
            last_modified: Self::now_iso(),
            policy_statements: Vec::new(),
        };

        let config = func.configuration();
        inner.functions.insert(req.function_name, func);
        Ok(config)
    }

    async fn update_function_configuration(
        &self,
        req: UpdateFunctionConfigurationRequest,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let mut inner = self.inner.lock().await;
        inner.check("update_function_configuration", &req.function_name)?;
        let func = inner.function_mut(&req.function_name)?;

        func.role = req.role;
        merge_settings(&mut func.settings, req.settings);
        func.last_modified = Self::now_iso();
        Ok(func.configuration())
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        req: UpdateFunctionCodeRequest,
    ) -> Result<FunctionConfiguration, LambdaError> {
        let mut inner = self.inner.lock().await;
        inner.check("update_function_code", function_name)?;
        let func = inner.function_mut(function_name)?;

        func.code_sha256 = Self::compute_sha256(&req.zip_file);
        func.code_size = req.zip_file.len() as i64;
        func.code = req.zip_file;
        func.last_modified = Self::now_iso();
        Ok(func.configuration())
    }

    async fn add_permission(
        &self,
        function_name: &str,
        req: AddPermissionRequest,
    ) -> Result<AddPermissionResponse, LambdaError> {
        let mut inner = self.inner.lock().await;
        inner.check("add_permission", function_name)?;
        let func = inner.function_mut(function_name)?;

        if func.policy_statements.iter().any(|s| s.sid == req.statement_id) {
            return Err(LambdaError::ResourceConflictException(format!(
                "The statement id ({}) provided already exists. Please provide a new statement id, or remove the existing statement.",
                req.statement_id
            )));
        }

        let statement = PolicyStatement {
            sid: req.statement_id,
            effect: "Allow".to_string(),
            principal: serde_json::json!({ "Service": req.principal }),
            action: req.action,
            resource: func.function_arn.clone(),
            source_arn: req.source_arn,
        };
        func.policy_statements.push(statement.clone());

        let mut statement_json = serde_json::json!({
            "Sid": statement.sid,
            "Effect": statement.effect,
            "Principal": statement.principal,
            "Action": statement.action,
            "Resource": statement.resource,
        });
        if let Some(source_arn) = statement.source_arn {
            statement_json["Condition"] =
                serde_json::json!({ "ArnLike": { "AWS:SourceArn": source_arn } });
        }

        Ok(AddPermissionResponse {
            statement: statement_json.to_string(),
        })
    }

    async fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
    ) -> Result<(), LambdaError> {
        let mut inner = self.inner.lock().await;
        inner.check("remove_permission", function_name)?;
        let func = inner.function_mut(function_name)?;

        let len_before = func.policy_statements.len();
        func.policy_statements.retain(|s| s.sid != statement_id);
        if func.policy_statements.len() == len_before {
            return Err(LambdaError::ResourceNotFoundException(format!(
                "Statement {} is not found in resource policy.",
                statement_id
            )));
        }
        Ok(())
    }
}
