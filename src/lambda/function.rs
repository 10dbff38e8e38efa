use super::types::{FunctionConfiguration, FunctionSettings};

#[derive(Debug, Clone)]
pub struct LambdaFunction {
    pub function_name: String,
    pub function_arn: String,
    pub role: String,
    pub settings: FunctionSettings,
    pub code: Vec<u8>,
    pub code_size: i64,
    pub code_sha256: String,
    pub last_modified: String,
    pub policy_statements: Vec<PolicyStatement>,
}

impl LambdaFunction {
    pub fn configuration(&self) -> FunctionConfiguration {
        FunctionConfiguration {
            function_name: self.function_name.clone(),
            function_arn: self.function_arn.clone(),
            runtime: self.settings.runtime.clone(),
            role: Some(self.role.clone()),
            handler: self.settings.handler.clone(),
            code_size: self.code_size,
            description: self.settings.description.clone(),
            timeout: Some(self.settings.timeout.unwrap_or(3)),
            memory_size: Some(self.settings.memory_size.unwrap_or(128)),
            last_modified: Some(self.last_modified.clone()),
            code_sha256: Some(self.code_sha256.clone()),
            version: Some("$LATEST".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: String,
    pub principal: serde_json::Value,
    pub action: String,
    pub resource: String,
    pub source_arn: Option<String>,
}
