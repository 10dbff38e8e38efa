use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LambdaError {
    #[error("ResourceNotFoundException: {0}")]
    ResourceNotFoundException(String),
    #[error("ResourceConflictException: {0}")]
    ResourceConflictException(String),
    #[error("InvalidParameterValueException: {0}")]
    InvalidParameterValueException(String),
    #[error("ServiceException: {0}")]
    ServiceException(String),
    #[error("{error_type}: {message}")]
    Unrecognized { error_type: String, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl LambdaError {
    pub fn error_type(&self) -> &str {
        match self {
            LambdaError::ResourceNotFoundException(_) => "ResourceNotFoundException",
            LambdaError::ResourceConflictException(_) => "ResourceConflictException",
            LambdaError::InvalidParameterValueException(_) => "InvalidParameterValueException",
            LambdaError::ServiceException(_) => "ServiceException",
            LambdaError::Unrecognized { error_type, .. } => error_type,
            LambdaError::Transport(_) => "Transport",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LambdaError::ResourceNotFoundException(m)
            | LambdaError::ResourceConflictException(m)
            | LambdaError::InvalidParameterValueException(m)
            | LambdaError::ServiceException(m)
            | LambdaError::Transport(m) => m,
            LambdaError::Unrecognized { message, .. } => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LambdaError::ResourceNotFoundException(_))
    }

    pub fn from_response(status: u16, error_type: Option<&str>, message: String) -> Self {
        match error_type {
            Some("ResourceNotFoundException") => LambdaError::ResourceNotFoundException(message),
            Some("ResourceConflictException") => LambdaError::ResourceConflictException(message),
            Some("InvalidParameterValueException") => {
                LambdaError::InvalidParameterValueException(message)
            }
            Some("ServiceException") => LambdaError::ServiceException(message),
            Some(other) => LambdaError::Unrecognized {
                error_type: other.to_string(),
                message,
            },
            None => match status {
                404 => LambdaError::ResourceNotFoundException(message),
                409 => LambdaError::ResourceConflictException(message),
                400 => LambdaError::InvalidParameterValueException(message),
                500 => LambdaError::ServiceException(message),
                _ => LambdaError::Unrecognized {
                    error_type: format!("HTTP {}", status),
                    message,
                },
            },
        }
    }
}
