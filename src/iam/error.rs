use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum IamError {
    #[error("NoSuchEntity: {0}")]
    NoSuchEntity(String),
    #[error("AccessDenied: {0}")]
    AccessDenied(String),
    #[error("ServiceFailure: {0}")]
    ServiceFailure(String),
    #[error("{error_type}: {message}")]
    Unrecognized { error_type: String, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl IamError {
    pub fn error_type(&self) -> &str {
        match self {
            IamError::NoSuchEntity(_) => "NoSuchEntity",
            IamError::AccessDenied(_) => "AccessDenied",
            IamError::ServiceFailure(_) => "ServiceFailure",
            IamError::Unrecognized { error_type, .. } => error_type,
            IamError::Transport(_) => "Transport",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, IamError::NoSuchEntity(_))
    }

    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "NoSuchEntity" => IamError::NoSuchEntity(message),
            "AccessDenied" => IamError::AccessDenied(message),
            "ServiceFailure" => IamError::ServiceFailure(message),
            other => IamError::Unrecognized {
                error_type: other.to_string(),
                message,
            },
        }
    }
}
