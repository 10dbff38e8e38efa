use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiGatewayError {
    #[error("NotFoundException: {0}")]
    NotFoundException(String),
    #[error("ConflictException: {0}")]
    ConflictException(String),
    #[error("BadRequestException: {0}")]
    BadRequestException(String),
    #[error("TooManyRequestsException: {0}")]
    TooManyRequestsException(String),
    #[error("UnauthorizedException: {0}")]
    UnauthorizedException(String),
    #[error("ServiceUnavailableException: {0}")]
    ServiceUnavailableException(String),
    #[error("{error_type}: {message}")]
    Unrecognized { error_type: String, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiGatewayError {
    pub fn error_type(&self) -> &str {
        match self {
            ApiGatewayError::NotFoundException(_) => "NotFoundException",
            ApiGatewayError::ConflictException(_) => "ConflictException",
            ApiGatewayError::BadRequestException(_) => "BadRequestException",
            ApiGatewayError::TooManyRequestsException(_) => "TooManyRequestsException",
            ApiGatewayError::UnauthorizedException(_) => "UnauthorizedException",
            ApiGatewayError::ServiceUnavailableException(_) => "ServiceUnavailableException",
            ApiGatewayError::Unrecognized { error_type, .. } => error_type,
            ApiGatewayError::Transport(_) => "Transport",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiGatewayError::NotFoundException(m)
            | ApiGatewayError::ConflictException(m)
            | ApiGatewayError::BadRequestException(m)
            | ApiGatewayError::TooManyRequestsException(m)
            | ApiGatewayError::UnauthorizedException(m)
            | ApiGatewayError::ServiceUnavailableException(m)
            | ApiGatewayError::Transport(m) => m,
            ApiGatewayError::Unrecognized { message, .. } => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiGatewayError::NotFoundException(_))
    }

    pub fn from_response(status: u16, error_type: Option<&str>, message: String) -> Self {
        match error_type {
            Some("NotFoundException") => ApiGatewayError::NotFoundException(message),
            Some("ConflictException") => ApiGatewayError::ConflictException(message),
            Some("BadRequestException") => ApiGatewayError::BadRequestException(message),
            Some("TooManyRequestsException") => ApiGatewayError::TooManyRequestsException(message),
            Some("UnauthorizedException") => ApiGatewayError::UnauthorizedException(message),
            Some("ServiceUnavailableException") => {
                ApiGatewayError::ServiceUnavailableException(message)
            }
            Some(other) => ApiGatewayError::Unrecognized {
                error_type: other.to_string(),
                message,
            },
            None => match status {
                404 => ApiGatewayError::NotFoundException(message),
                409 => ApiGatewayError::ConflictException(message),
                400 => ApiGatewayError::BadRequestException(message),
                429 => ApiGatewayError::TooManyRequestsException(message),
                401 | 403 => ApiGatewayError::UnauthorizedException(message),
                503 => ApiGatewayError::ServiceUnavailableException(message),
                _ => ApiGatewayError::Unrecognized {
                    error_type: format!("HTTP {}", status),
                    message,
                },
            },
        }
    }
}
