use thiserror::Error;

use crate::apigateway::error::ApiGatewayError;
use crate::iam::error::IamError;
use crate::lambda::error::LambdaError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    RemoteRejected,
    Configuration,
    Timeout,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find {kind} {name}")]
    NotFound { kind: &'static str, name: String },

    #[error(transparent)]
    ApiGateway(#[from] ApiGatewayError),

    #[error(transparent)]
    Lambda(#[from] LambdaError),

    #[error(transparent)]
    Iam(#[from] IamError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("timed out waiting for {what} after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::ApiGateway(_) | Error::Lambda(_) | Error::Iam(_) => ErrorKind::RemoteRejected,
            Error::Configuration(_) | Error::Io { .. } => ErrorKind::Configuration,
            Error::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}
