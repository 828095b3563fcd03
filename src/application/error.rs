//! Application-level errors (wraps domain and infrastructure errors)

use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::InfraError;

/// Application errors wrap lower layers and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid tree source '{given}': {message}")]
    InvalidSource {
        given: String,
        message: String,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub(crate) fn invalid_source(raw: &str, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            given: raw.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
