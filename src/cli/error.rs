//! CLI-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<InfraError> for CliError {
    fn from(e: InfraError) -> Self {
        CliError::Application(e.into())
    }
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::Application(e.into())
    }
}

fn infra_exit_code(e: &InfraError) -> i32 {
    match e {
        InfraError::Domain(_) | InfraError::Parse { .. } | InfraError::OutOfRange { .. } => {
            crate::exitcode::DATAERR
        }
        InfraError::UnsupportedFormat(_) => crate::exitcode::USAGE,
        InfraError::NotFound { .. } => crate::exitcode::NOINPUT,
        InfraError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
            crate::exitcode::NOINPUT
        }
        InfraError::Io { .. } | InfraError::Database { .. } => crate::exitcode::IOERR,
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Application(e) => match e {
                ApplicationError::Domain(_) => crate::exitcode::DATAERR,
                ApplicationError::Infra(infra) => infra_exit_code(infra),
                ApplicationError::InvalidSource { .. } => crate::exitcode::USAGE,
                ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
            },
        }
    }
}
