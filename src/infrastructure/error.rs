//! Infrastructure-level errors (wraps domain errors)

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::DomainError;

/// Infrastructure errors add storage and I/O concerns to domain errors.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("database error: {context}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported tree document format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no {table} record with id {id}")]
    NotFound { table: &'static str, id: i64 },

    #[error("value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: String },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a database error with context.
    pub fn db(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
