//! Infrastructure layer: storage implementations and DI container
//!
//! This layer implements the storage boundary traits and wires up services.

pub mod di;
pub mod document;
pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::{InfraError, InfraResult};
