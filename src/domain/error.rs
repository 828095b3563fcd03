//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of tree and event invariants.
/// "Trees are incompatible" is never one of them: that is an ordinary `false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("tree has no root: {0}")]
    EmptyTree(String),

    #[error("subclone not found in tree: {0}")]
    NodeNotFound(String),

    #[error("cycle detected in subclone hierarchy at: {0}")]
    CycleDetected(String),

    #[error("invalid somatic event {event}: {message}")]
    InvalidEvent { event: String, message: String },

    #[error("sibling subclones {left} and {right} share event {event}")]
    OverlappingSiblings {
        left: String,
        right: String,
        event: String,
    },

    #[error("subclone {node} repeats event {event} already carried by an ancestor")]
    InheritedEventRepeated { node: String, event: String },

    #[error("root already set, cannot add a second root: {0}")]
    SecondRoot(String),
}
