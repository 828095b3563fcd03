//! Tumor subclone tree compatibility.
//!
//! Subclone trees carry somatic events on their nodes; a node implies its own
//! events plus those of all its ancestors. [`domain::tree_merge`] decides
//! whether every node of one tree can be explained by a node of a reference
//! tree under tolerant event equality.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
