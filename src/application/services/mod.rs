//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services receive settings and a store opener from the container
//! but are themselves concrete structs, not traits.

mod archive;
mod compare;
mod loader;

pub use archive::ArchiveService;
pub use compare::{CompareService, PairVerdict};
pub use loader::{LoadedTree, StoreOpener, TreeLoader};
