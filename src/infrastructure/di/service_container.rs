//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::path::Path;
use std::sync::Arc;

use crate::application::services::{ArchiveService, CompareService, StoreOpener, TreeLoader};
use crate::config::Settings;
use crate::infrastructure::sqlite::SqliteTreeStore;
use crate::infrastructure::traits::{OpenMode, TreeStore};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    pub loader: Arc<TreeLoader>,
    pub compare: CompareService,
    pub archive: ArchiveService,
}

impl ServiceContainer {
    /// Create a new service container backed by SQLite databases.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(
            settings,
            Arc::new(|path: &Path, mode: OpenMode| {
                SqliteTreeStore::open_with_mode(path, mode)
                    .map(|store| Box::new(store) as Box<dyn TreeStore>)
            }),
        )
    }

    /// Create a service container with a custom store opener (for testing).
    pub fn with_deps(settings: Settings, open_store: StoreOpener) -> Self {
        let settings = Arc::new(settings);
        let loader = Arc::new(TreeLoader::new(Arc::clone(&settings), open_store));

        Self {
            compare: CompareService::new(Arc::clone(&settings)),
            archive: ArchiveService::new(Arc::clone(&loader)),
            loader,
            settings,
        }
    }
}
