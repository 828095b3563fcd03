//! Tree loading service
//!
//! Resolves tree sources and tree sets into validated arena trees.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::source::{TreeSet, TreeSource};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::{SubcloneTree, TreeBuilder};
use crate::infrastructure::document::{find_documents, read_outline};
use crate::infrastructure::traits::{OpenMode, TreeStore};
use crate::infrastructure::InfraResult;

/// Opens a tree store for a database path.
pub type StoreOpener =
    Arc<dyn Fn(&Path, OpenMode) -> InfraResult<Box<dyn TreeStore>> + Send + Sync>;

/// A loaded tree together with where it came from.
#[derive(Debug)]
pub struct LoadedTree {
    pub origin: String,
    pub tree: SubcloneTree,
}

/// Loads trees from documents and databases.
pub struct TreeLoader {
    settings: Arc<Settings>,
    open_store: StoreOpener,
}

impl TreeLoader {
    pub fn new(settings: Arc<Settings>, open_store: StoreOpener) -> Self {
        Self {
            settings,
            open_store,
        }
    }

    /// Builder configured from settings (resolution, validation toggle).
    pub fn builder(&self) -> TreeBuilder {
        TreeBuilder::new()
            .with_matcher(self.settings.matcher())
            .with_validation(self.settings.validate_trees)
    }

    /// Open the tree store behind an existing database path.
    pub fn open_store(&self, path: &Path) -> ApplicationResult<Box<dyn TreeStore>> {
        Ok((self.open_store)(path, OpenMode::Existing)?)
    }

    /// Open a tree store, creating the database when it is missing.
    pub fn create_store(&self, path: &Path) -> ApplicationResult<Box<dyn TreeStore>> {
        Ok((self.open_store)(path, OpenMode::Create)?)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load_document(&self, path: &Path) -> ApplicationResult<SubcloneTree> {
        let outline = read_outline(path)?;
        let mut tree = self.builder().build(&outline)?;
        if tree.name.is_none() {
            tree.name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        }
        Ok(tree)
    }

    /// Load one tree, validating it when configured.
    #[instrument(level = "debug", skip(self), fields(source = %source))]
    pub fn load(&self, source: &TreeSource) -> ApplicationResult<SubcloneTree> {
        match source {
            TreeSource::Document(path) => self.load_document(path),
            TreeSource::Database { path, id } => {
                let store = self.open_store(path)?;
                self.load_from_store(store.as_ref(), *id)
            }
        }
    }

    fn load_from_store(&self, store: &dyn TreeStore, id: i64) -> ApplicationResult<SubcloneTree> {
        let tree = store.load_tree(id)?;
        if self.settings.validate_trees {
            self.builder().validate_tree(&tree)?;
        }
        Ok(tree)
    }

    /// Load every tree of a set, in a stable order.
    #[instrument(level = "debug", skip(self), fields(set = %set))]
    pub fn load_set(&self, set: &TreeSet) -> ApplicationResult<Vec<LoadedTree>> {
        let trees = match set {
            TreeSet::Directory(dir) => find_documents(dir)?
                .into_iter()
                .map(|path| {
                    Ok(LoadedTree {
                        origin: path.display().to_string(),
                        tree: self.load_document(&path)?,
                    })
                })
                .collect::<ApplicationResult<Vec<_>>>()?,
            TreeSet::Database(path) => {
                let store = self.open_store(path)?;
                store
                    .tree_ids()?
                    .into_iter()
                    .map(|id| {
                        Ok(LoadedTree {
                            origin: format!("{}#{}", path.display(), id),
                            tree: self.load_from_store(store.as_ref(), id)?,
                        })
                    })
                    .collect::<ApplicationResult<Vec<_>>>()?
            }
        };
        debug!(count = trees.len(), "loaded tree set");
        Ok(trees)
    }
}
