//! Import and export between tree documents and tree databases

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::services::loader::TreeLoader;
use crate::application::source::TreeSource;
use crate::application::ApplicationResult;
use crate::domain::outline;
use crate::infrastructure::document::{render_outline, DocumentFormat};

/// Moves trees in and out of databases.
pub struct ArchiveService {
    loader: Arc<TreeLoader>,
}

impl ArchiveService {
    pub fn new(loader: Arc<TreeLoader>) -> Self {
        Self { loader }
    }

    /// Archive documents into a database; returns (document, new id) pairs.
    ///
    /// Every document is loaded (and validated) before anything is written.
    #[instrument(level = "debug", skip(self, files))]
    pub fn import(&self, files: &[PathBuf], db: &Path) -> ApplicationResult<Vec<(PathBuf, i64)>> {
        let trees = files
            .iter()
            .map(|path| Ok((path.clone(), self.loader.load_document(path)?)))
            .collect::<ApplicationResult<Vec<_>>>()?;

        let mut store = self.loader.create_store(db)?;
        let mut imported = Vec::with_capacity(trees.len());
        for (path, tree) in trees {
            let id = store.save_tree(&tree)?;
            info!(document = %path.display(), id, "imported tree");
            imported.push((path, id));
        }
        Ok(imported)
    }

    /// Render a tree as a document.
    #[instrument(level = "debug", skip(self), fields(source = %source))]
    pub fn export(&self, source: &TreeSource, format: DocumentFormat) -> ApplicationResult<String> {
        let tree = self.loader.load(source)?;
        Ok(render_outline(&outline(&tree)?, format)?)
    }

    /// Change the stored name of a database tree.
    pub fn rename(&self, db: &Path, id: i64, name: Option<&str>) -> ApplicationResult<()> {
        let mut store = self.loader.open_store(db)?;
        store.rename_tree(id, name)?;
        Ok(())
    }
}
