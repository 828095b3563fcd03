//! Storage boundary traits
//!
//! `Archivable` is the per-entity contract for SQLite tables; `TreeStore` is
//! the tree-level loader/saver the application layer is handed.

use rusqlite::{params, Connection};

use crate::domain::SubcloneTree;
use crate::infrastructure::error::{InfraError, InfraResult};

/// An entity that can be archived into, and unarchived from, its own table.
///
/// Every table has an `id INTEGER PRIMARY KEY AUTOINCREMENT` column; records
/// are addressed by that id.
pub trait Archivable: Sized {
    /// Name of the table holding all records of this type.
    fn table_name() -> &'static str;

    /// Column definitions following the id column, each prefixed with ",".
    fn column_definitions() -> &'static str;

    /// Create the storage table if it does not exist.
    fn create_table(conn: &Connection) -> InfraResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT{})",
            Self::table_name(),
            Self::column_definitions()
        );
        conn.execute_batch(&sql)
            .map_err(|e| InfraError::db(format!("create table {}", Self::table_name()), e))
    }

    /// Insert a new record and return its id.
    fn insert(&self, conn: &Connection) -> InfraResult<i64>;

    /// Overwrite the record with the given id.
    fn update(&self, conn: &Connection, id: i64) -> InfraResult<()>;

    /// Load the record with the given id.
    fn select_by_id(conn: &Connection, id: i64) -> InfraResult<Self>;

    /// Ids of every record of this type, ascending.
    fn all_ids(conn: &Connection) -> InfraResult<Vec<i64>> {
        let context = || format!("list ids of {}", Self::table_name());
        let mut stmt = conn
            .prepare(&format!("SELECT id FROM {} ORDER BY id", Self::table_name()))
            .map_err(|e| InfraError::db(context(), e))?;
        let ids = stmt
            .query_map(params![], |row| row.get::<_, i64>(0))
            .map_err(|e| InfraError::db(context(), e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InfraError::db(context(), e))?;
        Ok(ids)
    }
}

/// Loads and stores whole subclone trees by id.
pub trait TreeStore: Send {
    /// Fully materialize the tree with the given id.
    fn load_tree(&self, id: i64) -> InfraResult<SubcloneTree>;

    /// Persist a tree and return its new id.
    fn save_tree(&mut self, tree: &SubcloneTree) -> InfraResult<i64>;

    /// Ids of all stored trees.
    fn tree_ids(&self) -> InfraResult<Vec<i64>>;

    /// Change the stored name of a tree.
    fn rename_tree(&mut self, id: i64, name: Option<&str>) -> InfraResult<()>;
}

/// Whether opening a store may create its database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The database must already exist.
    Existing,
    /// Create the database when it is missing.
    Create,
}
