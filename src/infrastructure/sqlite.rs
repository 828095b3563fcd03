//! SQLite archive for subclone trees.
//!
//! Schema: `trees`, `subclones` (tree, parent, sibling position),
//! `somatic_events`, and `subclone_events` linking the two. An event shared by
//! several subclones of one tree is stored once.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use generational_arena::Index;
use rusqlite::{params, Connection, OpenFlags, Row};
use tracing::{debug, instrument};

use crate::domain::{
    DomainError, EventKind, SomaticEvent, SomaticEventPtr, SubcloneData, SubcloneTree,
};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::{Archivable, OpenMode, TreeStore};

fn to_column(column: &'static str, value: u64) -> InfraResult<i64> {
    i64::try_from(value).map_err(|_| InfraError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

fn from_column(column: &'static str, value: i64) -> InfraResult<u64> {
    u64::try_from(value).map_err(|_| InfraError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

fn not_found_or_db(table: &'static str, id: i64, e: rusqlite::Error) -> InfraError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => InfraError::NotFound { table, id },
        other => InfraError::db(format!("select {table} {id}"), other),
    }
}

/// Row of the `trees` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    pub name: Option<String>,
}

impl Archivable for TreeRecord {
    fn table_name() -> &'static str {
        "trees"
    }

    fn column_definitions() -> &'static str {
        ", name TEXT"
    }

    fn insert(&self, conn: &Connection) -> InfraResult<i64> {
        conn.execute("INSERT INTO trees (name) VALUES (?1)", params![self.name])
            .map_err(|e| InfraError::db("insert tree", e))?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection, id: i64) -> InfraResult<()> {
        let changed = conn
            .execute("UPDATE trees SET name = ?1 WHERE id = ?2", params![self.name, id])
            .map_err(|e| InfraError::db(format!("update tree {id}"), e))?;
        if changed == 0 {
            return Err(InfraError::NotFound { table: "trees", id });
        }
        Ok(())
    }

    fn select_by_id(conn: &Connection, id: i64) -> InfraResult<Self> {
        conn.query_row("SELECT name FROM trees WHERE id = ?1", params![id], |row| {
            Ok(Self { name: row.get(0)? })
        })
        .map_err(|e| not_found_or_db("trees", id, e))
    }
}

/// Row of the `subclones` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcloneRecord {
    pub tree_id: i64,
    pub parent_id: Option<i64>,
    /// Position among siblings
    pub position: i64,
    pub label: Option<String>,
    pub fraction: Option<f64>,
}

impl SubcloneRecord {
    const COLUMNS: &'static str = "tree_id, parent_id, position, label, fraction";

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            tree_id: row.get(offset)?,
            parent_id: row.get(offset + 1)?,
            position: row.get(offset + 2)?,
            label: row.get(offset + 3)?,
            fraction: row.get(offset + 4)?,
        })
    }
}

impl Archivable for SubcloneRecord {
    fn table_name() -> &'static str {
        "subclones"
    }

    fn column_definitions() -> &'static str {
        ", tree_id INTEGER NOT NULL REFERENCES trees(id)\
         , parent_id INTEGER REFERENCES subclones(id)\
         , position INTEGER NOT NULL\
         , label TEXT\
         , fraction REAL"
    }

    fn insert(&self, conn: &Connection) -> InfraResult<i64> {
        conn.execute(
            &format!("INSERT INTO subclones ({}) VALUES (?1, ?2, ?3, ?4, ?5)", Self::COLUMNS),
            params![self.tree_id, self.parent_id, self.position, self.label, self.fraction],
        )
        .map_err(|e| InfraError::db("insert subclone", e))?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection, id: i64) -> InfraResult<()> {
        let changed = conn
            .execute(
                "UPDATE subclones SET tree_id = ?1, parent_id = ?2, position = ?3, \
                 label = ?4, fraction = ?5 WHERE id = ?6",
                params![self.tree_id, self.parent_id, self.position, self.label, self.fraction, id],
            )
            .map_err(|e| InfraError::db(format!("update subclone {id}"), e))?;
        if changed == 0 {
            return Err(InfraError::NotFound { table: "subclones", id });
        }
        Ok(())
    }

    fn select_by_id(conn: &Connection, id: i64) -> InfraResult<Self> {
        conn.query_row(
            &format!("SELECT {} FROM subclones WHERE id = ?1", Self::COLUMNS),
            params![id],
            |row| Self::from_row(row, 0),
        )
        .map_err(|e| not_found_or_db("subclones", id, e))
    }
}

/// Row of the `somatic_events` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event: SomaticEvent,
}

/// Raw column values before range checks.
struct RawEvent {
    kind: String,
    chrom: String,
    start: i64,
    end: i64,
    copy_number: Option<f64>,
    ref_allele: Option<String>,
    alt_allele: Option<String>,
    frequency: Option<f64>,
}

impl EventRecord {
    const COLUMNS: &'static str =
        "kind, chrom, start_pos, end_pos, copy_number, ref_allele, alt_allele, frequency";

    fn raw_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<RawEvent> {
        Ok(RawEvent {
            kind: row.get(offset)?,
            chrom: row.get(offset + 1)?,
            start: row.get(offset + 2)?,
            end: row.get(offset + 3)?,
            copy_number: row.get(offset + 4)?,
            ref_allele: row.get(offset + 5)?,
            alt_allele: row.get(offset + 6)?,
            frequency: row.get(offset + 7)?,
        })
    }

    fn from_raw(raw: RawEvent) -> InfraResult<Self> {
        let kind = EventKind::parse(&raw.kind).ok_or_else(|| InfraError::OutOfRange {
            column: "kind",
            value: raw.kind.clone(),
        })?;
        let event = SomaticEvent {
            kind,
            chrom: raw.chrom,
            start: from_column("start_pos", raw.start)?,
            end: from_column("end_pos", raw.end)?,
            copy_number: raw.copy_number,
            ref_allele: raw.ref_allele,
            alt_allele: raw.alt_allele,
            frequency: raw.frequency,
        };
        event.validate()?;
        Ok(Self { event })
    }
}

impl Archivable for EventRecord {
    fn table_name() -> &'static str {
        "somatic_events"
    }

    fn column_definitions() -> &'static str {
        ", kind TEXT NOT NULL\
         , chrom TEXT NOT NULL\
         , start_pos INTEGER NOT NULL\
         , end_pos INTEGER NOT NULL\
         , copy_number REAL\
         , ref_allele TEXT\
         , alt_allele TEXT\
         , frequency REAL"
    }

    fn insert(&self, conn: &Connection) -> InfraResult<i64> {
        let e = &self.event;
        conn.execute(
            &format!(
                "INSERT INTO somatic_events ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                Self::COLUMNS
            ),
            params![
                e.kind.as_str(),
                e.chrom,
                to_column("start_pos", e.start)?,
                to_column("end_pos", e.end)?,
                e.copy_number,
                e.ref_allele,
                e.alt_allele,
                e.frequency,
            ],
        )
        .map_err(|err| InfraError::db(format!("insert event {e}"), err))?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection, id: i64) -> InfraResult<()> {
        let e = &self.event;
        let changed = conn
            .execute(
                "UPDATE somatic_events SET kind = ?1, chrom = ?2, start_pos = ?3, end_pos = ?4, \
                 copy_number = ?5, ref_allele = ?6, alt_allele = ?7, frequency = ?8 WHERE id = ?9",
                params![
                    e.kind.as_str(),
                    e.chrom,
                    to_column("start_pos", e.start)?,
                    to_column("end_pos", e.end)?,
                    e.copy_number,
                    e.ref_allele,
                    e.alt_allele,
                    e.frequency,
                    id,
                ],
            )
            .map_err(|err| InfraError::db(format!("update event {id}"), err))?;
        if changed == 0 {
            return Err(InfraError::NotFound { table: "somatic_events", id });
        }
        Ok(())
    }

    fn select_by_id(conn: &Connection, id: i64) -> InfraResult<Self> {
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM somatic_events WHERE id = ?1", Self::COLUMNS),
                params![id],
                |row| Self::raw_from_row(row, 0),
            )
            .map_err(|e| not_found_or_db("somatic_events", id, e))?;
        Self::from_raw(raw)
    }
}

/// Row of the `subclone_events` link table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLinkRecord {
    pub subclone_id: i64,
    pub event_id: i64,
    /// Position within the subclone's local event list
    pub position: i64,
}

impl Archivable for EventLinkRecord {
    fn table_name() -> &'static str {
        "subclone_events"
    }

    fn column_definitions() -> &'static str {
        ", subclone_id INTEGER NOT NULL REFERENCES subclones(id)\
         , event_id INTEGER NOT NULL REFERENCES somatic_events(id)\
         , position INTEGER NOT NULL"
    }

    fn insert(&self, conn: &Connection) -> InfraResult<i64> {
        conn.execute(
            "INSERT INTO subclone_events (subclone_id, event_id, position) VALUES (?1, ?2, ?3)",
            params![self.subclone_id, self.event_id, self.position],
        )
        .map_err(|e| InfraError::db("insert event link", e))?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection, id: i64) -> InfraResult<()> {
        let changed = conn
            .execute(
                "UPDATE subclone_events SET subclone_id = ?1, event_id = ?2, position = ?3 \
                 WHERE id = ?4",
                params![self.subclone_id, self.event_id, self.position, id],
            )
            .map_err(|e| InfraError::db(format!("update event link {id}"), e))?;
        if changed == 0 {
            return Err(InfraError::NotFound { table: "subclone_events", id });
        }
        Ok(())
    }

    fn select_by_id(conn: &Connection, id: i64) -> InfraResult<Self> {
        conn.query_row(
            "SELECT subclone_id, event_id, position FROM subclone_events WHERE id = ?1",
            params![id],
            |row| {
                Ok(Self {
                    subclone_id: row.get(0)?,
                    event_id: row.get(1)?,
                    position: row.get(2)?,
                })
            },
        )
        .map_err(|e| not_found_or_db("subclone_events", id, e))
    }
}

/// Tree store backed by one SQLite database file.
pub struct SqliteTreeStore {
    conn: Connection,
}

impl SqliteTreeStore {
    /// Open (or create) a database and make sure the schema exists.
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> InfraResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| InfraError::db(format!("open {}", path.display()), e))?;
        Self::with_connection(conn)
    }

    /// Open a database that must already exist.
    #[instrument(level = "debug")]
    pub fn open_existing(path: &Path) -> InfraResult<Self> {
        if !path.is_file() {
            return Err(InfraError::io(
                format!("open {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such tree database"),
            ));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| InfraError::db(format!("open {}", path.display()), e))?;
        Self::with_connection(conn)
    }

    pub fn open_with_mode(path: &Path, mode: OpenMode) -> InfraResult<Self> {
        match mode {
            OpenMode::Existing => Self::open_existing(path),
            OpenMode::Create => Self::open(path),
        }
    }

    pub fn open_in_memory() -> InfraResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| InfraError::db("open in-memory", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> InfraResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| InfraError::db("enable foreign keys", e))?;
        TreeRecord::create_table(&conn)?;
        SubcloneRecord::create_table(&conn)?;
        EventRecord::create_table(&conn)?;
        EventLinkRecord::create_table(&conn)?;
        Ok(Self { conn })
    }

    fn subclone_rows(&self, tree_id: i64) -> InfraResult<Vec<(i64, SubcloneRecord)>> {
        let context = || format!("load subclones of tree {tree_id}");
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT id, {} FROM subclones WHERE tree_id = ?1 ORDER BY position, id",
                SubcloneRecord::COLUMNS
            ))
            .map_err(|e| InfraError::db(context(), e))?;
        let rows = stmt
            .query_map(params![tree_id], |row| {
                Ok((row.get::<_, i64>(0)?, SubcloneRecord::from_row(row, 1)?))
            })
            .map_err(|e| InfraError::db(context(), e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InfraError::db(context(), e))?;
        Ok(rows)
    }

    fn subclone_events(
        &self,
        subclone_id: i64,
        cache: &mut HashMap<i64, SomaticEventPtr>,
    ) -> InfraResult<Vec<SomaticEventPtr>> {
        let context = || format!("load events of subclone {subclone_id}");
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT e.id, {} FROM subclone_events l \
                 JOIN somatic_events e ON e.id = l.event_id \
                 WHERE l.subclone_id = ?1 ORDER BY l.position, l.id",
                EventRecord::COLUMNS
                    .split(", ")
                    .map(|c| format!("e.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .map_err(|e| InfraError::db(context(), e))?;
        let rows = stmt
            .query_map(params![subclone_id], |row| {
                Ok((row.get::<_, i64>(0)?, EventRecord::raw_from_row(row, 1)?))
            })
            .map_err(|e| InfraError::db(context(), e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InfraError::db(context(), e))?;

        let mut events = Vec::with_capacity(rows.len());
        for (event_id, raw) in rows {
            let event = match cache.get(&event_id) {
                Some(shared) => Arc::clone(shared),
                None => {
                    let shared = Arc::new(EventRecord::from_raw(raw)?.event);
                    cache.insert(event_id, Arc::clone(&shared));
                    shared
                }
            };
            events.push(event);
        }
        Ok(events)
    }
}

impl TreeStore for SqliteTreeStore {
    #[instrument(level = "debug", skip(self))]
    fn load_tree(&self, id: i64) -> InfraResult<SubcloneTree> {
        let record = TreeRecord::select_by_id(&self.conn, id)?;
        let rows = self.subclone_rows(id)?;
        let label = || record.name.clone().unwrap_or_else(|| format!("tree #{id}"));

        let mut children: HashMap<Option<i64>, Vec<(i64, &SubcloneRecord)>> = HashMap::new();
        for (row_id, row) in &rows {
            children.entry(row.parent_id).or_default().push((*row_id, row));
        }

        let roots = children.get(&None).cloned().unwrap_or_default();
        let (root_id, root_row) = match roots.as_slice() {
            [] => return Err(DomainError::EmptyTree(label()).into()),
            [single] => *single,
            [_, second, ..] => {
                return Err(DomainError::SecondRoot(format!("{} in {}", second.0, label())).into())
            }
        };

        let mut tree = SubcloneTree::new();
        tree.name = record.name.clone();
        tree.id = Some(id);

        let mut cache = HashMap::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(i64, &SubcloneRecord, Option<Index>)> = vec![(root_id, root_row, None)];
        while let Some((row_id, row, parent)) = stack.pop() {
            if !visited.insert(row_id) {
                return Err(DomainError::CycleDetected(format!("subclone {row_id}")).into());
            }
            let data = SubcloneData {
                label: row.label.clone(),
                fraction: row.fraction,
                events: self.subclone_events(row_id, &mut cache)?,
                id: Some(row_id),
            };
            let idx = tree.insert_node(data, parent);
            if let Some(kids) = children.get(&Some(row_id)) {
                for &(kid_id, kid) in kids.iter().rev() {
                    stack.push((kid_id, kid, Some(idx)));
                }
            }
        }

        // Rows never reached from the root form a detached parent cycle
        if visited.len() != rows.len() {
            return Err(DomainError::CycleDetected(label()).into());
        }
        debug!(nodes = tree.len(), events = cache.len(), "loaded tree");
        Ok(tree)
    }

    #[instrument(level = "debug", skip(self, tree), fields(name = ?tree.name))]
    fn save_tree(&mut self, tree: &SubcloneTree) -> InfraResult<i64> {
        if tree.root().is_none() {
            let label = tree.name.clone().unwrap_or_else(|| "<unnamed tree>".into());
            return Err(DomainError::EmptyTree(label).into());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| InfraError::db("begin transaction", e))?;

        let tree_id = TreeRecord {
            name: tree.name.clone(),
        }
        .insert(&tx)?;

        let mut node_ids: HashMap<Index, i64> = HashMap::new();
        let mut event_ids: HashMap<*const SomaticEvent, i64> = HashMap::new();

        for (idx, node) in tree.iter() {
            let parent_id = node.parent.and_then(|p| node_ids.get(&p).copied());
            let position = node
                .parent
                .and_then(|p| tree.get_node(p))
                .and_then(|p| p.children.iter().position(|&c| c == idx))
                .unwrap_or(0);
            let subclone_id = SubcloneRecord {
                tree_id,
                parent_id,
                position: position as i64,
                label: node.data.label.clone(),
                fraction: node.data.fraction,
            }
            .insert(&tx)?;
            node_ids.insert(idx, subclone_id);

            for (position, event) in node.data.events.iter().enumerate() {
                let key = Arc::as_ptr(event);
                let event_id = match event_ids.get(&key) {
                    Some(&id) => id,
                    None => {
                        let id = EventRecord {
                            event: event.as_ref().clone(),
                        }
                        .insert(&tx)?;
                        event_ids.insert(key, id);
                        id
                    }
                };
                EventLinkRecord {
                    subclone_id,
                    event_id,
                    position: position as i64,
                }
                .insert(&tx)?;
            }
        }

        tx.commit()
            .map_err(|e| InfraError::db(format!("commit tree {tree_id}"), e))?;
        debug!(tree_id, nodes = node_ids.len(), events = event_ids.len(), "saved tree");
        Ok(tree_id)
    }

    fn tree_ids(&self) -> InfraResult<Vec<i64>> {
        TreeRecord::all_ids(&self.conn)
    }

    fn rename_tree(&mut self, id: i64, name: Option<&str>) -> InfraResult<()> {
        TreeRecord {
            name: name.map(str::to_string),
        }
        .update(&self.conn, id)
    }
}
