//! Durable row store for the adjacency table
//!
//! The table lives in an in-memory SQLite connection. `load` reads the whole
//! file into memory; every mutating statement is followed by a whole-file
//! commit (see [`commit`]). A failed commit rolls the file back and reloads the
//! connection from it, so the store never reports rows the file does not hold.

pub mod commit;
pub mod schema;

pub use commit::{FileOps, StdFileOps};

use crate::core::entry::{EntryRow, Nid, RowPatch};
use crate::error::{ForestError, Result};
use rusqlite::{params_from_iter, Connection, DatabaseName, OptionalExtension, ToSql};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How an insert treats an existing row with the same id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Keep the existing row
    IfAbsent,
    /// Overwrite the existing row
    Force,
}

/// Embedded, file-backed adjacency table
pub struct RowStore {
    conn: Option<Connection>,

    /// Live file; `None` for a purely in-memory store
    path: Option<PathBuf>,

    ops: Arc<dyn FileOps>,
    keep_backup: bool,
}

impl fmt::Debug for RowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStore")
            .field("loaded", &self.conn.is_some())
            .field("path", &self.path)
            .field("ops", &self.ops)
            .finish()
    }
}

impl Default for RowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore {
    /// Create an unloaded store; every access fails until [`RowStore::load`]
    pub fn new() -> Self {
        RowStore {
            conn: None,
            path: None,
            ops: Arc::new(StdFileOps),
            keep_backup: false,
        }
    }

    /// Replace the file operations used by commits
    pub fn with_file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Keep `F.bak` after successful commits
    pub fn with_keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }

    /// Loaded store with no backing file
    ///
    /// Mutations are applied but never committed anywhere.
    pub fn open_in_memory() -> Result<Self> {
        let mut store = Self::new();
        store.conn = Some(fresh_connection()?);
        Ok(store)
    }

    /// Read the file at `path`, or start an empty table if there is none
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let conn = read_file(&path, self.ops.as_ref())?;
        info!("Loaded row store from {:?}", path);
        self.conn = Some(conn);
        self.path = Some(path);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.conn.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(ForestError::StorageUnavailable)
    }

    /// Execute one mutating statement and commit the whole file
    ///
    /// Returns the number of affected rows.
    pub fn mutate(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        let changed = self.conn()?.execute(sql, params)?;
        self.persist()?;
        Ok(changed)
    }

    /// Execute a read-only statement and map every result row
    pub fn query<T, F>(&self, sql: &str, params: &[&dyn ToSql], mut map: F) -> Result<Vec<T>>
    where
        F: FnMut(&rusqlite::Row<'_>) -> Result<T>,
    {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(map(row)?);
        }
        Ok(out)
    }

    fn persist(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let conn = self.conn()?;

        if let Err(err) = commit::commit(conn, &path, self.ops.as_ref(), self.keep_backup) {
            // Drop the uncommitted change so memory matches the restored file
            match read_file(&path, self.ops.as_ref()) {
                Ok(conn) => self.conn = Some(conn),
                Err(e) => warn!("Could not reload {:?} after failed commit: {}", path, e),
            }
            return Err(err);
        }
        Ok(())
    }

    /// Insert one row
    ///
    /// The existence check is part of the statement itself. Returns whether a
    /// row was written.
    pub fn insert_row(&mut self, row: &EntryRow, mode: InsertMode) -> Result<bool> {
        let sql = match mode {
            InsertMode::IfAbsent => schema::INSERT_IF_ABSENT,
            InsertMode::Force => schema::UPSERT,
        };
        let values = schema::insert_params(row);
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();

        let changed = self.mutate(sql, &params)?;
        if changed == 0 {
            debug!("Row {} already present, insert skipped", row.id);
        }
        Ok(changed > 0)
    }

    /// Apply a column patch to one row, returning whether the row exists
    pub fn update_row(&mut self, id: Nid, patch: &RowPatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(self.row(id)?.is_some());
        }

        let assignments: Vec<String> = patch
            .assignments()
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column.as_str(), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            schema::TABLE,
            assignments.join(", "),
            assignments.len() + 1
        );

        let id_text = id.to_string();
        let values = patch
            .assignments()
            .iter()
            .map(|(_, value)| value.as_deref())
            .chain(std::iter::once(Some(id_text.as_str())));

        let changed = self.conn()?.execute(&sql, params_from_iter(values))?;
        self.persist()?;
        Ok(changed > 0)
    }

    /// Delete one row, returning whether it existed
    pub fn delete_row(&mut self, id: Nid) -> Result<bool> {
        let id_text = id.to_string();
        Ok(self.mutate(schema::DELETE, &[&id_text])? > 0)
    }

    pub fn row(&self, id: Nid) -> Result<Option<EntryRow>> {
        let conn = self.conn()?;
        let id_text = id.to_string();
        let row = conn
            .query_row(schema::SELECT_ONE, [&id_text], |r| Ok(schema::decode_row(r)))
            .optional()?;
        row.transpose()
    }

    /// Raw dump of the table in storage order
    pub fn rows(&self) -> Result<Vec<EntryRow>> {
        self.query(schema::SELECT_ALL, &[], schema::decode_row)
    }

    /// All rows in ascending `sequence` order
    pub fn rows_in_sequence(&self) -> Result<Vec<EntryRow>> {
        self.query(schema::SELECT_ORDERED, &[], schema::decode_row)
    }

    /// Largest `sequence` currently stored
    pub fn max_sequence(&self) -> Result<u64> {
        let max: Option<i64> = self
            .conn()?
            .query_row(schema::MAX_SEQUENCE, [], |r| r.get(0))?;
        Ok(max.map(|m| m.max(0) as u64).unwrap_or(0))
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row(schema::COUNT, [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

fn fresh_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(schema::CREATE_TABLE)?;
    Ok(conn)
}

/// Read the live file into a fresh in-memory connection
///
/// A missing live file next to a backup means a commit failed between
/// removing `F` and restoring it; the backup is put back (or read in place)
/// instead of starting empty.
fn read_file(path: &Path, ops: &dyn FileOps) -> Result<Connection> {
    let mut source = path.to_path_buf();
    if !ops.exists(path) {
        let bak = commit::sibling(path, "bak");
        if !ops.exists(&bak) {
            debug!("No file at {:?}, starting empty table", path);
            return fresh_connection();
        }
        match ops.rename(&bak, path) {
            Ok(()) => warn!("Restored {:?} from leftover backup", path),
            Err(e) => {
                warn!("Could not restore {:?} from backup, reading {:?}: {}", path, bak, e);
                source = bak;
            }
        }
    }

    let mut conn = Connection::open_in_memory()?;
    conn.restore(
        DatabaseName::Main,
        &source,
        None::<fn(rusqlite::backup::Progress)>,
    )?;
    conn.execute_batch(schema::CREATE_TABLE)?;
    Ok(conn)
}
