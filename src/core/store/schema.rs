//! Adjacency table layout and statements
//!
//! Every column is TEXT. Numeric columns are cast only where ordering needs it.

use crate::core::entry::{EntryRow, Nid};
use crate::error::{ForestError, Result};

pub const TABLE: &str = "ADJACENCY";

pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS ADJACENCY (
    id       TEXT NOT NULL PRIMARY KEY,
    parentId TEXT,
    name     TEXT,
    note     TEXT,
    type     TEXT,
    tag      TEXT,
    field    TEXT,
    depth    TEXT,
    sequence TEXT
)";

pub const COLUMNS: &str = "id, parentId, name, note, type, tag, field, depth, sequence";

/// Insert that leaves an existing row with the same id untouched
pub const INSERT_IF_ABSENT: &str = "INSERT INTO ADJACENCY
    (id, parentId, name, note, type, tag, field, depth, sequence)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO NOTHING";

/// Insert that overwrites an existing row with the same id
pub const UPSERT: &str = "INSERT INTO ADJACENCY
    (id, parentId, name, note, type, tag, field, depth, sequence)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        parentId = excluded.parentId,
        name = excluded.name,
        note = excluded.note,
        type = excluded.type,
        tag = excluded.tag,
        field = excluded.field,
        depth = excluded.depth,
        sequence = excluded.sequence";

pub const DELETE: &str = "DELETE FROM ADJACENCY WHERE id = ?1";

/// All rows in sequence order
///
/// Rows never sequenced sort last, in insertion order.
pub const SELECT_ORDERED: &str = "SELECT id, parentId, name, note, type, tag, field, depth, sequence
    FROM ADJACENCY
    ORDER BY sequence IS NULL, CAST(sequence AS INTEGER), rowid";

pub const SELECT_ALL: &str = "SELECT id, parentId, name, note, type, tag, field, depth, sequence
    FROM ADJACENCY";

pub const SELECT_ONE: &str = "SELECT id, parentId, name, note, type, tag, field, depth, sequence
    FROM ADJACENCY
    WHERE id = ?1";

pub const MAX_SEQUENCE: &str = "SELECT MAX(CAST(sequence AS INTEGER)) FROM ADJACENCY";

pub const COUNT: &str = "SELECT COUNT(*) FROM ADJACENCY";

/// Positional parameters for [`INSERT_IF_ABSENT`] and [`UPSERT`]
pub fn insert_params(row: &EntryRow) -> [Option<String>; 9] {
    [
        Some(row.id.to_string()),
        row.parent_id.map(|p| p.to_string()),
        Some(row.name.clone()),
        row.note.clone(),
        row.kind.clone(),
        row.tag.clone(),
        row.field.clone(),
        row.depth.map(|d| d.to_string()),
        row.sequence.map(|s| s.to_string()),
    ]
}

fn parse_number<T: std::str::FromStr>(column: &str, id: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(text) if text.trim().is_empty() || text == "null" => Ok(None),
        Some(text) => text.trim().parse::<T>().map(Some).map_err(|_| {
            ForestError::InvalidRow(format!("row {}: {} '{}' is not a number", id, column, text))
        }),
    }
}

/// Decode one row selected with [`COLUMNS`] order
pub fn decode_row(row: &rusqlite::Row<'_>) -> Result<EntryRow> {
    let id: String = row.get(0)?;
    let parent: Option<String> = row.get(1)?;
    let name: Option<String> = row.get(2)?;

    let parent_id = match parent.as_deref() {
        None | Some("") | Some("null") => None,
        Some(p) => Some(p.parse::<Nid>()?),
    };

    Ok(EntryRow {
        id: id.parse()?,
        parent_id,
        name: name.unwrap_or_default(),
        note: row.get(3)?,
        kind: row.get(4)?,
        tag: row.get(5)?,
        field: row.get(6)?,
        depth: parse_number("depth", &id, row.get(7)?)?,
        sequence: parse_number("sequence", &id, row.get(8)?)?,
    })
}
