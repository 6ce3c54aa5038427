//! Entry, row and identifier types
//!
//! An [`Entry`] is what a caller creates; an [`EntryRow`] is the shape it takes in
//! the adjacency table. Every column of the table is text, so numeric fields are
//! parsed on the way in and formatted on the way out.

use crate::error::{ForestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Open attribute map serialized into the `field` column
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Integer identifier of an entry
///
/// `Nid(0)` is the virtual forest root and never names a real entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nid(u64);

impl Nid {
    /// The reserved forest root
    pub const FOREST: Nid = Nid(0);

    pub const fn new(value: u64) -> Self {
        Nid(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_forest(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Nid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Nid {
    type Err = ForestError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Nid)
            .map_err(|_| ForestError::InvalidRow(format!("id '{}' is not a non-negative integer", s)))
    }
}

impl From<u64> for Nid {
    fn from(value: u64) -> Self {
        Nid(value)
    }
}

/// User-facing attributes of one entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Display name
    pub name: String,

    /// Reference (usually a path) to externally owned note content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Entry type, stored in the `type` column
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Caller-defined attributes
    #[serde(default, skip_serializing_if = "FieldMap::is_empty")]
    pub field: FieldMap,
}

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Entry {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.field.insert(key.into(), value);
        self
    }

    /// JSON text for the `field` column, `None` when there is nothing to store
    pub fn field_text(&self) -> Result<Option<String>> {
        encode_field(&self.field)
    }
}

pub(crate) fn encode_field(field: &FieldMap) -> Result<Option<String>> {
    if field.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(field)?))
    }
}

pub(crate) fn decode_field(text: Option<&str>) -> Result<FieldMap> {
    match text {
        None => Ok(FieldMap::new()),
        Some(t) if t.trim().is_empty() => Ok(FieldMap::new()),
        Some(t) => Ok(serde_json::from_str(t)?),
    }
}

/// Partial update of an entry's attributes
///
/// Outer `None` leaves an attribute alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub note: Option<Option<String>>,
    pub kind: Option<Option<String>>,
    pub tag: Option<Option<String>>,
    pub field: Option<FieldMap>,
}

impl EntryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = Some(note);
        self
    }

    pub fn kind(mut self, kind: Option<String>) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn tag(mut self, tag: Option<String>) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn field(mut self, field: FieldMap) -> Self {
        self.field = Some(field);
        self
    }

    /// Column assignments matching this patch
    pub fn to_row_patch(&self) -> Result<RowPatch> {
        let mut patch = RowPatch::new();
        if let Some(name) = &self.name {
            patch = patch.name(name.clone());
        }
        if let Some(note) = &self.note {
            patch = patch.note(note.clone());
        }
        if let Some(kind) = &self.kind {
            patch = patch.set(Column::Type, kind.clone());
        }
        if let Some(tag) = &self.tag {
            patch = patch.set(Column::Tag, tag.clone());
        }
        if let Some(field) = &self.field {
            patch = patch.set(Column::Field, encode_field(field)?);
        }
        Ok(patch)
    }

    pub fn apply(self, entry: &mut Entry) {
        if let Some(name) = self.name {
            entry.name = name;
        }
        if let Some(note) = self.note {
            entry.note = note;
        }
        if let Some(kind) = self.kind {
            entry.kind = kind;
        }
        if let Some(tag) = self.tag {
            entry.tag = tag;
        }
        if let Some(field) = self.field {
            entry.field = field;
        }
    }
}

/// Persisted form of an entry: one row of the adjacency table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRow {
    pub id: Nid,

    /// `None` for forest roots
    #[serde(rename = "parentId")]
    pub parent_id: Option<Nid>,

    pub name: String,
    pub note: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tag: Option<String>,

    /// Raw JSON text of the attribute map
    pub field: Option<String>,

    /// Number of ancestors; forest roots are 0
    pub depth: Option<u32>,

    /// Pre-order position written by the last sequence refresh
    pub sequence: Option<u64>,
}

impl EntryRow {
    /// Row with only identity and structure filled in
    pub fn new(id: Nid, parent_id: Option<Nid>, name: impl Into<String>) -> Self {
        EntryRow {
            id,
            parent_id,
            name: name.into(),
            note: None,
            kind: None,
            tag: None,
            field: None,
            depth: None,
            sequence: None,
        }
    }

    pub(crate) fn from_entry(id: Nid, parent: Nid, entry: &Entry, depth: u32) -> Result<Self> {
        Ok(EntryRow {
            id,
            parent_id: if parent.is_forest() { None } else { Some(parent) },
            name: entry.name.clone(),
            note: entry.note.clone(),
            kind: entry.kind.clone(),
            tag: entry.tag.clone(),
            field: entry.field_text()?,
            depth: Some(depth),
            sequence: None,
        })
    }

    /// Attributes carried by this row
    pub fn entry(&self) -> Result<Entry> {
        Ok(Entry {
            name: self.name.clone(),
            note: self.note.clone(),
            kind: self.kind.clone(),
            tag: self.tag.clone(),
            field: decode_field(self.field.as_deref())?,
        })
    }

    /// Parent in forest terms, mapping a null parent to [`Nid::FOREST`]
    pub fn parent(&self) -> Nid {
        self.parent_id.unwrap_or(Nid::FOREST)
    }
}

/// Column of the adjacency table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ParentId,
    Name,
    Note,
    Type,
    Tag,
    Field,
    Depth,
    Sequence,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::ParentId => "parentId",
            Column::Name => "name",
            Column::Note => "note",
            Column::Type => "type",
            Column::Tag => "tag",
            Column::Field => "field",
            Column::Depth => "depth",
            Column::Sequence => "sequence",
        }
    }
}

/// Set of column assignments for one `UPDATE`
///
/// Values are already text-encoded; `None` writes SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPatch {
    assignments: Vec<(Column, Option<String>)>,
}

impl RowPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier assignment to the same column
    pub fn set(mut self, column: Column, value: Option<String>) -> Self {
        self.assignments.retain(|(c, _)| *c != column);
        self.assignments.push((column, value));
        self
    }

    pub fn parent(self, parent: Nid) -> Self {
        let value = if parent.is_forest() {
            None
        } else {
            Some(parent.to_string())
        };
        self.set(Column::ParentId, value)
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.set(Column::Name, Some(name.into()))
    }

    pub fn note(self, note: Option<String>) -> Self {
        self.set(Column::Note, note)
    }

    pub fn depth(self, depth: u32) -> Self {
        self.set(Column::Depth, Some(depth.to_string()))
    }

    pub fn sequence(self, sequence: u64) -> Self {
        self.set(Column::Sequence, Some(sequence.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> &[(Column, Option<String>)] {
        &self.assignments
    }
}
