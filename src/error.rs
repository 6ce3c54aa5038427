//! Error types for forest operations

use crate::core::entry::Nid;
use thiserror::Error;

/// Step of the backup-temp-rename commit that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    /// Writing the full snapshot to `F.tmp`
    WriteTemp,
    /// Copying the live file to `F.bak`
    Backup,
    /// Removing the live file
    RemoveLive,
    /// Renaming `F.tmp` over the live path
    Promote,
}

impl std::fmt::Display for CommitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            CommitStep::WriteTemp => "write temp file",
            CommitStep::Backup => "copy backup",
            CommitStep::RemoveLive => "remove live file",
            CommitStep::Promote => "rename temp file",
        };
        f.write_str(step)
    }
}

#[derive(Error, Debug)]
pub enum ForestError {
    #[error("Entry not found: {0}")]
    NotFound(Nid),

    #[error("Identifier space exhausted: no free nid available")]
    IdSpaceExhausted,

    #[error("Invalid move: {node} cannot be moved under {target}")]
    InvalidMove { node: Nid, target: Nid },

    #[error("Storage unavailable: row store has not been loaded")]
    StorageUnavailable,

    #[error("Commit failed during {step}: {source}")]
    CommitFailed {
        step: CommitStep,
        #[source]
        source: std::io::Error,
    },

    #[error("Reserved id 0 cannot be used by an entry")]
    ReservedId,

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ForestError {
    /// Whether the in-memory tree may have diverged from storage
    ///
    /// Precondition failures are raised before anything is touched, so only
    /// storage-side failures require the caller to reload.
    pub fn requires_reload(&self) -> bool {
        matches!(
            self,
            ForestError::CommitFailed { .. } | ForestError::Sqlite(_) | ForestError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ForestError>;
