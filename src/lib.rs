//! # forest-rs - Persistent Forest of Named Entries
//!
//! `forest-rs` keeps an ordered forest of named entries in memory and mirrors
//! every change into an adjacency table stored in a single SQLite file.
//!
//! - **Integer ids** allocated smallest-free-first, with released ids reused
//! - **Structural edits**: create, promote-on-remove, branch removal, move, sort
//! - **Crash-safe commits**: the file is replaced through a temp file and a
//!   backup, and rolled back if the replacement fails
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forest_rs::{Entry, ForestBuilder, Nid, Result};
//!
//! # fn main() -> Result<()> {
//! let mut forest = ForestBuilder::new().path("notes.db").build()?;
//!
//! let inbox = forest.create_child(Nid::FOREST, Entry::new("Inbox"))?;
//! let todo = forest.create_child(inbox, Entry::new("todo").with_note("notes/todo.md"))?;
//!
//! forest.rename(todo, "Today")?;
//! forest.sort_branch(inbox, forest_rs::case_folded_key)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use forest_rs::{EngineConfig, ForestBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let config = EngineConfig::load("forest.toml")?;
//! let forest = ForestBuilder::new()
//!     .path("notes.db")
//!     .config(config)
//!     .keep_backup(true)
//!     .build()?;
//! println!("{}", forest);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;

pub use crate::core::{
    allocator::{IdAllocator, NidRegister},
    config::EngineConfig,
    engine::TreeEngine,
    entry::{Column, Entry, EntryPatch, EntryRow, FieldMap, Nid, RowPatch},
    shared::SharedEngine,
    store::{FileOps, InsertMode, RowStore, StdFileOps},
    tree::{byte_key, case_folded_key, Forest, Node, DEFAULT_SORT_PREFIX},
};
pub use crate::error::{CommitStep, ForestError, Result};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Builder for opening a file-backed [`TreeEngine`]
///
/// # Examples
///
/// ```rust,no_run
/// use forest_rs::{EngineConfig, ForestBuilder};
///
/// # fn main() -> forest_rs::Result<()> {
/// let forest = ForestBuilder::new()
///     .path("/data/outline.db")
///     .config(EngineConfig { sort_prefix_len: 4, ..Default::default() })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ForestBuilder {
    path: Option<PathBuf>,
    config: EngineConfig,
    file_ops: Option<Arc<dyn FileOps>>,
    keep_backup: Option<bool>,
}

impl ForestBuilder {
    /// Create a new ForestBuilder with default settings
    pub fn new() -> Self {
        ForestBuilder {
            path: None,
            config: EngineConfig::default(),
            file_ops: None,
            keep_backup: None,
        }
    }

    /// Set the database file (required)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Route commit file operations through `ops`
    pub fn file_ops(mut self, ops: Arc<dyn FileOps>) -> Self {
        self.file_ops = Some(ops);
        self
    }

    /// Keep `F.bak` after each successful commit, overriding the config
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = Some(keep);
        self
    }

    /// Validate the configuration, load the file and build the forest
    pub fn build(self) -> Result<TreeEngine> {
        let path = self
            .path
            .ok_or_else(|| ForestError::Config("path must be set".to_string()))?;

        let mut config = self.config;
        if let Some(keep) = self.keep_backup {
            config.keep_backup = keep;
        }
        config.check()?;

        info!("Opening forest at {:?}", path);

        let mut store = RowStore::new().with_keep_backup(config.keep_backup);
        if let Some(ops) = self.file_ops {
            store = store.with_file_ops(ops);
            debug!("Custom file operations installed");
        }

        let mut engine = TreeEngine::with_store(store, config);
        engine.load(&path)?;
        Ok(engine)
    }

    /// Build and wrap the engine for sharing between threads
    pub fn build_shared(self) -> Result<SharedEngine> {
        Ok(SharedEngine::new(self.build()?))
    }
}

impl Default for ForestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builder_requires_path() {
        assert!(matches!(
            ForestBuilder::new().build(),
            Err(ForestError::Config(_))
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let result = ForestBuilder::new()
            .path(dir.path().join("f.db"))
            .config(EngineConfig {
                sort_prefix_len: 0,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(ForestError::Config(_))));
        assert!(!dir.path().join("f.db").exists());
    }

    #[test]
    fn test_builder_keep_backup_overrides_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.db");
        let mut forest = ForestBuilder::new().path(&path).keep_backup(true).build().unwrap();
        assert!(forest.config().keep_backup);

        forest.create_child(Nid::FOREST, Entry::new("a")).unwrap();
        forest.create_child(Nid::FOREST, Entry::new("b")).unwrap();
        assert!(path.exists());
        assert!(dir.path().join("f.db.bak").exists());
    }
}
