//! Thread-shareable engine handle
//!
//! The SQLite connection inside the store is `Send` but not `Sync`, so readers
//! and writers take the same exclusive lock.

use crate::core::engine::TreeEngine;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to one engine
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<TreeEngine>>,
}

impl SharedEngine {
    pub fn new(engine: TreeEngine) -> Self {
        SharedEngine {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine for the lifetime of the guard
    pub fn lock(&self) -> MutexGuard<'_, TreeEngine> {
        self.inner.lock()
    }

    /// Run `f` with the engine locked
    ///
    /// # Examples
    ///
    /// ```
    /// use forest_rs::{EngineConfig, Entry, Nid, SharedEngine, TreeEngine};
    ///
    /// # fn main() -> forest_rs::Result<()> {
    /// let shared = SharedEngine::new(TreeEngine::in_memory(EngineConfig::default())?);
    /// let id = shared.with(|e| e.create_child(Nid::FOREST, Entry::new("inbox")))?;
    /// assert!(shared.with(|e| e.contains(id)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn with<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut TreeEngine) -> T,
    {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Take the engine back if this is the last handle
    pub fn try_unwrap(self) -> Result<TreeEngine, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| SharedEngine { inner })
    }
}
