//! Forest engine internals
//!
//! - [`entry`] - Entry, row and identifier types
//! - [`allocator`] - Identifier allocation with reuse of released ids
//! - [`tree`] - Arena forest, row loading and sibling sorting
//! - [`store`] - SQLite-backed adjacency table with crash-safe commits
//! - [`engine`] - The forest and the store kept in step
//! - [`config`] - Engine tunables
//! - [`shared`] - Lock-protected handle for multi-threaded hosts

pub mod allocator;
pub mod config;
pub mod engine;
pub mod entry;
pub mod shared;
pub mod store;
pub mod tree;

pub use engine::TreeEngine;
pub use shared::SharedEngine;
