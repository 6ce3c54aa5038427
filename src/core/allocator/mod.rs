//! Identifier allocation for forest entries
//!
//! Identifiers are small non-negative integers that get reused once released:
//! - Released ids are handed out again smallest-first
//! - Otherwise the lowest id not currently registered is issued

pub mod nid;

pub use nid::NidRegister;

use crate::core::entry::Nid;
use crate::error::Result;

/// Identifier allocator trait
///
/// Defines the interface the tree engine uses to issue and reclaim entry ids.
pub trait IdAllocator {
    /// Issue a fresh identifier and mark it registered
    fn allocate(&mut self) -> Result<Nid>;

    /// Return a registered identifier to the free pool
    fn release(&mut self, nid: Nid);

    /// Mark identifiers as registered without touching the free pool
    ///
    /// Used when rebuilding from storage.
    fn adopt(&mut self, nids: &[Nid]);

    /// Whether an identifier is currently in use
    fn is_registered(&self, nid: Nid) -> bool;

    /// Number of identifiers in use
    fn registered_count(&self) -> usize;

    /// Number of released identifiers waiting for reuse
    fn free_count(&self) -> usize;
}
