//! Set-based nid register
//!
//! Tracks two disjoint sets: registered (in use) ids and released ids waiting
//! to be reused. Both are ordered so the smallest candidate is always cheap to find.

use crate::core::allocator::IdAllocator;
use crate::core::entry::Nid;
use crate::error::{ForestError, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Register of in-use and released entry identifiers
#[derive(Debug, Clone, Default)]
pub struct NidRegister {
    /// Ids currently owned by a live entry (or reserved)
    registered: BTreeSet<u64>,

    /// Released ids, reused smallest-first
    free: BTreeSet<u64>,
}

impl NidRegister {
    /// Create an empty register
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a register with the forest root already claimed
    pub fn reserving_forest() -> Self {
        let mut register = Self::new();
        register.registered.insert(Nid::FOREST.as_u64());
        register
    }

    /// Lowest id not present in the registered set
    fn lowest_unregistered(&self) -> Option<u64> {
        let mut candidate = 0u64;
        for &taken in &self.registered {
            if taken != candidate {
                // registered is ordered, so the first gap is the answer
                return Some(candidate);
            }
            candidate = candidate.checked_add(1)?;
        }
        Some(candidate)
    }

    /// Registered ids in ascending order
    pub fn registered(&self) -> impl Iterator<Item = Nid> + '_ {
        self.registered.iter().map(|&n| Nid::new(n))
    }
}

impl IdAllocator for NidRegister {
    fn allocate(&mut self) -> Result<Nid> {
        if let Some(nid) = self.free.pop_first() {
            self.registered.insert(nid);
            return Ok(Nid::new(nid));
        }

        let nid = self
            .lowest_unregistered()
            .ok_or(ForestError::IdSpaceExhausted)?;
        self.registered.insert(nid);
        Ok(Nid::new(nid))
    }

    fn release(&mut self, nid: Nid) {
        if nid.is_forest() {
            tracing::warn!("Refusing to release reserved forest id");
            return;
        }

        if !self.registered.remove(&nid.as_u64()) {
            // Releasing twice would hand the same id to two entries
            tracing::warn!("Release of unregistered nid {} ignored", nid);
            return;
        }

        self.free.insert(nid.as_u64());
    }

    fn adopt(&mut self, nids: &[Nid]) {
        for nid in nids {
            self.free.remove(&nid.as_u64());
            self.registered.insert(nid.as_u64());
        }
    }

    fn is_registered(&self, nid: Nid) -> bool {
        self.registered.contains(&nid.as_u64())
    }

    fn registered_count(&self) -> usize {
        self.registered.len()
    }

    fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl fmt::Display for NidRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.registered.iter().map(|n| n.to_string()).collect();
        write!(f, "Nid: {}", ids.join(","))
    }
}
