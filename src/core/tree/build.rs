//! Building a forest from adjacency rows
//!
//! Rows are expected in ascending `sequence` order. Roots are taken in row
//! order and expanded breadth-first; each expanded node receives its children
//! in row order, so sibling order is whatever the last sequence refresh wrote.

use crate::core::entry::{EntryRow, Nid};
use crate::core::tree::{Forest, Node};
use crate::error::{ForestError, Result};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;
use tracing::warn;

impl Forest {
    /// Build a forest from rows ordered by `sequence`
    ///
    /// Every reachable row becomes exactly one node and depth is derived
    /// top-down. Rows that claim the reserved id or repeat an id are
    /// rejected. Rows that cannot be reached from a root (dangling parent or
    /// a parent cycle) are skipped with a warning; compare [`Forest::len`]
    /// with the row count to detect them.
    pub fn from_rows(rows: &[EntryRow]) -> Result<Forest> {
        let mut seen = AHashSet::with_capacity(rows.len());
        let mut by_parent: AHashMap<Nid, Vec<usize>> = AHashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            if row.id.is_forest() {
                return Err(ForestError::ReservedId);
            }
            if !seen.insert(row.id) {
                return Err(ForestError::InvalidRow(format!("duplicate id {}", row.id)));
            }
            by_parent.entry(row.parent()).or_default().push(idx);
        }

        let mut forest = Forest::new();
        let mut queue: VecDeque<Nid> = VecDeque::new();

        for &idx in by_parent.get(&Nid::FOREST).map(Vec::as_slice).unwrap_or(&[]) {
            let row = &rows[idx];
            forest.attach(Nid::FOREST, Node::new(row.id, row.entry()?))?;
            queue.push_back(row.id);
        }

        while let Some(parent) = queue.pop_front() {
            let Some(children) = by_parent.get(&parent) else {
                continue;
            };
            for &idx in children {
                let row = &rows[idx];
                forest.attach(parent, Node::new(row.id, row.entry()?))?;
                queue.push_back(row.id);
            }
        }

        if forest.len() != rows.len() {
            let mut orphans: Vec<String> = rows
                .iter()
                .filter(|row| !forest.contains(row.id))
                .map(|row| row.id.to_string())
                .collect();
            let skipped = orphans.len();
            orphans.truncate(16);
            warn!(
                "Skipped {} rows not reachable from a root: {}",
                skipped,
                orphans.join(", ")
            );
        }

        Ok(forest)
    }

    /// Move every tree of `other` into this forest as new last roots
    ///
    /// Fails without changing anything if an id exists in both forests.
    pub(crate) fn graft(&mut self, other: Forest) -> Result<Vec<Nid>> {
        if let Some(clash) = other.ids().find(|id| self.contains(*id)) {
            return Err(ForestError::InvalidRow(format!("id {} is already live", clash)));
        }

        let grafted = other.roots.clone();
        self.roots.extend(grafted.iter().copied());
        self.nodes.extend(other.nodes);
        Ok(grafted)
    }
}
