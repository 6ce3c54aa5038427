//! Tree engine: the in-memory forest kept in step with the row store
//!
//! Every structural mutator validates its preconditions first, then changes
//! the forest, then writes the matching rows. A storage failure after the
//! forest changed is returned as-is; the caller reloads to resynchronize
//! (see [`ForestError::requires_reload`]).
//!
//! New and re-parented entries get a `sequence` larger than any stored one, so
//! a reload reproduces the in-memory sibling order even before the next
//! full sequence refresh.

use crate::core::allocator::{IdAllocator, NidRegister};
use crate::core::config::EngineConfig;
use crate::core::entry::{Entry, EntryPatch, EntryRow, FieldMap, Nid, RowPatch};
use crate::core::store::{InsertMode, RowStore};
use crate::core::tree::{Forest, Node};
use crate::error::{ForestError, Result};
use ahash::AHashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, info, warn};

/// Mutable, persistent forest of entries
#[derive(Debug)]
pub struct TreeEngine {
    forest: Forest,
    nids: NidRegister,
    store: RowStore,
    config: EngineConfig,

    /// Subtree the host is currently zoomed into
    active_root: Nid,

    /// Next `sequence` handed to an appended entry
    next_sequence: u64,
}

impl TreeEngine {
    /// Create an engine whose store is not loaded yet
    pub fn new(config: EngineConfig) -> Self {
        let store = RowStore::new().with_keep_backup(config.keep_backup);
        Self::with_store(store, config)
    }

    /// Create an engine around an existing store
    ///
    /// Call [`TreeEngine::reload`] to build the forest from a store that
    /// already holds rows.
    pub fn with_store(store: RowStore, config: EngineConfig) -> Self {
        TreeEngine {
            forest: Forest::new(),
            nids: NidRegister::reserving_forest(),
            store,
            config,
            active_root: Nid::FOREST,
            next_sequence: 1,
        }
    }

    /// Engine over an in-memory store that is never written to disk
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Ok(Self::with_store(RowStore::open_in_memory()?, config))
    }

    /// Load the store at `path` and rebuild the forest from it
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.store.load(path)?;
        self.rebuild()
    }

    /// Discard in-memory state and rebuild from storage
    ///
    /// Re-reads the file when the store has one.
    pub fn reload(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        if let Some(path) = self.store.path().map(Path::to_path_buf) {
            self.store.load(path)?;
        }
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<()> {
        let rows = self.store.rows_in_sequence()?;
        let forest = Forest::from_rows(&rows)?;

        // Unreachable rows stay registered so their ids are never reissued
        let mut nids = NidRegister::reserving_forest();
        let ids: Vec<Nid> = rows.iter().map(|r| r.id).collect();
        nids.adopt(&ids);

        self.forest = forest;
        self.nids = nids;
        self.active_root = Nid::FOREST;
        self.next_sequence = self.store.max_sequence()? + 1;

        let fixed = if self.config.refresh_depth_on_remove {
            self.sync_depth_rows(&rows)?
        } else {
            0
        };
        info!(
            "Built forest with {} entries from {} rows ({} stored depths corrected)",
            self.forest.len(),
            rows.len(),
            fixed
        );
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.store.is_loaded() {
            Ok(())
        } else {
            Err(ForestError::StorageUnavailable)
        }
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Write in-memory depth to every row that disagrees with it
    fn sync_depth_rows(&mut self, rows: &[EntryRow]) -> Result<usize> {
        let mut fixed = 0;
        for row in rows {
            let Some(depth) = self.forest.get(row.id).ok().map(|n| n.depth) else {
                continue;
            };
            if row.depth != Some(depth) {
                self.store.update_row(row.id, &RowPatch::new().depth(depth))?;
                fixed += 1;
            }
        }
        Ok(fixed)
    }

    fn insert_entry(&mut self, parent: Nid, entry: Entry) -> Result<Nid> {
        self.ensure_loaded()?;
        let depth = self.forest.child_depth(parent)?;

        let id = self.nids.allocate()?;
        let mut row = match EntryRow::from_entry(id, parent, &entry, depth) {
            Ok(row) => row,
            Err(e) => {
                self.nids.release(id);
                return Err(e);
            }
        };
        row.sequence = Some(self.take_sequence());

        self.forest.attach(parent, Node::new(id, entry))?;
        if !self.store.insert_row(&row, InsertMode::IfAbsent)? {
            warn!("Stale row for new entry {} left in place", id);
        }

        debug!("Created entry {} under {}", id, parent);
        Ok(id)
    }

    /// Create an entry as the last child of `parent`
    ///
    /// `parent` may be [`Nid::FOREST`] to create a new root.
    ///
    /// # Examples
    ///
    /// ```
    /// use forest_rs::{Entry, EngineConfig, Nid, TreeEngine};
    ///
    /// # fn main() -> forest_rs::Result<()> {
    /// let mut engine = TreeEngine::in_memory(EngineConfig::default())?;
    /// let root = engine.create_child(Nid::FOREST, Entry::new("Projects"))?;
    /// let child = engine.create_child(root, Entry::new("forest-rs"))?;
    ///
    /// assert_eq!(engine.children_of(root)?, &[child]);
    /// assert_eq!(engine.depth_of(child)?, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_child(&mut self, parent: Nid, entry: Entry) -> Result<Nid> {
        self.insert_entry(parent, entry)
    }

    /// Create an entry as the new last sibling of `node`
    pub fn create_sibling(&mut self, node: Nid, entry: Entry) -> Result<Nid> {
        self.ensure_loaded()?;
        let parent = self.forest.get(node)?.parent;
        self.insert_entry(parent, entry)
    }

    /// Remove one entry and promote its children to its parent
    ///
    /// The children keep their order and become the parent's last children.
    /// In-memory depth is always recomputed; stored depth of the promoted
    /// subtrees is rewritten only when `refresh_depth_on_remove` is set.
    /// Promoted rows are re-parented before the removed row is deleted, so
    /// a failure part way leaves every stored row reachable.
    pub fn remove_node(&mut self, id: Nid) -> Result<()> {
        self.ensure_loaded()?;
        if id.is_forest() {
            return Err(ForestError::NotFound(id));
        }

        let (removed, promoted) = self.forest.remove_promoting(id)?;
        if self.active_root == id {
            self.active_root = Nid::FOREST;
        }
        self.nids.release(id);

        for child in promoted {
            let changed = self.forest.recompute_depth(child)?;
            let sequence = self.take_sequence();

            let mut patch = RowPatch::new().parent(removed.parent).sequence(sequence);
            if self.config.refresh_depth_on_remove {
                if let Some((_, depth)) = changed.iter().find(|(nid, _)| *nid == child) {
                    patch = patch.depth(*depth);
                }
            }
            self.store.update_row(child, &patch)?;

            if self.config.refresh_depth_on_remove {
                for (nid, depth) in changed.into_iter().filter(|(nid, _)| *nid != child) {
                    self.store.update_row(nid, &RowPatch::new().depth(depth))?;
                }
            }
        }

        self.store.delete_row(id)?;
        debug!("Removed entry {}, children promoted to {}", id, removed.parent);
        Ok(())
    }

    /// Remove an entry together with its whole subtree
    ///
    /// Returns the removed ids in breadth-first order. Rows are deleted
    /// deepest first, so a failure part way leaves no stored orphans.
    pub fn remove_branch(&mut self, id: Nid) -> Result<Vec<Nid>> {
        self.ensure_loaded()?;
        if id.is_forest() {
            return Err(ForestError::NotFound(id));
        }

        if self.forest.is_within(self.active_root, id)? {
            self.active_root = Nid::FOREST;
        }
        let removed = self.forest.remove_subtree(id)?;

        let ids: Vec<Nid> = removed.iter().map(|node| node.id).collect();
        for nid in &ids {
            self.nids.release(*nid);
        }
        for nid in ids.iter().rev() {
            self.store.delete_row(*nid)?;
        }

        debug!("Removed branch {} ({} entries)", id, ids.len());
        Ok(ids)
    }

    fn patch_entry(&mut self, id: Nid, patch: EntryPatch) -> Result<()> {
        self.ensure_loaded()?;
        let row_patch = patch.to_row_patch()?;
        patch.apply(&mut self.forest.get_mut(id)?.entry);
        self.store.update_row(id, &row_patch)?;
        Ok(())
    }

    pub fn rename(&mut self, id: Nid, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        debug!("Renaming entry {} to {:?}", id, name);
        self.patch_entry(id, EntryPatch::new().name(name))
    }

    /// Attach a note reference to an entry
    pub fn set_note(&mut self, id: Nid, note: impl Into<String>) -> Result<()> {
        self.patch_entry(id, EntryPatch::new().note(Some(note.into())))
    }

    /// Drop the note reference of an entry, leaving its name untouched
    pub fn clear_note(&mut self, id: Nid) -> Result<()> {
        self.patch_entry(id, EntryPatch::new().note(None))
    }

    /// Apply an attribute patch to one entry
    pub fn update_attributes(&mut self, id: Nid, patch: EntryPatch) -> Result<()> {
        self.patch_entry(id, patch)
    }

    /// Replace the `field` map of an entry that references a note
    ///
    /// Returns `false` without writing anything when the entry has no note.
    pub fn update_field(&mut self, id: Nid, field: FieldMap) -> Result<bool> {
        self.ensure_loaded()?;
        if self.forest.get(id)?.entry.note.is_none() {
            return Ok(false);
        }
        self.patch_entry(id, EntryPatch::new().field(field))?;
        Ok(true)
    }

    /// Move an entry and its subtree to the end of `target`'s children
    ///
    /// `target` may be [`Nid::FOREST`]. Fails with
    /// [`ForestError::InvalidMove`] if `target` is the entry itself or one of
    /// its descendants; nothing changes in that case.
    pub fn move_node(&mut self, id: Nid, target: Nid) -> Result<()> {
        self.ensure_loaded()?;
        self.forest.relocate(id, target)?;

        let changed = self.forest.recompute_depth(id)?;
        let sequence = self.take_sequence();

        let mut patch = RowPatch::new().parent(target).sequence(sequence);
        for (nid, depth) in &changed {
            if *nid == id {
                patch = patch.depth(*depth);
            }
        }
        self.store.update_row(id, &patch)?;

        for (nid, depth) in changed.into_iter().filter(|(nid, _)| *nid != id) {
            self.store.update_row(nid, &RowPatch::new().depth(depth))?;
        }

        debug!("Moved entry {} under {}", id, target);
        Ok(())
    }

    /// Sort the children of every node in a subtree by name
    ///
    /// `key` turns a name into comparable units, e.g.
    /// [`case_folded_key`](crate::case_folded_key) or a transliteration.
    /// Afterwards every row gets a dense pre-order `sequence` starting at 1.
    pub fn sort_branch<K, U>(&mut self, id: Nid, key: K) -> Result<()>
    where
        K: Fn(&str) -> Vec<U>,
        U: Ord,
    {
        self.ensure_loaded()?;
        let reordered = self
            .forest
            .sort_subtree(id, key, self.config.sort_prefix_len)?;
        debug!("Sorted branch {} ({} child lists reordered)", id, reordered.len());
        self.refresh_sequence()?;
        Ok(())
    }

    /// Rewrite `sequence` of every row from a pre-order walk of the forest
    ///
    /// Returns the number of rows that changed.
    pub fn refresh_sequence(&mut self) -> Result<usize> {
        self.ensure_loaded()?;
        let stored = self.stored_rows()?;

        let mut written = 0;
        let order = self.forest.pre_order();
        for (i, nid) in order.iter().enumerate() {
            let sequence = i as u64 + 1;
            let current = stored.get(nid).and_then(|r| r.sequence);
            if current != Some(sequence) {
                self.store.update_row(*nid, &RowPatch::new().sequence(sequence))?;
                written += 1;
            }
        }

        self.next_sequence = order.len() as u64 + 1;
        Ok(written)
    }

    /// Recompute depth of every node and write it to every stale row
    ///
    /// Returns the number of rows that changed.
    pub fn refresh_depth(&mut self) -> Result<usize> {
        self.ensure_loaded()?;
        self.forest.recompute_depth(Nid::FOREST)?;
        let rows = self.store.rows()?;
        self.sync_depth_rows(&rows)
    }

    fn stored_rows(&self) -> Result<AHashMap<Nid, EntryRow>> {
        Ok(self
            .store
            .rows()?
            .into_iter()
            .map(|row| (row.id, row))
            .collect())
    }

    /// Graft complete rows into the forest and write them to the store
    ///
    /// Rows are taken in the order given, as if read by `sequence`. Their
    /// roots become the last roots of the forest. Fails before changing
    /// anything if an id is already in use or the rows do not form a forest.
    pub fn import_rows(&mut self, rows: &[EntryRow]) -> Result<Vec<Nid>> {
        self.ensure_loaded()?;
        let incoming = Forest::from_rows(rows)?;
        if incoming.len() != rows.len() {
            return Err(ForestError::InvalidRow(format!(
                "{} of {} rows are not reachable from a root",
                rows.len() - incoming.len(),
                rows.len()
            )));
        }
        if let Some(clash) = incoming.ids().find(|id| self.nids.is_registered(*id)) {
            return Err(ForestError::InvalidRow(format!("id {} is already in use", clash)));
        }

        let grafted = self.forest.graft(incoming)?;
        let ids: Vec<Nid> = rows.iter().map(|r| r.id).collect();
        self.nids.adopt(&ids);

        let by_id: AHashMap<Nid, &EntryRow> = rows.iter().map(|r| (r.id, r)).collect();
        for root in &grafted {
            for nid in self.forest.pre_order_from(*root) {
                let mut row = by_id
                    .get(&nid)
                    .map(|r| (*r).clone())
                    .ok_or(ForestError::NotFound(nid))?;
                row.depth = Some(self.forest.get(nid)?.depth);
                row.sequence = Some(self.take_sequence());
                self.store.insert_row(&row, InsertMode::IfAbsent)?;
            }
        }

        info!("Imported {} rows under {} roots", rows.len(), grafted.len());
        Ok(grafted)
    }

    pub fn find_by_id(&self, id: Nid) -> Result<&Node> {
        self.forest.get(id)
    }

    /// Ordered children of `id`; [`Nid::FOREST`] lists the roots
    pub fn children_of(&self, id: Nid) -> Result<&[Nid]> {
        self.forest.children(id)
    }

    /// Ancestors from the outermost one down to the parent
    pub fn ancestors_of(&self, id: Nid) -> Result<Vec<Nid>> {
        self.forest.ancestors(id)
    }

    pub fn parent_of(&self, id: Nid) -> Result<Nid> {
        Ok(self.forest.get(id)?.parent)
    }

    pub fn depth_of(&self, id: Nid) -> Result<u32> {
        Ok(self.forest.get(id)?.depth)
    }

    pub fn roots(&self) -> &[Nid] {
        self.forest.roots()
    }

    pub fn len(&self) -> usize {
        self.forest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forest.is_empty()
    }

    pub fn contains(&self, id: Nid) -> bool {
        self.forest.contains(id)
    }

    /// Breadth-first visit of every entry until `visit` breaks
    pub fn walk<F>(&self, visit: F)
    where
        F: FnMut(&Node, u32) -> ControlFlow<()>,
    {
        self.forest.walk(visit)
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn nids(&self) -> &NidRegister {
        &self.nids
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the backing store for custom queries
    pub fn store(&self) -> &RowStore {
        &self.store
    }

    /// Raw dump of the adjacency table
    pub fn export_rows(&self) -> Result<Vec<EntryRow>> {
        self.store.rows()
    }

    /// Stored row of one entry
    pub fn row_of(&self, id: Nid) -> Result<EntryRow> {
        self.store.row(id)?.ok_or(ForestError::NotFound(id))
    }

    pub fn active_root(&self) -> Nid {
        self.active_root
    }

    /// Zoom the host view into the subtree rooted at `id`
    pub fn set_active_root(&mut self, id: Nid) -> Result<()> {
        if !id.is_forest() {
            self.forest.get(id)?;
        }
        self.active_root = id;
        Ok(())
    }

    pub fn reset_active_root(&mut self) {
        self.active_root = Nid::FOREST;
    }
}

impl fmt::Display for TreeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.nids)?;
        f.write_str(&self.forest.outline())
    }
}
