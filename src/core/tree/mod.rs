//! In-memory ordered forest
//!
//! Nodes live in an arena keyed by [`Nid`]. Parent links and child lists are
//! ids into that arena, so there is exactly one owner (the arena) and no
//! reference cycles. The virtual forest root is not stored in the arena; its
//! child list is [`Forest::roots`].

pub mod build;
pub mod sort;

pub use sort::{byte_key, case_folded_key, DEFAULT_SORT_PREFIX};

use crate::core::entry::{Entry, Nid};
use crate::error::{ForestError, Result};
use ahash::AHashMap;
use std::collections::VecDeque;
use std::ops::ControlFlow;

/// In-memory counterpart of one entry
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: Nid,

    /// Non-owning back reference; [`Nid::FOREST`] for roots
    pub parent: Nid,

    /// Ordered child ids
    pub children: Vec<Nid>,

    /// Number of ancestors excluding the forest
    pub depth: u32,

    pub entry: Entry,
}

impl Node {
    pub fn new(id: Nid, entry: Entry) -> Self {
        Node {
            id,
            parent: Nid::FOREST,
            children: Vec::new(),
            depth: 0,
            entry,
        }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_forest()
    }
}

/// Arena-backed forest of ordered trees
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: AHashMap<Nid, Node>,
    roots: Vec<Nid>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes (the forest root is not counted)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Nid) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Ids of the forest roots in order
    pub fn roots(&self) -> &[Nid] {
        &self.roots
    }

    pub fn ids(&self) -> impl Iterator<Item = Nid> + '_ {
        self.nodes.keys().copied()
    }

    pub fn get(&self, id: Nid) -> Result<&Node> {
        self.nodes.get(&id).ok_or(ForestError::NotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: Nid) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(ForestError::NotFound(id))
    }

    /// Ordered children of `id`; the forest root yields the roots
    pub fn children(&self, id: Nid) -> Result<&[Nid]> {
        if id.is_forest() {
            return Ok(&self.roots);
        }
        Ok(&self.get(id)?.children)
    }

    fn children_mut(&mut self, id: Nid) -> Result<&mut Vec<Nid>> {
        if id.is_forest() {
            return Ok(&mut self.roots);
        }
        Ok(&mut self.get_mut(id)?.children)
    }

    /// Depth a node gets when attached under `parent`
    pub fn child_depth(&self, parent: Nid) -> Result<u32> {
        if parent.is_forest() {
            Ok(0)
        } else {
            Ok(self.get(parent)?.depth + 1)
        }
    }

    /// Ancestor chain from the outermost ancestor down to the immediate parent
    pub fn ancestors(&self, id: Nid) -> Result<Vec<Nid>> {
        let mut chain = Vec::new();
        let mut current = self.get(id)?.parent;
        while !current.is_forest() {
            chain.push(current);
            current = self.get(current)?.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Whether `id` lies in the subtree rooted at `ancestor` (inclusive)
    pub fn is_within(&self, id: Nid, ancestor: Nid) -> Result<bool> {
        if ancestor.is_forest() {
            return Ok(id.is_forest() || self.contains(id));
        }
        let mut current = id;
        while !current.is_forest() {
            if current == ancestor {
                return Ok(true);
            }
            current = self.get(current)?.parent;
        }
        Ok(false)
    }

    /// Append a new node as the last child of `parent`, deriving its depth
    pub(crate) fn attach(&mut self, parent: Nid, mut node: Node) -> Result<()> {
        node.parent = parent;
        node.depth = self.child_depth(parent)?;
        let id = node.id;
        self.children_mut(parent)?.push(id);
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Unlink `id` from its parent's child list, keeping its subtree in the arena
    fn unlink(&mut self, id: Nid) -> Result<Nid> {
        let parent = self.get(id)?.parent;
        self.children_mut(parent)?.retain(|child| *child != id);
        Ok(parent)
    }

    /// Remove one node and promote its children
    ///
    /// The children keep their order and become the last children of the
    /// removed node's parent. Returns the removed node and the promoted ids.
    pub(crate) fn remove_promoting(&mut self, id: Nid) -> Result<(Node, Vec<Nid>)> {
        let parent = self.unlink(id)?;
        let node = self.nodes.remove(&id).ok_or(ForestError::NotFound(id))?;

        for child in &node.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parent = parent;
            }
        }
        let promoted = node.children.clone();
        self.children_mut(parent)?.extend(promoted.iter().copied());

        Ok((node, promoted))
    }

    /// Remove a whole subtree, returning its nodes in breadth-first order
    pub(crate) fn remove_subtree(&mut self, id: Nid) -> Result<Vec<Node>> {
        self.unlink(id)?;
        let order = self.breadth_first_from(id)?;
        Ok(order
            .into_iter()
            .filter_map(|(nid, _)| self.nodes.remove(&nid))
            .collect())
    }

    /// Reattach the subtree rooted at `id` as the last child of `target`
    ///
    /// Rejects moves into the node itself or one of its descendants before
    /// anything changes.
    pub(crate) fn relocate(&mut self, id: Nid, target: Nid) -> Result<()> {
        if id.is_forest() {
            return Err(ForestError::NotFound(id));
        }
        self.get(id)?;
        if !target.is_forest() {
            self.get(target)?;
        }
        if self.is_within(target, id)? {
            return Err(ForestError::InvalidMove { node: id, target });
        }

        self.unlink(id)?;
        self.children_mut(target)?.push(id);
        self.get_mut(id)?.parent = target;
        Ok(())
    }

    /// Breadth-first order of a subtree with depth relative to its root
    pub fn breadth_first_from(&self, id: Nid) -> Result<Vec<(Nid, u32)>> {
        let starts: Vec<Nid> = if id.is_forest() {
            self.roots.clone()
        } else {
            self.get(id)?;
            vec![id]
        };

        let mut order = Vec::new();
        let mut queue: VecDeque<(Nid, u32)> = starts.into_iter().map(|n| (n, 0)).collect();
        while let Some((nid, depth)) = queue.pop_front() {
            order.push((nid, depth));
            let node = self.get(nid)?;
            queue.extend(node.children.iter().map(|&c| (c, depth + 1)));
        }
        Ok(order)
    }

    /// Depth-first, left-to-right order of the whole forest
    pub fn pre_order(&self) -> Vec<Nid> {
        self.pre_order_from(Nid::FOREST)
    }

    /// Depth-first, left-to-right order of the subtree rooted at `id`
    ///
    /// The forest root itself is never part of the result.
    pub fn pre_order_from(&self, id: Nid) -> Vec<Nid> {
        let mut order = Vec::new();
        let mut stack: Vec<Nid> = if id.is_forest() {
            self.roots.iter().rev().copied().collect()
        } else if self.contains(id) {
            vec![id]
        } else {
            Vec::new()
        };
        while let Some(nid) = stack.pop() {
            order.push(nid);
            if let Some(node) = self.nodes.get(&nid) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Recompute depth below `id` (inclusive), returning nodes whose depth changed
    pub(crate) fn recompute_depth(&mut self, id: Nid) -> Result<Vec<(Nid, u32)>> {
        let base = if id.is_forest() {
            0
        } else {
            self.child_depth(self.get(id)?.parent)?
        };

        let mut changed = Vec::new();
        for (nid, relative) in self.breadth_first_from(id)? {
            let depth = base + relative;
            let node = self.get_mut(nid)?;
            if node.depth != depth {
                node.depth = depth;
                changed.push((nid, depth));
            }
        }
        Ok(changed)
    }

    /// Visit nodes breadth-first from the forest root until `visit` breaks
    ///
    /// `visit` receives each node and its distance from the forest roots.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&Node, u32) -> ControlFlow<()>,
    {
        let mut queue: VecDeque<(Nid, u32)> = self.roots.iter().map(|&n| (n, 0)).collect();
        while let Some((nid, depth)) = queue.pop_front() {
            let Some(node) = self.nodes.get(&nid) else {
                continue;
            };
            if visit(node, depth).is_break() {
                return;
            }
            queue.extend(node.children.iter().map(|&c| (c, depth + 1)));
        }
    }

    /// Indented outline, one node per line
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(Nid, usize)> = self.roots.iter().rev().map(|&n| (n, 0)).collect();
        while let Some((nid, indent)) = stack.pop() {
            if let Some(node) = self.nodes.get(&nid) {
                out.push_str(&"  ".repeat(indent));
                out.push_str(&format!("{} {}\n", node.id, node.name()));
                stack.extend(node.children.iter().rev().map(|&c| (c, indent + 1)));
            }
        }
        out
    }
}
