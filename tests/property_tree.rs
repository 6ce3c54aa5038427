//! Property-based tests for forest structure
//!
//! Random edit scripts are applied to an in-memory engine; after every step
//! depth must equal the ancestor count and rows must rebuild the same forest.

use forest_rs::{EngineConfig, Entry, Forest, ForestError, Nid, TreeEngine};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Edit {
    Create(usize),
    Sibling(usize),
    RemoveNode(usize),
    RemoveBranch(usize),
    Move(usize, usize),
}

fn edits() -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(
        prop_oneof![
            4 => any::<usize>().prop_map(Edit::Create),
            2 => any::<usize>().prop_map(Edit::Sibling),
            1 => any::<usize>().prop_map(Edit::RemoveNode),
            1 => any::<usize>().prop_map(Edit::RemoveBranch),
            2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Edit::Move(a, b)),
        ],
        1..60,
    )
}

/// Pick a live id, or the forest root when `allow_forest` and the pick lands on it
fn pick(engine: &TreeEngine, n: usize, allow_forest: bool) -> Option<Nid> {
    let mut ids = engine.forest().pre_order();
    if allow_forest {
        ids.push(Nid::FOREST);
    }
    if ids.is_empty() {
        return None;
    }
    Some(ids[n % ids.len()])
}

fn apply(engine: &mut TreeEngine, edit: &Edit) -> Result<(), ForestError> {
    match *edit {
        Edit::Create(p) => {
            let parent = pick(engine, p, true).unwrap_or(Nid::FOREST);
            engine.create_child(parent, Entry::new(format!("n{}", p % 97)))?;
        }
        Edit::Sibling(p) => {
            if let Some(node) = pick(engine, p, false) {
                engine.create_sibling(node, Entry::new(format!("s{}", p % 89)))?;
            }
        }
        Edit::RemoveNode(p) => {
            if let Some(node) = pick(engine, p, false) {
                engine.remove_node(node)?;
            }
        }
        Edit::RemoveBranch(p) => {
            if let Some(node) = pick(engine, p, false) {
                engine.remove_branch(node)?;
            }
        }
        Edit::Move(a, b) => {
            if let (Some(node), Some(target)) = (pick(engine, a, false), pick(engine, b, true)) {
                match engine.move_node(node, target) {
                    Err(ForestError::InvalidMove { .. }) => {}
                    other => other?,
                }
            }
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_depth_matches_ancestors(script in edits()) {
        let mut engine = TreeEngine::in_memory(EngineConfig::default()).unwrap();
        for edit in &script {
            apply(&mut engine, edit).unwrap();

            for nid in engine.forest().pre_order() {
                prop_assert!(!nid.is_forest());
                let ancestors = engine.ancestors_of(nid).unwrap();
                prop_assert_eq!(engine.depth_of(nid).unwrap() as usize, ancestors.len());
            }
        }
    }

    #[test]
    fn prop_rows_rebuild_same_forest(script in edits()) {
        let mut engine = TreeEngine::in_memory(EngineConfig::default()).unwrap();
        for edit in &script {
            apply(&mut engine, edit).unwrap();
        }

        let rows = engine.store().rows_in_sequence().unwrap();
        prop_assert_eq!(rows.len(), engine.len());
        for row in &rows {
            let node = engine.find_by_id(row.id).unwrap();
            prop_assert_eq!(row.parent(), node.parent);
            prop_assert_eq!(row.depth, Some(node.depth));
        }

        let rebuilt = Forest::from_rows(&rows).unwrap();
        prop_assert_eq!(rebuilt.outline(), engine.forest().outline());
    }

    #[test]
    fn prop_ids_unique_and_registered(script in edits()) {
        let mut engine = TreeEngine::in_memory(EngineConfig::default()).unwrap();
        for edit in &script {
            apply(&mut engine, edit).unwrap();
        }

        let mut ids = engine.forest().pre_order();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);

        let registered: Vec<Nid> = engine.nids().registered().filter(|n| !n.is_forest()).collect();
        prop_assert_eq!(registered, ids);
    }
}
