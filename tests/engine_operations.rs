//! End-to-end tests for structural operations against a database file
//!
//! Every test reopens the file to check that storage agrees with memory.

use forest_rs::{
    byte_key, case_folded_key, Entry, EntryPatch, ForestBuilder, ForestError, Nid, TreeEngine,
};
use serde_json::json;
use std::path::Path;
use tempfile::tempdir;

fn open(path: &Path) -> TreeEngine {
    ForestBuilder::new().path(path).build().unwrap()
}

fn child_names(engine: &TreeEngine, parent: Nid) -> Vec<String> {
    engine
        .children_of(parent)
        .unwrap()
        .iter()
        .map(|id| engine.find_by_id(*id).unwrap().name().to_string())
        .collect()
}

#[test]
fn test_ids_on_fresh_store() {
    let dir = tempdir().unwrap();
    let mut forest = open(&dir.path().join("tree.db"));

    let a = forest.create_child(Nid::FOREST, Entry::new("A")).unwrap();
    let b = forest.create_child(a, Entry::new("B")).unwrap();
    assert_eq!(a, Nid::new(1));
    assert_eq!(b, Nid::new(2));
    assert_eq!(forest.to_string(), "Nid: 0,1,2\n1 A\n  2 B\n");
}

#[test]
fn test_remove_node_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let (a, c) = {
        let mut forest = open(&path);
        let a = forest.create_child(Nid::FOREST, Entry::new("A")).unwrap();
        let b = forest.create_child(a, Entry::new("B")).unwrap();
        let c = forest.create_child(b, Entry::new("C")).unwrap();
        forest.remove_node(b).unwrap();
        (a, c)
    };

    let mut forest = open(&path);
    assert_eq!(forest.children_of(a).unwrap(), &[c]);
    assert_eq!(forest.depth_of(c).unwrap(), 1);
    assert_eq!(forest.row_of(c).unwrap().depth, Some(1));

    // id 2 was released and is issued again
    assert_eq!(forest.create_child(a, Entry::new("D")).unwrap(), Nid::new(2));
}

#[test]
fn test_remove_branch_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    {
        let mut forest = open(&path);
        let a = forest.create_child(Nid::FOREST, Entry::new("A")).unwrap();
        let b = forest.create_child(a, Entry::new("B")).unwrap();
        forest.create_child(b, Entry::new("C")).unwrap();
        forest.create_child(Nid::FOREST, Entry::new("D")).unwrap();
        assert_eq!(forest.remove_branch(a).unwrap().len(), 3);
    }

    let forest = open(&path);
    assert_eq!(forest.len(), 1);
    assert_eq!(child_names(&forest, Nid::FOREST), vec!["D"]);
    assert_eq!(forest.export_rows().unwrap().len(), 1);
}

#[test]
fn test_move_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    {
        let mut forest = open(&path);
        let a = forest.create_child(Nid::FOREST, Entry::new("A")).unwrap();
        let b = forest.create_child(a, Entry::new("B")).unwrap();
        let c = forest.create_child(a, Entry::new("C")).unwrap();
        forest.create_child(b, Entry::new("B1")).unwrap();
        forest.move_node(b, c).unwrap();
        forest.move_node(c, Nid::FOREST).unwrap();
    }

    let forest = open(&path);
    assert_eq!(child_names(&forest, Nid::FOREST), vec!["A", "C"]);
    let c = forest.roots()[1];
    assert_eq!(child_names(&forest, c), vec!["B"]);
    let b = forest.children_of(c).unwrap()[0];
    assert_eq!(forest.depth_of(b).unwrap(), 1);
    assert_eq!(forest.row_of(b).unwrap().depth, Some(1));
    assert_eq!(forest.ancestors_of(forest.children_of(b).unwrap()[0]).unwrap(), vec![c, b]);
}

#[test]
fn test_move_into_own_subtree_changes_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let mut forest = open(&path);
    let a = forest.create_child(Nid::FOREST, Entry::new("A")).unwrap();
    let b = forest.create_child(a, Entry::new("B")).unwrap();
    let bytes_before = std::fs::read(&path).unwrap();

    let err = forest.move_node(a, b).unwrap_err();
    assert!(matches!(err, ForestError::InvalidMove { .. }));
    assert!(!err.requires_reload());
    assert_eq!(std::fs::read(&path).unwrap(), bytes_before);
    assert_eq!(forest.parent_of(b).unwrap(), a);
}

#[test]
fn test_sort_examples() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let mut forest = open(&path);
    let root = forest.create_child(Nid::FOREST, Entry::new("root")).unwrap();
    for name in ["banana", "apple", "Banana"] {
        forest.create_child(root, Entry::new(name)).unwrap();
    }

    forest.sort_branch(root, byte_key).unwrap();
    assert_eq!(child_names(&forest, root), vec!["Banana", "apple", "banana"]);

    forest.sort_branch(root, case_folded_key).unwrap();
    assert_eq!(child_names(&forest, root), vec!["apple", "Banana", "banana"]);

    drop(forest);
    let forest = open(&path);
    assert_eq!(child_names(&forest, root), vec!["apple", "Banana", "banana"]);
}

#[test]
fn test_sort_with_custom_key() {
    let dir = tempdir().unwrap();
    let mut forest = open(&dir.path().join("tree.db"));
    let root = forest.create_child(Nid::FOREST, Entry::new("root")).unwrap();
    for name in ["zeta", "alpha", "mid"] {
        forest.create_child(root, Entry::new(name)).unwrap();
    }

    // longest name first
    forest
        .sort_branch(root, |name: &str| vec![usize::MAX - name.len()])
        .unwrap();
    assert_eq!(child_names(&forest, root), vec!["alpha", "zeta", "mid"]);
}

#[test]
fn test_attribute_updates_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let id = {
        let mut forest = open(&path);
        let id = forest
            .create_child(Nid::FOREST, Entry::new("draft").with_note("notes/draft.md"))
            .unwrap();
        forest.rename(id, "final").unwrap();
        forest
            .update_attributes(id, EntryPatch::new().kind(Some("doc".into())))
            .unwrap();

        let mut field = forest_rs::FieldMap::new();
        field.insert("words".into(), json!(1200));
        assert!(forest.update_field(id, field).unwrap());
        id
    };

    let mut forest = open(&path);
    let entry = &forest.find_by_id(id).unwrap().entry;
    assert_eq!(entry.name, "final");
    assert_eq!(entry.kind.as_deref(), Some("doc"));
    assert_eq!(entry.note.as_deref(), Some("notes/draft.md"));
    assert_eq!(entry.field.get("words"), Some(&json!(1200)));

    forest.clear_note(id).unwrap();
    drop(forest);
    let forest = open(&path);
    assert_eq!(forest.find_by_id(id).unwrap().entry.note, None);
    assert_eq!(forest.find_by_id(id).unwrap().name(), "final");
}

#[test]
fn test_operations_on_unknown_ids() {
    let dir = tempdir().unwrap();
    let mut forest = open(&dir.path().join("tree.db"));
    let missing = Nid::new(404);

    assert!(matches!(forest.remove_node(missing), Err(ForestError::NotFound(_))));
    assert!(matches!(forest.remove_branch(missing), Err(ForestError::NotFound(_))));
    assert!(matches!(forest.remove_node(Nid::FOREST), Err(ForestError::NotFound(_))));
    assert!(matches!(forest.rename(missing, "x"), Err(ForestError::NotFound(_))));
    assert!(matches!(forest.clear_note(missing), Err(ForestError::NotFound(_))));
    assert!(matches!(forest.find_by_id(missing), Err(ForestError::NotFound(_))));
    assert!(forest.is_empty());
}

#[test]
fn test_reload_discards_nothing_committed() {
    let dir = tempdir().unwrap();
    let mut forest = open(&dir.path().join("tree.db"));
    let a = forest.create_child(Nid::FOREST, Entry::new("A")).unwrap();
    forest.create_child(a, Entry::new("B")).unwrap();
    let outline = forest.forest().outline();

    forest.reload().unwrap();
    assert_eq!(forest.forest().outline(), outline);
    assert_eq!(forest.active_root(), Nid::FOREST);
}

#[test]
fn test_export_and_import_between_files() {
    let dir = tempdir().unwrap();
    let mut source = open(&dir.path().join("a.db"));
    let a = source.create_child(Nid::FOREST, Entry::new("A")).unwrap();
    source.create_child(a, Entry::new("B")).unwrap();
    let rows = source.export_rows().unwrap();

    let mut target = open(&dir.path().join("b.db"));
    let roots = target.import_rows(&rows).unwrap();
    assert_eq!(roots, vec![a]);
    drop(target);

    let target = open(&dir.path().join("b.db"));
    assert_eq!(target.forest().outline(), "1 A\n  2 B\n");
}
