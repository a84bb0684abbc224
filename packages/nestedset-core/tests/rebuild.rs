mod common;

use common::{bounds_by_name, expected, food_engine, food_row, FOOD_BY_ID, FOOD_BY_NAME};
use nestedset_core::{Error, MemoryStore, RecordStore, Row, TreeEngine};

fn engine_with(rows: Vec<Row>) -> TreeEngine<MemoryStore> {
    common::init_logging();
    let mut store = MemoryStore::new("id");
    for row in rows {
        store.insert(row).unwrap();
    }
    let mut engine = TreeEngine::new(store);
    engine.set_traversal("parent_id").unwrap();
    engine
}

#[test]
fn rebuild_in_key_order() {
    let mut engine = food_engine(None);
    assert_eq!(engine.rebuild_tree_traversal().unwrap(), 12);
    assert_eq!(bounds_by_name(&engine), expected(FOOD_BY_ID));
    engine.validate_invariants().unwrap();
}

#[test]
fn rebuild_in_name_order() {
    let mut engine = food_engine(Some("name"));
    engine.rebuild_tree_traversal().unwrap();
    assert_eq!(bounds_by_name(&engine), expected(FOOD_BY_NAME));
    engine.validate_invariants().unwrap();
}

#[test]
fn rebuild_is_idempotent() {
    let mut engine = food_engine(Some("name"));
    engine.rebuild_tree_traversal().unwrap();
    let first = bounds_by_name(&engine);
    assert_eq!(engine.rebuild_tree_traversal().unwrap(), 0);
    assert_eq!(bounds_by_name(&engine), first);
}

#[test]
fn changing_order_relabels_only_moved_nodes() {
    let mut engine = food_engine(None);
    engine.rebuild_tree_traversal().unwrap();
    engine
        .set_traversal([("refColumn", "parent_id"), ("order", "name")])
        .unwrap();
    // Only the Fruit subtree reorders: Red, Cherry, Yellow, Banana, Green.
    assert_eq!(engine.rebuild_tree_traversal().unwrap(), 5);
    assert_eq!(bounds_by_name(&engine), expected(FOOD_BY_NAME));
}

#[test]
fn rebuild_overwrites_stale_boundaries() {
    let mut engine = food_engine(None);
    engine
        .store_mut()
        .update(&Row::new().with("lft", 100).with("rgt", 3), 5)
        .unwrap();
    engine.rebuild_tree_traversal().unwrap();
    assert_eq!(bounds_by_name(&engine), expected(FOOD_BY_ID));
}

#[test]
fn empty_table_rebuilds_to_nothing() {
    let mut engine = engine_with(Vec::new());
    assert_eq!(engine.rebuild_tree_traversal().unwrap(), 0);
    engine.validate_invariants().unwrap();
}

#[test]
fn single_root_is_one_two() {
    let mut engine = engine_with(vec![food_row(1, "Only", None)]);
    engine.rebuild_tree_traversal().unwrap();
    let row = engine.fetch(1).unwrap().unwrap();
    assert_eq!((row.integer("lft"), row.integer("rgt")), (Some(1), Some(2)));
}

#[test]
fn forest_roots_are_numbered_in_sequence() {
    let mut engine = engine_with(vec![
        food_row(1, "A", None),
        food_row(2, "B", None),
        food_row(3, "A1", Some(1)),
    ]);
    engine.rebuild_tree_traversal().unwrap();
    let table = bounds_by_name(&engine);
    assert_eq!(table["A"], (1, 4));
    assert_eq!(table["A1"], (2, 3));
    assert_eq!(table["B"], (5, 6));
}

#[test]
fn cycle_is_corrupt_and_nothing_is_written() {
    let mut engine = engine_with(vec![
        food_row(1, "Root", None),
        food_row(2, "X", Some(3)),
        food_row(3, "Y", Some(2)),
    ]);
    let err = engine.rebuild_tree_traversal().unwrap_err();
    assert!(matches!(err, Error::CorruptHierarchy(msg) if msg.contains('2') && msg.contains('3')));
    let untouched = engine.store().fetch_all(&[], &[]).unwrap();
    assert!(untouched.iter().all(|row| row.integer("lft").is_none()));
}

#[test]
fn self_parent_is_corrupt() {
    let mut engine = engine_with(vec![food_row(1, "Root", None), food_row(2, "Loop", Some(2))]);
    assert!(matches!(
        engine.rebuild_tree_traversal(),
        Err(Error::CorruptHierarchy(_))
    ));
}

#[test]
fn dangling_parent_is_corrupt() {
    let mut engine = engine_with(vec![food_row(1, "Root", None), food_row(2, "Lost", Some(9))]);
    assert!(matches!(
        engine.rebuild_tree_traversal(),
        Err(Error::CorruptHierarchy(_))
    ));
}

#[test]
fn non_integer_parent_is_invalid_record() {
    let mut engine = engine_with(vec![
        food_row(1, "Root", None),
        Row::new().with("name", "Odd").with("parent_id", "root"),
    ]);
    assert!(matches!(
        engine.rebuild_tree_traversal(),
        Err(Error::InvalidRecord(_))
    ));
}
