//! Backend-agnostic conformance checks for nested-set record stores.
//!
//! Every check takes a factory returning an empty store over a table with the columns
//! `id` (key), `parent_id`, `name`, `lft` and `rgt`. Checks panic on the first mismatch.

use std::collections::BTreeMap;

use nestedset_core::{
    DeleteMode, Error, Filter, NodeKey, RecordStore, Row, TraversalSpec, TreeEngine,
};

/// `(id, name, parent_id)` rows of the food hierarchy.
pub const FOOD: &[(NodeKey, &str, Option<NodeKey>)] = &[
    (1, "Food", None),
    (2, "Fruit", Some(1)),
    (3, "Red", Some(2)),
    (4, "Yellow", Some(2)),
    (5, "Green", Some(2)),
    (6, "Cherry", Some(3)),
    (7, "Banana", Some(4)),
    (8, "Meat", Some(1)),
    (9, "Beef", Some(8)),
    (10, "Pork", Some(8)),
    (11, "Vegetable", Some(1)),
    (12, "Carrot", Some(11)),
];

/// Boundaries when siblings follow key order.
pub const FOOD_BY_ID: &[(&str, i64, i64)] = &[
    ("Food", 1, 24),
    ("Fruit", 2, 13),
    ("Red", 3, 6),
    ("Cherry", 4, 5),
    ("Yellow", 7, 10),
    ("Banana", 8, 9),
    ("Green", 11, 12),
    ("Meat", 14, 19),
    ("Beef", 15, 16),
    ("Pork", 17, 18),
    ("Vegetable", 20, 23),
    ("Carrot", 21, 22),
];

/// Boundaries when siblings follow the `name` column.
pub const FOOD_BY_NAME: &[(&str, i64, i64)] = &[
    ("Food", 1, 24),
    ("Fruit", 2, 13),
    ("Green", 3, 4),
    ("Red", 5, 8),
    ("Cherry", 6, 7),
    ("Yellow", 9, 12),
    ("Banana", 10, 11),
    ("Meat", 14, 19),
    ("Beef", 15, 16),
    ("Pork", 17, 18),
    ("Vegetable", 20, 23),
    ("Carrot", 21, 22),
];

pub fn by_id() -> TraversalSpec {
    TraversalSpec::from("parent_id")
}

pub fn by_name() -> TraversalSpec {
    TraversalSpec::from([("refColumn", "parent_id"), ("order", "name")])
}

pub fn expected(table: &[(&str, i64, i64)]) -> BTreeMap<String, (i64, i64)> {
    table
        .iter()
        .map(|&(name, l, r)| (name.to_string(), (l, r)))
        .collect()
}

/// Write the food rows with explicit keys and no boundaries.
pub fn load_food<S: RecordStore<Record = Row>>(store: &mut S) {
    for &(id, name, parent) in FOOD {
        let row = Row::new()
            .with("id", id)
            .with("name", name)
            .with("parent_id", parent);
        store.insert(row).unwrap();
    }
}

pub fn bounds_by_name<S: RecordStore<Record = Row>>(store: &S) -> BTreeMap<String, (i64, i64)> {
    store
        .fetch_all(&[], &[])
        .unwrap()
        .iter()
        .map(|row| {
            let name = row.text("name").unwrap().to_string();
            (name, (row.integer("lft").unwrap(), row.integer("rgt").unwrap()))
        })
        .collect()
}

pub fn key_of<S: RecordStore<Record = Row>>(store: &S, name: &str) -> NodeKey {
    store
        .fetch_all(&[Filter::eq("name", name)], &[])
        .unwrap()
        .first()
        .and_then(|row| row.integer("id"))
        .unwrap()
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.text("name").map(str::to_string))
        .collect()
}

fn food_engine<S, F>(new_store: &F, spec: TraversalSpec) -> TreeEngine<S>
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    let mut store = new_store();
    load_food(&mut store);
    let mut engine = TreeEngine::new(store);
    engine.set_traversal(spec).unwrap();
    engine
}

pub fn rebuild_matches_food_tables<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    let mut engine = food_engine(&new_store, by_id());
    assert_eq!(engine.rebuild_tree_traversal().unwrap(), FOOD.len());
    assert_eq!(bounds_by_name(engine.store()), expected(FOOD_BY_ID));

    engine.set_traversal(by_name()).unwrap();
    engine.rebuild_tree_traversal().unwrap();
    assert_eq!(bounds_by_name(engine.store()), expected(FOOD_BY_NAME));
    assert_eq!(engine.rebuild_tree_traversal().unwrap(), 0);
    engine.validate_invariants().unwrap();
}

pub fn inserts_match_rebuild<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    for (spec, table) in [(by_id(), FOOD_BY_ID), (by_name(), FOOD_BY_NAME)] {
        let mut engine = TreeEngine::new(new_store());
        engine.set_traversal(spec).unwrap();
        for &(_, name, parent) in FOOD {
            let row = Row::new().with("name", name).with("parent_id", parent);
            engine.insert(row).unwrap();
        }
        assert_eq!(bounds_by_name(engine.store()), expected(table));
        assert_eq!(engine.rebuild_tree_traversal().unwrap(), 0);
    }
}

pub fn cascade_delete_and_reinsert<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    let mut engine = food_engine(&new_store, by_name());
    engine.rebuild_tree_traversal().unwrap();

    assert_eq!(engine.delete(key_of(engine.store(), "Beef")).unwrap(), 1);
    let table = bounds_by_name(engine.store());
    assert_eq!(table["Meat"], (14, 17));
    assert_eq!(table["Pork"], (15, 16));
    assert_eq!(table["Food"], (1, 22));
    assert_eq!(table["Vegetable"], (18, 21));
    assert_eq!(table["Fruit"], (2, 13));

    assert_eq!(engine.delete(key_of(engine.store(), "Meat")).unwrap(), 2);
    let table = bounds_by_name(engine.store());
    assert_eq!(table["Food"], (1, 18));
    assert_eq!(table["Vegetable"], (14, 17));

    assert_eq!(engine.delete(404).unwrap(), 0);

    let meat = engine
        .insert(Row::new().with("name", "Meat").with("parent_id", 1))
        .unwrap();
    for name in ["Pork", "Beef"] {
        let row = Row::new().with("name", name).with("parent_id", meat);
        engine.insert(row).unwrap();
    }
    assert_eq!(bounds_by_name(engine.store()), expected(FOOD_BY_NAME));
    engine.validate_invariants().unwrap();
}

pub fn promote_delete_reparents<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    let mut engine = food_engine(&new_store, by_name());
    engine.rebuild_tree_traversal().unwrap();

    let fruit = key_of(engine.store(), "Fruit");
    assert_eq!(engine.delete_with(fruit, DeleteMode::Promote).unwrap(), 1);
    let table = bounds_by_name(engine.store());
    assert_eq!(table["Food"], (1, 22));
    assert_eq!(table["Green"], (2, 3));
    assert_eq!(table["Red"], (4, 7));
    assert_eq!(table["Yellow"], (8, 11));
    assert_eq!(table["Meat"], (12, 17));
    assert_eq!(
        names(&engine.children(1).unwrap()),
        ["Green", "Red", "Yellow", "Meat", "Vegetable"]
    );
    engine.validate_invariants().unwrap();
}

pub fn reads_follow_nested_order<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    let mut engine = food_engine(&new_store, by_name());
    engine.rebuild_tree_traversal().unwrap();

    assert_eq!(names(&engine.roots().unwrap()), ["Food"]);
    assert_eq!(
        names(&engine.children(2).unwrap()),
        ["Green", "Red", "Yellow"]
    );
    assert_eq!(
        names(&engine.descendants(2).unwrap()),
        ["Green", "Red", "Cherry", "Yellow", "Banana"]
    );
    assert_eq!(names(&engine.ancestors(7).unwrap()), ["Food", "Fruit", "Yellow"]);
    assert!(engine.ancestors(1).unwrap().is_empty());
}

pub fn structural_errors_are_reported<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    let mut engine = food_engine(&new_store, by_id());
    assert!(matches!(
        engine.insert(Row::new().with("name", "Lamb").with("parent_id", 8)),
        Err(Error::CorruptHierarchy(_))
    ));

    engine.rebuild_tree_traversal().unwrap();
    let before = bounds_by_name(engine.store());
    assert!(matches!(
        engine.insert(Row::new().with("name", "Ghost").with("parent_id", 99)),
        Err(Error::ParentNotFound(99))
    ));
    assert_eq!(bounds_by_name(engine.store()), before);

    engine
        .store_mut()
        .update(&Row::new().with("parent_id", 12), 11)
        .unwrap();
    assert!(matches!(
        engine.rebuild_tree_traversal(),
        Err(Error::CorruptHierarchy(_))
    ));
    assert_eq!(bounds_by_name(engine.store()), before);
}

pub fn run_all<S, F>(new_store: F)
where
    S: RecordStore<Record = Row>,
    F: Fn() -> S,
{
    rebuild_matches_food_tables(&new_store);
    inserts_match_rebuild(&new_store);
    cascade_delete_and_reinsert(&new_store);
    promote_delete_reparents(&new_store);
    reads_follow_nested_order(&new_store);
    structural_errors_are_reported(&new_store);
}
