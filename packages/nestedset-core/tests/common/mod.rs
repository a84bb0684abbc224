#![allow(dead_code)]

use std::collections::BTreeMap;

use nestedset_core::{MemoryStore, NodeKey, RecordStore, Row, TreeEngine};

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

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn food_row(id: NodeKey, name: &str, parent: Option<NodeKey>) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("parent_id", parent)
}

pub fn food_store() -> MemoryStore {
    let mut store = MemoryStore::new("id");
    for &(id, name, parent) in FOOD {
        store.insert(food_row(id, name, parent)).unwrap();
    }
    store
}

/// Food rows without boundaries, traversal configured on `parent_id`.
pub fn food_engine(order: Option<&str>) -> TreeEngine<MemoryStore> {
    init_logging();
    let mut engine = TreeEngine::new(food_store());
    match order {
        Some(column) => engine
            .set_traversal([("refColumn", "parent_id"), ("order", column)])
            .unwrap(),
        None => engine.set_traversal("parent_id").unwrap(),
    };
    engine
}

pub fn bounds_by_name<S>(engine: &TreeEngine<S>) -> BTreeMap<String, (i64, i64)>
where
    S: RecordStore<Record = Row>,
{
    engine
        .store()
        .fetch_all(&[], &[])
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.text("name").unwrap().to_string(),
                (row.integer("lft").unwrap(), row.integer("rgt").unwrap()),
            )
        })
        .collect()
}

pub fn expected(table: &[(&str, i64, i64)]) -> BTreeMap<String, (i64, i64)> {
    table
        .iter()
        .map(|&(name, l, r)| (name.to_string(), (l, r)))
        .collect()
}

pub fn key_of_name<S>(engine: &TreeEngine<S>, name: &str) -> NodeKey
where
    S: RecordStore<Record = Row>,
{
    engine
        .store()
        .fetch_all(&[nestedset_core::Filter::eq("name", name)], &[])
        .unwrap()
        .first()
        .and_then(|row| row.integer("id"))
        .unwrap()
}
