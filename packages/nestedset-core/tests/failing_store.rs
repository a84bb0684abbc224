mod common;

use std::cell::Cell;

use common::food_store;
use nestedset_core::{
    DeleteMode, Error, Filter, MemoryCache, MemoryStore, NodeKey, OrderBy, RecordStore, Result, Row,
    TreeEngine,
};

/// Memory store that starts failing writes after a fixed number of updates.
struct FlakyStore {
    inner: MemoryStore,
    updates_left: Cell<usize>,
    fail_reads: bool,
    blind_filters: bool,
    lose_deletes: bool,
}

impl FlakyStore {
    fn new(inner: MemoryStore, updates: usize) -> Self {
        Self {
            inner,
            updates_left: Cell::new(updates),
            fail_reads: false,
            blind_filters: false,
            lose_deletes: false,
        }
    }
}

impl RecordStore for FlakyStore {
    type Record = Row;

    fn key_column(&self) -> &str {
        self.inner.key_column()
    }

    fn fetch_by_key(&self, key: NodeKey) -> Result<Option<Row>> {
        self.inner.fetch_by_key(key)
    }

    fn fetch_all(&self, filter: &[Filter], order: &[OrderBy]) -> Result<Vec<Row>> {
        if self.fail_reads {
            return Err(Error::Storage("connection reset".into()));
        }
        if self.blind_filters && !filter.is_empty() {
            return Ok(Vec::new());
        }
        self.inner.fetch_all(filter, order)
    }

    fn insert(&mut self, record: Row) -> Result<NodeKey> {
        self.inner.insert(record)
    }

    fn update(&mut self, changes: &Row, key: NodeKey) -> Result<bool> {
        let left = self.updates_left.get();
        if left == 0 {
            return Err(Error::Storage("disk full".into()));
        }
        self.updates_left.set(left - 1);
        self.inner.update(changes, key)
    }

    fn delete(&mut self, key: NodeKey) -> Result<bool> {
        if self.lose_deletes {
            return Ok(false);
        }
        self.inner.delete(key)
    }
}

fn engine(updates: usize) -> TreeEngine<FlakyStore, MemoryCache<Row>> {
    common::init_logging();
    let store = FlakyStore::new(food_store(), updates);
    let mut engine = TreeEngine::with_cache(store, MemoryCache::default());
    engine.set_traversal("parent_id").unwrap();
    engine
}

#[test]
fn storage_error_propagates_from_rebuild() {
    let mut engine = engine(3);
    engine.fetch_all(&[], &[]).unwrap();
    let err = engine.rebuild_tree_traversal().unwrap_err();
    assert!(matches!(err, Error::Storage(msg) if msg == "disk full"));
    assert!(engine.cache().is_empty());
}

#[test]
fn storage_error_propagates_from_insert_shift() {
    let mut engine = engine(12);
    engine.rebuild_tree_traversal().unwrap();
    let err = engine
        .insert(Row::new().with("name", "Lamb").with("parent_id", 8))
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    // The row itself was written before the shift failed.
    assert_eq!(engine.store().inner.len(), 13);
}

#[test]
fn read_failure_aborts_before_any_write() {
    let mut engine = engine(usize::MAX);
    engine.rebuild_tree_traversal().unwrap();
    engine.store_mut().fail_reads = true;
    assert!(matches!(engine.delete(9), Err(Error::Storage(_))));
    assert_eq!(engine.store().inner.len(), 12);
    assert!(matches!(engine.roots(), Err(Error::Storage(_))));
}

#[test]
fn vanished_target_is_reported_by_both_delete_modes() {
    let mut engine = engine(usize::MAX);
    engine.rebuild_tree_traversal().unwrap();
    engine.store_mut().lose_deletes = true;

    for mode in [DeleteMode::Cascade, DeleteMode::Promote] {
        let err = engine.delete_with(8, mode).unwrap_err();
        assert!(matches!(err, Error::InconsistentState(_)));
    }
    assert_eq!(engine.store().inner.len(), 12);
    engine.store_mut().lose_deletes = false;
    engine.validate_invariants().unwrap();
}

#[test]
fn cascade_delete_refuses_subtree_without_its_root() {
    let mut engine = engine(usize::MAX);
    engine.rebuild_tree_traversal().unwrap();
    engine.store_mut().blind_filters = true;

    let err = engine.delete(9).unwrap_err();
    assert!(matches!(err, Error::CorruptHierarchy(_)));
    assert_eq!(engine.store().inner.len(), 12);
    engine.store_mut().blind_filters = false;
    engine.validate_invariants().unwrap();
}
