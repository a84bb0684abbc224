use std::cmp::Ordering;
use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::config::EngineOptions;
use crate::error::{Error, Result};
use crate::ids::{Bounds, NodeKey};
use crate::nested::{self, cmp_siblings, NodeEntry};
use crate::record::{Row, TreeColumns, TreeRecord, Value};
use crate::traits::{Filter, NoCache, OrderBy, QueryCache, RecordStore};
use crate::traversal::{Traversal, TraversalSpec};

/// What happens to the descendants of a deleted node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Remove the node together with its whole subtree.
    #[default]
    Cascade,
    /// Remove only the node; its children move up to its parent.
    Promote,
}

fn project<R: TreeRecord>(columns: &TreeColumns, record: &R) -> Result<NodeEntry> {
    Ok(NodeEntry {
        key: key_of(columns, record)?,
        parent: record.parent_id(columns)?,
        sort: record.sort_value(columns),
        bounds: record.bounds(columns)?,
    })
}

fn key_of<R: TreeRecord>(columns: &TreeColumns, record: &R) -> Result<NodeKey> {
    record
        .node_id(columns)?
        .ok_or_else(|| Error::InvalidRecord(format!("row without `{}`", columns.key)))
}

fn stores_integer_bounds<R: TreeRecord>(columns: &TreeColumns, record: &R) -> bool {
    [&columns.left, &columns.right]
        .iter()
        .all(|column| matches!(record.value(column), Some(Value::Integer(_))))
}

fn bounds_of<R: TreeRecord>(columns: &TreeColumns, record: &R) -> Result<Bounds> {
    record.bounds(columns)?.ok_or_else(|| {
        let key = record.node_id(columns).ok().flatten();
        Error::CorruptHierarchy(format!(
            "node {key:?} has no nested-set boundaries; rebuild the tree first"
        ))
    })
}

/// Nested-set maintainer over a record store.
///
/// The engine starts unconfigured: plain reads and pass-through store access work, tree
/// operations fail with [`Error::NotTraversable`] until [`TreeEngine::set_traversal`] names
/// the parent column. Every mutating tree operation flushes the cache before returning.
///
/// Operations are sequences of independent store calls. Wrap them in a store-level
/// transaction when partial application must not be observed.
#[derive(Debug)]
pub struct TreeEngine<S, C = NoCache>
where
    S: RecordStore,
    C: QueryCache<S::Record>,
{
    store: S,
    cache: C,
    options: EngineOptions,
    traversal: Option<Traversal>,
}

impl<S: RecordStore> TreeEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, NoCache, EngineOptions::default())
    }
}

impl<S, C> TreeEngine<S, C>
where
    S: RecordStore,
    C: QueryCache<S::Record>,
{
    pub fn with_cache(store: S, cache: C) -> Self {
        Self::with_options(store, cache, EngineOptions::default())
    }

    pub fn with_options(store: S, cache: C, options: EngineOptions) -> Self {
        Self {
            store,
            cache,
            options,
            traversal: None,
        }
    }

    /// Declare the parent column and sibling order. An empty configuration clears the traversal.
    pub fn set_traversal(&mut self, spec: impl Into<TraversalSpec>) -> Result<&mut Self> {
        let traversal = spec.into().resolve()?;
        match &traversal {
            Some(t) => debug!(
                "traversal set: parent column `{}`, order {:?}",
                t.ref_column, t.order_column
            ),
            None => debug!("traversal cleared"),
        }
        self.traversal = traversal;
        Ok(self)
    }

    pub fn is_traversable(&self) -> bool {
        self.traversal.is_some()
    }

    pub fn traversal(&self) -> Option<&Traversal> {
        self.traversal.as_ref()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Column names in effect, or [`Error::NotTraversable`] while unconfigured.
    pub fn columns(&self) -> Result<TreeColumns> {
        let traversal = self.traversal.as_ref().ok_or(Error::NotTraversable)?;
        Ok(TreeColumns {
            key: self.store.key_column().to_string(),
            parent: traversal.ref_column.clone(),
            left: self.options.left_column.clone(),
            right: self.options.right_column.clone(),
            order: traversal.order_column.clone(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable pass-through access. The cache is flushed since the caller may write.
    pub fn store_mut(&mut self) -> &mut S {
        self.cache.flush();
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn clean_cache(&self) {
        self.cache.flush();
    }

    /// Plain fetch by key; legal while unconfigured.
    pub fn fetch(&self, key: NodeKey) -> Result<Option<S::Record>> {
        let rows = self.cached(format!("fetchRow:{key}"), || {
            Ok(self.store.fetch_by_key(key)?.into_iter().collect())
        })?;
        Ok(rows.into_iter().next())
    }

    /// Plain filtered fetch; legal while unconfigured.
    pub fn fetch_all(&self, filter: &[Filter], order: &[OrderBy]) -> Result<Vec<S::Record>> {
        self.cached(format!("fetchAll:{filter:?}:{order:?}"), || {
            self.store.fetch_all(filter, order)
        })
    }

    fn cached(
        &self,
        key: String,
        load: impl FnOnce() -> Result<Vec<S::Record>>,
    ) -> Result<Vec<S::Record>> {
        if !self.options.use_cache {
            return load();
        }
        if let Some(rows) = self.cache.get(&key) {
            trace!("cache hit for {key}");
            return Ok(rows);
        }
        let rows = load()?;
        self.cache.put(key, rows.clone());
        Ok(rows)
    }

    /// Root nodes in nested-set order.
    pub fn roots(&self) -> Result<Vec<S::Record>> {
        let cols = self.columns()?;
        self.fetch_all(&[Filter::is_null(&cols.parent)], &[OrderBy::asc(&cols.left)])
    }

    /// Direct children of `key` in nested-set order.
    pub fn children(&self, key: NodeKey) -> Result<Vec<S::Record>> {
        let cols = self.columns()?;
        self.fetch_all(&[Filter::eq(&cols.parent, key)], &[OrderBy::asc(&cols.left)])
    }

    /// Every node strictly inside `key`'s interval, in preorder. Empty for a missing key.
    pub fn descendants(&self, key: NodeKey) -> Result<Vec<S::Record>> {
        let cols = self.columns()?;
        let Some(target) = self.store.fetch_by_key(key)? else {
            return Ok(Vec::new());
        };
        let bounds = bounds_of(&cols, &target)?;
        self.fetch_all(
            &[
                Filter::gt(&cols.left, bounds.left),
                Filter::lt(&cols.right, bounds.right),
            ],
            &[OrderBy::asc(&cols.left)],
        )
    }

    /// Every node whose interval encloses `key`'s, outermost first. Empty for a missing key.
    pub fn ancestors(&self, key: NodeKey) -> Result<Vec<S::Record>> {
        let cols = self.columns()?;
        let Some(target) = self.store.fetch_by_key(key)? else {
            return Ok(Vec::new());
        };
        let bounds = bounds_of(&cols, &target)?;
        self.fetch_all(
            &[
                Filter::lt(&cols.left, bounds.left),
                Filter::gt(&cols.right, bounds.right),
            ],
            &[OrderBy::asc(&cols.left)],
        )
    }

    /// Recompute every boundary from parent pointers, starting at 1.
    ///
    /// Nothing is written when the hierarchy is corrupt. Returns how many rows changed.
    pub fn rebuild_tree_traversal(&mut self) -> Result<usize> {
        let cols = self.columns()?;
        let result = self.rebuild(&cols);
        self.cache.flush();
        result
    }

    fn rebuild(&mut self, cols: &TreeColumns) -> Result<usize> {
        let rows = self.store.fetch_all(&[], &cols.sibling_order())?;
        let entries = rows
            .iter()
            .map(|row| project(cols, row))
            .collect::<Result<Vec<_>>>()?;
        let assigned = nested::assign_bounds(&entries).map_err(|e| {
            warn!("rebuild aborted: {e}");
            e
        })?;

        // Bounds that only parse as integers (text, reals) are rewritten as integers.
        let current: HashMap<NodeKey, Option<Bounds>> = entries
            .iter()
            .zip(&rows)
            .map(|(e, row)| (e.key, e.bounds.filter(|_| stores_integer_bounds(cols, row))))
            .collect();
        let mut updated = 0;
        for (key, bounds) in assigned {
            if current.get(&key).copied().flatten() == Some(bounds) {
                continue;
            }
            self.store.update(&cols.bounds_changes(bounds), key)?;
            updated += 1;
        }
        debug!(
            "rebuilt nested set over {} nodes, {updated} updated",
            entries.len()
        );
        Ok(updated)
    }

    /// Insert a node at its sibling position and make room for it.
    ///
    /// The position follows the sibling order (order column, then key); a node that sorts
    /// last becomes the last child of its parent, or the last root.
    pub fn insert(&mut self, record: S::Record) -> Result<NodeKey> {
        let cols = self.columns()?;
        let result = self.insert_node(&cols, record);
        self.cache.flush();
        result
    }

    fn insert_node(&mut self, cols: &TreeColumns, mut record: S::Record) -> Result<NodeKey> {
        let parent = record.parent_id(cols)?;
        let own_key = record.node_id(cols)?;
        let own_sort = record.sort_value(cols);

        let (sibling_filter, mut left) = match parent {
            Some(parent_key) => {
                let parent_row = self
                    .store
                    .fetch_by_key(parent_key)?
                    .ok_or(Error::ParentNotFound(parent_key))?;
                let parent_bounds = bounds_of(cols, &parent_row)?;
                (Filter::eq(&cols.parent, parent_key), parent_bounds.left + 1)
            }
            None => (Filter::is_null(&cols.parent), 1),
        };

        let siblings = self.store.fetch_all(&[sibling_filter], &[])?;
        for sibling in &siblings {
            let entry = project(cols, sibling)?;
            let Some(bounds) = entry.bounds else {
                continue;
            };
            if cmp_siblings(&entry.sort, Some(entry.key), &own_sort, own_key) == Ordering::Less {
                left = left.max(bounds.right + 1);
            }
        }

        let bounds = Bounds::new(left, left + 1);
        record.set_parent_id(cols, parent);
        record.set_bounds(cols, bounds);
        let key = self.store.insert(record)?;
        let shifted = self.shift(cols, &[Filter::gte(&cols.right, left)], Some(key), |b| {
            nested::open_gap(b, left, 2)
        })?;
        debug!(
            "inserted node {key} under {parent:?} at [{}, {}], {shifted} nodes shifted",
            bounds.left, bounds.right
        );
        Ok(key)
    }

    /// Delete a node and its whole subtree. A missing key is a no-op returning 0.
    pub fn delete(&mut self, key: NodeKey) -> Result<usize> {
        self.delete_with(key, DeleteMode::Cascade)
    }

    /// Delete a node, cascading to or promoting its descendants. Returns rows removed.
    pub fn delete_with(&mut self, key: NodeKey, mode: DeleteMode) -> Result<usize> {
        let cols = self.columns()?;
        let result = match mode {
            DeleteMode::Cascade => self.delete_subtree(&cols, key),
            DeleteMode::Promote => self.delete_promoting(&cols, key),
        };
        self.cache.flush();
        result
    }

    fn delete_subtree(&mut self, cols: &TreeColumns, key: NodeKey) -> Result<usize> {
        let Some(target) = self.store.fetch_by_key(key)? else {
            debug!("delete of missing node {key} ignored");
            return Ok(0);
        };
        let bounds = bounds_of(cols, &target)?;

        let subtree = self.store.fetch_all(
            &[
                Filter::gte(&cols.left, bounds.left),
                Filter::lte(&cols.right, bounds.right),
            ],
            &[],
        )?;
        let doomed = subtree
            .iter()
            .map(|row| key_of(cols, row))
            .collect::<Result<Vec<_>>>()?;
        if !doomed.contains(&key) {
            return Err(Error::CorruptHierarchy(format!(
                "node {key} lies outside its own interval [{}, {}]",
                bounds.left, bounds.right
            )));
        }

        self.remove_target(key)?;
        let mut removed = 1;
        for other in doomed.into_iter().filter(|k| *k != key) {
            if self.store.delete(other)? {
                removed += 1;
            }
        }

        let width = bounds.width();
        let shifted = self.shift(cols, &[Filter::gt(&cols.right, bounds.right)], None, |b| {
            nested::close_gap(b, bounds.right, width)
        })?;
        debug!("deleted node {key} with {removed} rows (width {width}), {shifted} nodes shifted");
        Ok(removed)
    }

    fn delete_promoting(&mut self, cols: &TreeColumns, key: NodeKey) -> Result<usize> {
        let Some(target) = self.store.fetch_by_key(key)? else {
            debug!("delete of missing node {key} ignored");
            return Ok(0);
        };
        let removed = bounds_of(cols, &target)?;
        let parent = target.parent_id(cols)?;
        self.remove_target(key)?;

        let children = self.store.fetch_all(&[Filter::eq(&cols.parent, key)], &[])?;
        let reparent = Row::new().with(cols.parent.as_str(), Value::from(parent));
        for child in &children {
            self.store.update(&reparent, key_of(cols, child)?)?;
        }

        let shifted = self.shift(cols, &[Filter::gt(&cols.right, removed.left)], None, |b| {
            nested::promote_shift(b, removed)
        })?;
        debug!(
            "deleted node {key}, promoted {} children to {parent:?}, {shifted} nodes shifted",
            children.len()
        );
        Ok(1)
    }

    fn remove_target(&mut self, key: NodeKey) -> Result<()> {
        if self.store.delete(key)? {
            return Ok(());
        }
        Err(Error::InconsistentState(format!(
            "node {key} disappeared between fetch and delete"
        )))
    }

    fn shift(
        &mut self,
        cols: &TreeColumns,
        filter: &[Filter],
        skip: Option<NodeKey>,
        moved: impl Fn(Bounds) -> Bounds,
    ) -> Result<usize> {
        let rows = self.store.fetch_all(filter, &[])?;
        let mut shifted = 0;
        for row in &rows {
            let entry = project(cols, row)?;
            if Some(entry.key) == skip {
                continue;
            }
            let Some(bounds) = entry.bounds else {
                continue;
            };
            let next = moved(bounds);
            if next != bounds {
                trace!("node {}: {bounds:?} -> {next:?}", entry.key);
                self.store.update(&cols.bounds_changes(next), entry.key)?;
                shifted += 1;
            }
        }
        Ok(shifted)
    }

    /// Check the nested-set invariant over the whole table.
    pub fn validate_invariants(&self) -> Result<()> {
        let cols = self.columns()?;
        let rows = self.store.fetch_all(&[], &[])?;
        let entries = rows
            .iter()
            .map(|row| project(&cols, row))
            .collect::<Result<Vec<_>>>()?;
        nested::check_nested(&entries)
    }
}
