use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ids::NodeKey;
use crate::record::{Row, TreeRecord, Value};

/// Conjunctive row filter. Comparisons against NULL never match, as in SQL; values with an
/// integer view (see [`Value::as_integer`]) compare numerically.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    IsNull(String),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(column.into(), value.into())
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(column.into(), value.into())
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _)
            | Filter::IsNull(c)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::Lt(c, _)
            | Filter::Lte(c, _) => c,
        }
    }

    pub fn matches<R: TreeRecord>(&self, record: &R) -> bool {
        let current = record.value(self.column()).unwrap_or(&Value::Null);
        let compare = |expected: &Value, accept: fn(Ordering) -> bool| {
            !current.is_null() && !expected.is_null() && accept(current.cmp_filter(expected))
        };
        match self {
            Filter::IsNull(_) => current.is_null(),
            Filter::Eq(_, v) => compare(v, Ordering::is_eq),
            Filter::Gt(_, v) => compare(v, Ordering::is_gt),
            Filter::Gte(_, v) => compare(v, Ordering::is_ge),
            Filter::Lt(_, v) => compare(v, Ordering::is_lt),
            Filter::Lte(_, v) => compare(v, Ordering::is_le),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Compare two records by an `ORDER BY` list.
pub fn cmp_records<R: TreeRecord>(a: &R, b: &R, order: &[OrderBy]) -> Ordering {
    for o in order {
        let av = a.value(&o.column).unwrap_or(&Value::Null);
        let bv = b.value(&o.column).unwrap_or(&Value::Null);
        let ord = av.cmp_sort(bv);
        let ord = if o.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Table-backed record collection the tree engine reads and writes through.
pub trait RecordStore {
    type Record: TreeRecord;

    /// Column holding the identifier assigned on insert.
    fn key_column(&self) -> &str;
    fn fetch_by_key(&self, key: NodeKey) -> Result<Option<Self::Record>>;
    /// Rows matching every filter, sorted by `order` (natural order when empty).
    fn fetch_all(&self, filter: &[Filter], order: &[OrderBy]) -> Result<Vec<Self::Record>>;
    /// Persist a record, keeping its key when it carries one. Returns the key.
    fn insert(&mut self, record: Self::Record) -> Result<NodeKey>;
    /// Write the columns of `changes` that differ from the stored row.
    /// Returns `false` when nothing changed or the row does not exist.
    fn update(&mut self, changes: &Row, key: NodeKey) -> Result<bool>;
    /// Returns `false` when the row does not exist.
    fn delete(&mut self, key: NodeKey) -> Result<bool>;
}

/// Read cache in front of a record store. Flushed by every structural mutation.
pub trait QueryCache<R> {
    fn get(&self, key: &str) -> Option<Vec<R>>;
    fn put(&self, key: String, rows: Vec<R>);
    fn flush(&self);
}

/// Cache that never stores anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl<R> QueryCache<R> for NoCache {
    fn get(&self, _key: &str) -> Option<Vec<R>> {
        None
    }

    fn put(&self, _key: String, _rows: Vec<R>) {}

    fn flush(&self) {}
}

/// Unbounded in-process cache keyed by query signature.
#[derive(Debug)]
pub struct MemoryCache<R> {
    entries: RefCell<HashMap<String, Vec<R>>>,
}

impl<R> Default for MemoryCache<R> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<R> MemoryCache<R> {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<R: Clone> QueryCache<R> for MemoryCache<R> {
    fn get(&self, key: &str) -> Option<Vec<R>> {
        self.entries.borrow().get(key).cloned()
    }

    fn put(&self, key: String, rows: Vec<R>) {
        self.entries.borrow_mut().insert(key, rows);
    }

    fn flush(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// In-memory vector-backed store for prototyping and tests.
///
/// Insertion order is the natural order. Generated keys start at 1 and are never reused.
#[derive(Clone, Debug)]
pub struct MemoryStore<R = Row> {
    key_column: String,
    rows: Vec<R>,
    next_key: NodeKey,
}

impl MemoryStore {
    pub fn new(key_column: impl Into<String>) -> Self {
        Self::with_key_column(key_column)
    }
}

impl<R: TreeRecord> MemoryStore<R> {
    /// Store for a custom record type.
    pub fn with_key_column(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            rows: Vec::new(),
            next_key: 1,
        }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn key_of(&self, record: &R) -> Result<Option<NodeKey>> {
        match record.value(&self.key_column) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_integer().map(Some).ok_or_else(|| {
                Error::Storage(format!("key column `{}` holds {v:?}", self.key_column))
            }),
        }
    }

    fn position(&self, key: NodeKey) -> Result<Option<usize>> {
        for (idx, row) in self.rows.iter().enumerate() {
            if self.key_of(row)? == Some(key) {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }
}

impl<R: TreeRecord> RecordStore for MemoryStore<R> {
    type Record = R;

    fn key_column(&self) -> &str {
        &self.key_column
    }

    fn fetch_by_key(&self, key: NodeKey) -> Result<Option<R>> {
        Ok(self.position(key)?.map(|idx| self.rows[idx].clone()))
    }

    fn fetch_all(&self, filter: &[Filter], order: &[OrderBy]) -> Result<Vec<R>> {
        let mut rows: Vec<R> = self
            .rows
            .iter()
            .filter(|row| filter.iter().all(|f| f.matches(*row)))
            .cloned()
            .collect();
        if !order.is_empty() {
            rows.sort_by(|a, b| cmp_records(a, b, order));
        }
        Ok(rows)
    }

    fn insert(&mut self, mut record: R) -> Result<NodeKey> {
        let key = match self.key_of(&record)? {
            Some(key) => {
                if self.position(key)?.is_some() {
                    return Err(Error::Storage(format!("duplicate key {key}")));
                }
                key
            }
            None => self.next_key,
        };
        let after = key
            .checked_add(1)
            .ok_or_else(|| Error::Storage(format!("key {key} leaves no room for generated keys")))?;
        record.set_value(&self.key_column, Value::Integer(key));
        self.next_key = self.next_key.max(after);
        self.rows.push(record);
        Ok(key)
    }

    fn update(&mut self, changes: &Row, key: NodeKey) -> Result<bool> {
        let Some(idx) = self.position(key)? else {
            return Ok(false);
        };
        let row = &mut self.rows[idx];
        let mut changed = false;
        for (column, value) in changes.iter() {
            if row.value(column).unwrap_or(&Value::Null) != value {
                row.set_value(column, value.clone());
                changed = true;
            }
        }
        Ok(changed)
    }

    fn delete(&mut self, key: NodeKey) -> Result<bool> {
        match self.position(key)? {
            Some(idx) => {
                self.rows.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
