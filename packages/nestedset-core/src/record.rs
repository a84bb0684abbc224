use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::ids::{Bounds, NodeKey};
use crate::traits::OrderBy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single column value as exchanged with a record store.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value. Integral reals and integer-looking text are accepted.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
            Value::Real(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for sorting: NULL first, then numbers, then text by bytes.
    pub fn cmp_sort(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Text(_), _) => Ordering::Greater,
            (_, Value::Text(_)) => Ordering::Less,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }

    /// Comparison used by row filters: two values with an integer view compare as integers,
    /// so `"8"` equals `8` the same way the tree accessors read it.
    pub fn cmp_filter(&self, other: &Value) -> Ordering {
        match (self.as_integer(), other.as_integer()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.cmp_sort(other),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Integer(i) => *i as f64,
            Value::Real(f) => *f,
            _ => f64::NAN,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Column-name → value map; the default record type and the changeset format for updates.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.remove(column)
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_integer)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns of `changes` whose value differs from this row. A missing column counts as NULL.
    pub fn diff(&self, changes: &Row) -> Row {
        let columns = changes
            .columns
            .iter()
            .filter(|(column, value)| self.get(column).unwrap_or(&Value::Null) != *value)
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        Row { columns }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Names of the columns the tree engine reads and writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeColumns {
    pub key: String,
    pub parent: String,
    pub left: String,
    pub right: String,
    pub order: Option<String>,
}

impl TreeColumns {
    /// Sibling order: the order column (if any) with the key as tie-break.
    pub fn sibling_order(&self) -> Vec<OrderBy> {
        let mut order = Vec::with_capacity(2);
        if let Some(column) = &self.order {
            order.push(OrderBy::asc(column.as_str()));
        }
        order.push(OrderBy::asc(self.key.as_str()));
        order
    }

    pub fn bounds_changes(&self, bounds: Bounds) -> Row {
        Row::new()
            .with(self.left.as_str(), bounds.left)
            .with(self.right.as_str(), bounds.right)
    }
}

/// Minimal record interface the tree engine works against.
///
/// Implementors only provide column access; the tree accessors are derived from it.
pub trait TreeRecord: Clone {
    fn value(&self, column: &str) -> Option<&Value>;
    fn set_value(&mut self, column: &str, value: Value);

    fn node_id(&self, columns: &TreeColumns) -> Result<Option<NodeKey>> {
        integer_column(self, &columns.key)
    }

    fn parent_id(&self, columns: &TreeColumns) -> Result<Option<NodeKey>> {
        integer_column(self, &columns.parent)
    }

    /// Current interval, or `None` when either boundary is unset.
    fn bounds(&self, columns: &TreeColumns) -> Result<Option<Bounds>> {
        let left = integer_column(self, &columns.left)?;
        let right = integer_column(self, &columns.right)?;
        Ok(left.zip(right).map(|(left, right)| Bounds::new(left, right)))
    }

    fn set_parent_id(&mut self, columns: &TreeColumns, parent: Option<NodeKey>) {
        self.set_value(&columns.parent, parent.into());
    }

    fn set_bounds(&mut self, columns: &TreeColumns, bounds: Bounds) {
        self.set_value(&columns.left, Value::Integer(bounds.left));
        self.set_value(&columns.right, Value::Integer(bounds.right));
    }

    /// Value of the order column, NULL when no order column is configured.
    fn sort_value(&self, columns: &TreeColumns) -> Value {
        columns
            .order
            .as_deref()
            .and_then(|column| self.value(column))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn integer_column<R: TreeRecord + ?Sized>(record: &R, column: &str) -> Result<Option<i64>> {
    match record.value(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_integer().map(Some).ok_or_else(|| {
            Error::InvalidRecord(format!("column `{column}` holds non-integer value {value:?}"))
        }),
    }
}

impl TreeRecord for Row {
    fn value(&self, column: &str) -> Option<&Value> {
        self.get(column)
    }

    fn set_value(&mut self, column: &str, value: Value) {
        self.set(column, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> TreeColumns {
        TreeColumns {
            key: "id".into(),
            parent: "parent_id".into(),
            left: "lft".into(),
            right: "rgt".into(),
            order: Some("name".into()),
        }
    }

    #[test]
    fn sort_order_puts_null_numbers_then_text() {
        let mut values = vec![
            Value::from("b"),
            Value::Integer(3),
            Value::Null,
            Value::Real(2.5),
            Value::from("a"),
        ];
        values.sort_by(Value::cmp_sort);
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Real(2.5),
                Value::Integer(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn diff_keeps_only_changed_columns() {
        let row = Row::new().with("lft", 1).with("rgt", 2).with("name", "Food");
        let changes = Row::new().with("lft", 1).with("rgt", 4).with("note", Value::Null);
        let diff = row.diff(&changes);
        assert_eq!(diff, Row::new().with("rgt", 4));
    }

    #[test]
    fn tree_accessors_read_integer_like_values() {
        let cols = columns();
        let row = Row::new()
            .with("id", "7")
            .with("parent_id", 3)
            .with("lft", 4)
            .with("rgt", 5);
        assert_eq!(row.node_id(&cols).unwrap(), Some(7));
        assert_eq!(row.parent_id(&cols).unwrap(), Some(3));
        assert_eq!(row.bounds(&cols).unwrap(), Some(Bounds::new(4, 5)));
        assert_eq!(row.sort_value(&cols), Value::Null);
    }

    #[test]
    fn filter_comparison_reads_integer_like_text() {
        assert_eq!(Value::from("8").cmp_filter(&Value::Integer(8)), Ordering::Equal);
        assert_eq!(Value::from("10").cmp_filter(&Value::Integer(9)), Ordering::Greater);
        assert_eq!(Value::Real(2.0).cmp_filter(&Value::from(" 3 ")), Ordering::Less);
        assert_eq!(Value::from("b").cmp_filter(&Value::Integer(8)), Ordering::Greater);
    }

    #[test]
    fn out_of_range_reals_have_no_integer_view() {
        assert_eq!(Value::Real(4.0).as_integer(), Some(4));
        assert_eq!(Value::Real(-9.0e18).as_integer(), Some(-9_000_000_000_000_000_000));
        assert_eq!(Value::Real(1e19).as_integer(), None);
        assert_eq!(Value::Real(-1e19).as_integer(), None);
        assert_eq!(Value::Real(f64::INFINITY).as_integer(), None);

        let row = Row::new().with("lft", 1e30).with("rgt", 2);
        assert!(matches!(row.bounds(&columns()), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn non_integer_parent_is_rejected() {
        let row = Row::new().with("parent_id", "Fruit");
        assert!(matches!(
            row.parent_id(&columns()),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn half_set_bounds_read_as_none() {
        let row = Row::new().with("lft", 4);
        assert_eq!(row.bounds(&columns()).unwrap(), None);
    }
}
