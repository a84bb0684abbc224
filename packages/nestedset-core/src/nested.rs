//! Storage-independent nested-set arithmetic: boundary assignment from parent pointers,
//! boundary shifts for structural edits, and the invariant check.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ids::{Bounds, NodeKey};
use crate::record::Value;

/// Tree-relevant projection of a stored row.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeEntry {
    pub key: NodeKey,
    pub parent: Option<NodeKey>,
    /// Value of the order column, NULL when siblings are ordered by key alone.
    pub sort: Value,
    pub bounds: Option<Bounds>,
}

/// Sibling order: sort value first, then key. A missing key sorts after every present one,
/// matching a store that hands out fresh, larger keys on insert.
pub fn cmp_siblings(
    a_sort: &Value,
    a_key: Option<NodeKey>,
    b_sort: &Value,
    b_key: Option<NodeKey>,
) -> Ordering {
    a_sort.cmp_sort(b_sort).then_with(|| match (a_key, b_key) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

fn cmp_entries(a: &NodeEntry, b: &NodeEntry) -> Ordering {
    cmp_siblings(&a.sort, Some(a.key), &b.sort, Some(b.key))
}

struct Walk {
    counter: i64,
    visited: HashSet<NodeKey>,
    assigned: Vec<(NodeKey, Bounds)>,
    // (slot in `assigned`, index of the next child to visit)
    stack: Vec<(usize, usize)>,
}

impl Walk {
    fn enter(&mut self, key: NodeKey) -> Result<()> {
        if !self.visited.insert(key) {
            return Err(Error::CorruptHierarchy(format!(
                "node {key} is reachable more than once"
            )));
        }
        self.assigned.push((key, Bounds::new(self.counter, 0)));
        self.stack.push((self.assigned.len() - 1, 0));
        self.counter += 1;
        Ok(())
    }

    fn leave(&mut self) {
        if let Some((slot, _)) = self.stack.pop() {
            self.assigned[slot].1.right = self.counter;
            self.counter += 1;
        }
    }
}

/// Compute boundaries for every entry from parent pointers alone, starting at 1.
///
/// Roots and siblings are visited in [`cmp_siblings`] order. Existing boundaries are ignored.
/// Entries that cannot be reached from a root (cycles, self-parents, dangling parents)
/// fail the whole computation. The result is in preorder.
pub fn assign_bounds(entries: &[NodeEntry]) -> Result<Vec<(NodeKey, Bounds)>> {
    let mut ordered: Vec<&NodeEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| cmp_entries(a, b));

    let mut children: HashMap<Option<NodeKey>, Vec<NodeKey>> = HashMap::new();
    for entry in &ordered {
        children.entry(entry.parent).or_default().push(entry.key);
    }

    let mut walk = Walk {
        counter: 1,
        visited: HashSet::with_capacity(entries.len()),
        assigned: Vec::with_capacity(entries.len()),
        stack: Vec::new(),
    };

    let roots = children.get(&None).map(Vec::as_slice).unwrap_or_default();
    for &root in roots {
        walk.enter(root)?;
        while let Some(&(slot, next)) = walk.stack.last() {
            let key = walk.assigned[slot].0;
            let child = children
                .get(&Some(key))
                .and_then(|kids| kids.get(next))
                .copied();
            match child {
                Some(child) => {
                    if let Some(top) = walk.stack.last_mut() {
                        top.1 += 1;
                    }
                    walk.enter(child)?;
                }
                None => walk.leave(),
            }
        }
    }

    if walk.assigned.len() != entries.len() {
        let mut unreachable: Vec<NodeKey> = entries
            .iter()
            .map(|e| e.key)
            .filter(|k| !walk.visited.contains(k))
            .collect();
        unreachable.sort_unstable();
        return Err(Error::CorruptHierarchy(format!(
            "nodes not reachable from any root (cycle or missing parent): {unreachable:?}"
        )));
    }
    Ok(walk.assigned)
}

/// Boundaries after opening a gap of `width` slots at `at`: every value `>= at` moves up.
pub fn open_gap(bounds: Bounds, at: i64, width: i64) -> Bounds {
    let shift = |v: i64| if v >= at { v + width } else { v };
    Bounds::new(shift(bounds.left), shift(bounds.right))
}

/// Boundaries after removing `width` slots ending at `after`: every value `> after` moves down.
pub fn close_gap(bounds: Bounds, after: i64, width: i64) -> Bounds {
    let shift = |v: i64| if v > after { v - width } else { v };
    Bounds::new(shift(bounds.left), shift(bounds.right))
}

/// Boundaries after removing a single node spanning `removed` while keeping its
/// descendants: values inside the span move down by 1, values past it by 2.
pub fn promote_shift(bounds: Bounds, removed: Bounds) -> Bounds {
    let shift = |v: i64| {
        if v > removed.right {
            v - 2
        } else if v > removed.left {
            v - 1
        } else {
            v
        }
    };
    Bounds::new(shift(bounds.left), shift(bounds.right))
}

/// Verify the nested-set invariant over a whole table.
///
/// Every entry needs boundaries with `left < right`, the boundary values must be exactly
/// `1..=2n`, intervals must be nested or disjoint, and the innermost interval enclosing an
/// entry must belong to its parent.
pub fn check_nested(entries: &[NodeEntry]) -> Result<()> {
    let mut spans = Vec::with_capacity(entries.len());
    for entry in entries {
        let bounds = entry.bounds.ok_or_else(|| {
            Error::InconsistentState(format!("node {} has no boundaries", entry.key))
        })?;
        if bounds.left >= bounds.right {
            return Err(Error::InconsistentState(format!(
                "node {} has left {} >= right {}",
                entry.key, bounds.left, bounds.right
            )));
        }
        spans.push((bounds, entry));
    }

    let mut values: Vec<i64> = spans
        .iter()
        .flat_map(|(b, _)| [b.left, b.right])
        .collect();
    values.sort_unstable();
    for (idx, value) in values.iter().enumerate() {
        let expected = idx as i64 + 1;
        if *value != expected {
            return Err(Error::InconsistentState(format!(
                "boundary values are not dense: expected {expected}, found {value}"
            )));
        }
    }

    spans.sort_by_key(|(b, _)| b.left);
    let mut open: Vec<(Bounds, NodeKey)> = Vec::new();
    for (bounds, entry) in spans {
        while open.last().is_some_and(|(top, _)| top.right < bounds.left) {
            open.pop();
        }
        match open.last() {
            Some((top, key)) => {
                if bounds.right > top.right {
                    return Err(Error::InconsistentState(format!(
                        "node {} overlaps node {key}",
                        entry.key
                    )));
                }
                if entry.parent != Some(*key) {
                    return Err(Error::InconsistentState(format!(
                        "node {} is nested in node {key} but its parent is {:?}",
                        entry.key, entry.parent
                    )));
                }
            }
            None => {
                if let Some(parent) = entry.parent {
                    return Err(Error::InconsistentState(format!(
                        "node {} has parent {parent} but is not enclosed by it",
                        entry.key
                    )));
                }
            }
        }
        open.push((bounds, entry.key));
    }
    Ok(())
}
