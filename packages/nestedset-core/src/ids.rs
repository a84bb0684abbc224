#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a row in the backing table.
pub type NodeKey = i64;

/// Nested-set interval of a node: every descendant lies strictly inside `(left, right)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub left: i64,
    pub right: i64,
}

impl Bounds {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Number of boundary slots used by the node and its whole subtree.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Whether `other` lies strictly inside this interval.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left < other.left && other.right < self.right
    }

    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }
}
