use std::collections::BTreeMap;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const REF_COLUMN_KEY: &str = "refColumn";
const ORDER_KEY: &str = "order";

/// Which column points at the parent row and how siblings are ordered.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Traversal {
    pub ref_column: String,
    /// Secondary sibling key; siblings always fall back to key order on ties.
    #[cfg_attr(feature = "serde", serde(default, rename = "order"))]
    pub order_column: Option<String>,
}

impl Traversal {
    pub fn new(ref_column: impl Into<String>) -> Self {
        Self {
            ref_column: ref_column.into(),
            order_column: None,
        }
    }

    pub fn ordered_by(mut self, column: impl Into<String>) -> Self {
        self.order_column = Some(column.into());
        self
    }
}

/// Accepted shapes for `TreeEngine::set_traversal`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum TraversalSpec {
    /// Clears the traversal.
    Clear,
    /// Parent column only; siblings in key order.
    Column(String),
    /// `refColumn` (required) and optional `order`.
    Options(BTreeMap<String, String>),
}

impl TraversalSpec {
    /// Validate the shape. `Ok(None)` means the traversal is cleared.
    pub fn resolve(self) -> Result<Option<Traversal>> {
        match self {
            TraversalSpec::Clear => Ok(None),
            TraversalSpec::Column(column) if column.is_empty() => Ok(None),
            TraversalSpec::Column(column) => Ok(Some(Traversal::new(column))),
            TraversalSpec::Options(map) if map.is_empty() => Ok(None),
            TraversalSpec::Options(mut map) => {
                let ref_column = map.remove(REF_COLUMN_KEY).ok_or_else(|| {
                    Error::InvalidConfiguration(format!("`{REF_COLUMN_KEY}` is required"))
                })?;
                if ref_column.is_empty() {
                    return Err(Error::InvalidConfiguration(format!(
                        "`{REF_COLUMN_KEY}` must not be empty"
                    )));
                }
                let order_column = map.remove(ORDER_KEY).filter(|c| !c.is_empty());
                if let Some(unknown) = map.keys().next() {
                    return Err(Error::InvalidConfiguration(format!(
                        "unrecognized traversal option `{unknown}`"
                    )));
                }
                Ok(Some(Traversal {
                    ref_column,
                    order_column,
                }))
            }
        }
    }
}

impl From<&str> for TraversalSpec {
    fn from(column: &str) -> Self {
        TraversalSpec::Column(column.to_string())
    }
}

impl From<String> for TraversalSpec {
    fn from(column: String) -> Self {
        TraversalSpec::Column(column)
    }
}

impl From<BTreeMap<String, String>> for TraversalSpec {
    fn from(map: BTreeMap<String, String>) -> Self {
        TraversalSpec::Options(map)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TraversalSpec {
    fn from(pairs: [(&str, &str); N]) -> Self {
        TraversalSpec::Options(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl From<Traversal> for TraversalSpec {
    fn from(traversal: Traversal) -> Self {
        let mut map = BTreeMap::new();
        map.insert(REF_COLUMN_KEY.to_string(), traversal.ref_column);
        if let Some(order) = traversal.order_column {
            map.insert(ORDER_KEY.to_string(), order);
        }
        TraversalSpec::Options(map)
    }
}

impl<T: Into<TraversalSpec>> From<Option<T>> for TraversalSpec {
    fn from(spec: Option<T>) -> Self {
        spec.map_or(TraversalSpec::Clear, Into::into)
    }
}
