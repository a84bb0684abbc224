#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_LEFT_COLUMN: &str = "lft";
pub const DEFAULT_RIGHT_COLUMN: &str = "rgt";

/// Constructor-time engine settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct EngineOptions {
    /// Column holding the left boundary.
    pub left_column: String,
    /// Column holding the right boundary.
    pub right_column: String,
    /// Serve reads from the cache collaborator.
    pub use_cache: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            left_column: DEFAULT_LEFT_COLUMN.to_string(),
            right_column: DEFAULT_RIGHT_COLUMN.to_string(),
            use_cache: true,
        }
    }
}

impl EngineOptions {
    pub fn with_bounds_columns(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_column = left.into();
        self.right_column = right.into();
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::InvalidConfiguration(e.to_string()))
    }
}
