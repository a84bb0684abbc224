#![forbid(unsafe_code)]
//! Nested-set (modified preorder tree traversal) maintenance over pluggable record stores.
//! The engine keeps `left`/`right` boundary columns consistent with a parent-pointer column
//! across inserts and deletes, and can rebuild them from scratch. Storage stays behind the
//! [`RecordStore`] trait so the same engine runs in memory, on SQLite, or on any host table.

pub mod config;
pub mod error;
pub mod ids;
pub mod nested;
pub mod record;
pub mod traits;
pub mod traversal;
pub mod tree;

pub use config::{EngineOptions, DEFAULT_LEFT_COLUMN, DEFAULT_RIGHT_COLUMN};
pub use error::{Error, Result};
pub use ids::{Bounds, NodeKey};
pub use nested::{assign_bounds, check_nested, NodeEntry};
pub use record::{Row, TreeColumns, TreeRecord, Value};
pub use traits::{
    cmp_records, Filter, MemoryCache, MemoryStore, NoCache, OrderBy, QueryCache, RecordStore,
};
pub use traversal::{Traversal, TraversalSpec};
pub use tree::{DeleteMode, TreeEngine};
