//! SQLite-backed record store for the nested-set engine.
//! Rows live in an ordinary table with an `INTEGER PRIMARY KEY`; the engine drives it through
//! [`nestedset_core::RecordStore`]. [`TreeTable`] creates a table with the usual tree columns.

#[cfg(feature = "rusqlite-storage")]
mod schema;
#[cfg(feature = "rusqlite-storage")]
mod storage;

#[cfg(feature = "rusqlite-storage")]
pub use schema::TreeTable;
#[cfg(feature = "rusqlite-storage")]
pub use storage::SqliteStore;
