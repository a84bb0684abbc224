use rusqlite::Connection;

use nestedset_core::{
    error::Error, EngineOptions, Traversal, DEFAULT_LEFT_COLUMN, DEFAULT_RIGHT_COLUMN,
};

use crate::storage::quote;

/// Layout of a tree table: key, parent pointer, boundaries and any payload columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeTable {
    pub name: String,
    pub key_column: String,
    pub parent_column: String,
    pub left_column: String,
    pub right_column: String,
    /// `(name, declared type)` payload columns.
    pub columns: Vec<(String, String)>,
}

impl TreeTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_column: "id".to_string(),
            parent_column: "parent_id".to_string(),
            left_column: DEFAULT_LEFT_COLUMN.to_string(),
            right_column: DEFAULT_RIGHT_COLUMN.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    pub fn parent_column(mut self, column: impl Into<String>) -> Self {
        self.parent_column = column.into();
        self
    }

    pub fn bounds_columns(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_column = left.into();
        self.right_column = right.into();
        self
    }

    pub fn column(mut self, name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        self.columns.push((name.into(), declared_type.into()));
        self
    }

    pub fn create_sql(&self) -> String {
        let table = quote(&self.name);
        let mut defs = vec![
            format!("{} INTEGER PRIMARY KEY", quote(&self.key_column)),
            format!("{} INTEGER", quote(&self.parent_column)),
            format!("{} INTEGER", quote(&self.left_column)),
            format!("{} INTEGER", quote(&self.right_column)),
        ];
        defs.extend(
            self.columns
                .iter()
                .map(|(name, ty)| format!("{} {ty}", quote(name))),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n);\n\
             CREATE INDEX IF NOT EXISTS {} ON {table}({});\n\
             CREATE INDEX IF NOT EXISTS {} ON {table}({}, {});",
            defs.join(",\n    "),
            quote(&format!("idx_{}_parent", self.name)),
            quote(&self.parent_column),
            quote(&format!("idx_{}_bounds", self.name)),
            quote(&self.left_column),
            quote(&self.right_column),
        )
    }

    pub fn ensure(&self, conn: &Connection) -> nestedset_core::Result<()> {
        conn.execute_batch(&self.create_sql())
            .map_err(|e| Error::Storage(e.to_string()))?;
        log::debug!("ensured tree table `{}`", self.name);
        Ok(())
    }

    /// Engine options matching this table's boundary columns.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default().with_bounds_columns(&self.left_column, &self.right_column)
    }

    /// Traversal over this table's parent column, siblings in key order.
    pub fn traversal(&self) -> Traversal {
        Traversal::new(&self.parent_column)
    }
}
