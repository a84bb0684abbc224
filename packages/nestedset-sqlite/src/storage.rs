use std::path::Path;

use log::{debug, trace};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use nestedset_core::{
    error::Error, Filter, NodeKey, OrderBy, RecordStore, Row, TreeRecord, Value,
};

use crate::schema::TreeTable;

pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

fn read_row(row: &rusqlite::Row<'_>, names: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (idx, name) in names.iter().enumerate() {
        let value = match row.get_ref(idx)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(_) => {
                return Err(rusqlite::Error::InvalidColumnType(idx, name.clone(), Type::Blob))
            }
        };
        out.set(name.as_str(), value);
    }
    Ok(out)
}

/// SQLite-backed `RecordStore` over a single table.
///
/// The key column must be the table's `INTEGER PRIMARY KEY` so generated keys come from the
/// rowid. Blob columns are not supported.
pub struct SqliteStore {
    conn: Connection,
    table: String,
    key_column: String,
}

impl SqliteStore {
    pub fn new_in_memory(table: &TreeTable) -> nestedset_core::Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        table.ensure(&conn)?;
        Ok(Self::from_connection(conn, &table.name, &table.key_column))
    }

    pub fn open(path: impl AsRef<Path>, table: &TreeTable) -> nestedset_core::Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(storage_err)?;
        table.ensure(&conn)?;
        debug!("opened {} for table `{}`", path.as_ref().display(), table.name);
        Ok(Self::from_connection(conn, &table.name, &table.key_column))
    }

    /// Wrap an existing connection and table without touching the schema.
    pub fn from_connection(
        conn: Connection,
        table: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            table: table.into(),
            key_column: key_column.into(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    pub fn begin(&self) -> nestedset_core::Result<()> {
        self.conn.execute_batch("BEGIN").map_err(storage_err)
    }

    pub fn commit(&self) -> nestedset_core::Result<()> {
        self.conn.execute_batch("COMMIT").map_err(storage_err)
    }

    pub fn rollback(&self) -> nestedset_core::Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(storage_err)
    }

    fn select(
        &self,
        where_sql: &str,
        params: Vec<rusqlite::types::Value>,
        order_sql: &str,
    ) -> nestedset_core::Result<Vec<Row>> {
        let sql = format!(
            "SELECT * FROM {}{where_sql}{order_sql}",
            quote(&self.table)
        );
        trace!("{sql}");
        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params_from_iter(params), |row| read_row(row, &names))
            .map_err(storage_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(storage_err)?);
        }
        Ok(out)
    }
}

fn where_clause(filter: &[Filter]) -> (String, Vec<rusqlite::types::Value>) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut params = Vec::new();
    let mut terms = Vec::with_capacity(filter.len());
    for f in filter {
        let column = quote(f.column());
        let (op, value) = match f {
            Filter::IsNull(_) => {
                terms.push(format!("{column} IS NULL"));
                continue;
            }
            Filter::Eq(_, v) => ("=", v),
            Filter::Gt(_, v) => (">", v),
            Filter::Gte(_, v) => (">=", v),
            Filter::Lt(_, v) => ("<", v),
            Filter::Lte(_, v) => ("<=", v),
        };
        params.push(to_sql(value));
        terms.push(format!("{column} {op} ?{}", params.len()));
    }
    (format!(" WHERE {}", terms.join(" AND ")), params)
}

fn order_clause(order: &[OrderBy]) -> String {
    if order.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = order
        .iter()
        .map(|o| {
            let dir = if o.descending { "DESC" } else { "ASC" };
            format!("{} {dir}", quote(&o.column))
        })
        .collect();
    format!(" ORDER BY {}", terms.join(", "))
}

impl RecordStore for SqliteStore {
    type Record = Row;

    fn key_column(&self) -> &str {
        &self.key_column
    }

    fn fetch_by_key(&self, key: NodeKey) -> nestedset_core::Result<Option<Row>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
            quote(&self.table),
            quote(&self.key_column)
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        stmt.query_row([key], |row| read_row(row, &names))
            .optional()
            .map_err(storage_err)
    }

    fn fetch_all(&self, filter: &[Filter], order: &[OrderBy]) -> nestedset_core::Result<Vec<Row>> {
        let (where_sql, params) = where_clause(filter);
        self.select(&where_sql, params, &order_clause(order))
    }

    fn insert(&mut self, record: Row) -> nestedset_core::Result<NodeKey> {
        let explicit_key = record
            .value(&self.key_column)
            .filter(|v| !v.is_null())
            .map(|v| {
                v.as_integer().ok_or_else(|| {
                    Error::Storage(format!("key column `{}` holds {v:?}", self.key_column))
                })
            })
            .transpose()?;

        let table = quote(&self.table);
        let affected = if record.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {table} DEFAULT VALUES"), [])
                .map_err(storage_err)?
        } else {
            let columns: Vec<String> = record.iter().map(|(c, _)| quote(c)).collect();
            let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                slots.join(", ")
            );
            trace!("{sql}");
            let params = record.iter().map(|(_, v)| to_sql(v));
            self.conn
                .execute(&sql, params_from_iter(params))
                .map_err(storage_err)?
        };
        if affected != 1 {
            return Err(Error::Storage(format!("insert affected {affected} rows")));
        }
        Ok(explicit_key.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    fn update(&mut self, changes: &Row, key: NodeKey) -> nestedset_core::Result<bool> {
        let Some(current) = self.fetch_by_key(key)? else {
            return Ok(false);
        };
        let diff = current.diff(changes);
        if diff.is_empty() {
            return Ok(false);
        }

        let assignments: Vec<String> = diff
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{} = ?{}", quote(c), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote(&self.table),
            assignments.join(", "),
            quote(&self.key_column),
            diff.len() + 1
        );
        trace!("{sql}");
        let mut params: Vec<rusqlite::types::Value> = diff.iter().map(|(_, v)| to_sql(v)).collect();
        params.push(rusqlite::types::Value::Integer(key));
        let affected = self
            .conn
            .execute(&sql, params_from_iter(params))
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    fn delete(&mut self, key: NodeKey) -> nestedset_core::Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote(&self.table),
            quote(&self.key_column)
        );
        let affected = self.conn.execute(&sql, [key]).map_err(storage_err)?;
        Ok(affected > 0)
    }
}
