// SPDX-License-Identifier: Apache-2.0

use crate::connection::{RawTable, WarehouseConnection};
use crate::query_error::QueryError;
use crate::statement::Statement;
use async_trait::async_trait;
use fisca_core::ResultExt;
use fisca_model::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Warehouse adapter over a SQLite database, used for local extracts and
/// for exercising the loaders end to end.
///
/// Statements run on the blocking pool; the single connection is shared
/// behind a mutex.
#[derive(Clone)]
pub struct SqliteWarehouse {
    scope: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWarehouse {
    #[must_use]
    pub fn from_connection(scope: impl Into<String>, conn: Connection) -> Self {
        Self {
            scope: scope.into(),
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open_read_only(path: &Path) -> Result<Self, QueryError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context("open sqlite warehouse")
        .map_err(|e| QueryError::connectivity(e.to_string()))?;
        Ok(Self::from_connection(
            format!("sqlite:{}", path.display()),
            conn,
        ))
    }

    pub fn open_in_memory(scope: impl Into<String>) -> Result<Self, QueryError> {
        let conn = Connection::open_in_memory()
            .with_context("open in-memory sqlite warehouse")
            .map_err(|e| QueryError::connectivity(e.to_string()))?;
        Ok(Self::from_connection(scope, conn))
    }

    /// Runs DDL/DML on the underlying connection, for seeding fixtures.
    pub fn execute_batch(&self, sql: &str) -> Result<(), QueryError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| QueryError::connectivity("sqlite connection lock poisoned"))?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, QueryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| QueryError::connectivity("sqlite connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| QueryError::sql(format!("sqlite worker failed: {e}")))?
    }
}

#[async_trait]
impl WarehouseConnection for SqliteWarehouse {
    fn scope(&self) -> &str {
        &self.scope
    }

    async fn probe(&self) -> Result<(), QueryError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| QueryError::connectivity(e.to_string()))
        })
        .await
    }

    async fn fetch(&self, statement: &Statement) -> Result<RawTable, QueryError> {
        let statement = statement.clone();
        self.with_connection(move |conn| run_statement(conn, &statement))
            .await
    }
}

fn run_statement(conn: &Connection, statement: &Statement) -> Result<RawTable, QueryError> {
    let mut stmt = conn.prepare_cached(&statement.sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();
    let params: Vec<SqlValue> = statement.params.iter().map(to_sql_value).collect();

    let mut cursor = stmt.query(params_from_iter(params.iter()))?;
    let mut rows = Vec::new();
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(from_value_ref(row.get_ref(idx)?));
        }
        rows.push(cells);
    }
    Ok(RawTable { columns, rows })
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
