// SPDX-License-Identifier: Apache-2.0

use crate::normalize::normalize_preserving;
use crate::query_error::QueryError;
use crate::statement::Statement;
use async_trait::async_trait;
use fisca_model::{Dataset, Value};

/// Rows and column names exactly as the warehouse returned them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    #[must_use]
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }
}

impl From<Dataset> for RawTable {
    fn from(value: Dataset) -> Self {
        let (columns, rows) = value.into_parts();
        Self { columns, rows }
    }
}

/// Read-only handle to the analytical warehouse.
///
/// Implementations are shared across concurrent fetches and must not rely on
/// exclusive access; query isolation is the warehouse's job.
#[async_trait]
pub trait WarehouseConnection: Send + Sync + 'static {
    /// Stable identity of the warehouse behind this handle. Cache keys are
    /// scoped by it so two warehouses never share entries.
    fn scope(&self) -> &str;

    /// Cheap round trip proving the warehouse is reachable.
    async fn probe(&self) -> Result<(), QueryError>;

    async fn fetch(&self, statement: &Statement) -> Result<RawTable, QueryError>;
}

/// Runs `statement` and normalizes the result.
pub async fn fetch_dataset(
    conn: &dyn WarehouseConnection,
    statement: &Statement,
) -> Result<Dataset, QueryError> {
    fetch_dataset_preserving(conn, statement, &[]).await
}

/// Runs `statement` and normalizes the result, leaving the `preserve`
/// columns as fetched.
pub async fn fetch_dataset_preserving(
    conn: &dyn WarehouseConnection,
    statement: &Statement,
    preserve: &[&str],
) -> Result<Dataset, QueryError> {
    let raw = conn.fetch(statement).await?;
    Ok(normalize_preserving(raw, preserve)?)
}
