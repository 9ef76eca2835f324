// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory warehouse for exercising loaders without a database.

use crate::connection::{RawTable, WarehouseConnection};
use crate::query_error::QueryError;
use crate::statement::Statement;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FakeResponse {
    Table(RawTable),
    Error(QueryError),
}

/// Answers each statement with the response of the first registered SQL
/// fragment it contains. Unmatched statements fail like a missing table.
pub struct FakeWarehouse {
    scope: String,
    responses: Mutex<Vec<(String, FakeResponse)>>,
    calls: Mutex<Vec<Statement>>,
    probe_fails: AtomicBool,
    pub fetch_calls: AtomicU64,
    pub probe_calls: AtomicU64,
    pub delay: Duration,
}

impl Default for FakeWarehouse {
    fn default() -> Self {
        Self::new("fake")
    }
}

impl FakeWarehouse {
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            probe_fails: AtomicBool::new(false),
            fetch_calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(&self, fragment: &str, table: RawTable) {
        self.push(fragment, FakeResponse::Table(table));
    }

    pub fn fail(&self, fragment: &str, message: &str) {
        self.push(fragment, FakeResponse::Error(QueryError::sql(message)));
    }

    pub fn set_probe_failure(&self, fails: bool) {
        self.probe_fails.store(fails, Ordering::SeqCst);
    }

    /// Every statement fetched so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Statement> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn calls_matching(&self, fragment: &str) -> Vec<Statement> {
        self.calls()
            .into_iter()
            .filter(|s| s.sql.contains(fragment))
            .collect()
    }

    fn push(&self, fragment: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((fragment.to_string(), response));
    }

    fn lookup(&self, sql: &str) -> Option<FakeResponse> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
    }
}

#[async_trait]
impl WarehouseConnection for FakeWarehouse {
    fn scope(&self) -> &str {
        &self.scope
    }

    async fn probe(&self) -> Result<(), QueryError> {
        self.probe_calls.fetch_add(1, Ordering::Relaxed);
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(QueryError::connectivity("connection refused"));
        }
        Ok(())
    }

    async fn fetch(&self, statement: &Statement) -> Result<RawTable, QueryError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.lookup(&statement.sql) {
            Some(FakeResponse::Table(table)) => Ok(table),
            Some(FakeResponse::Error(err)) => Err(err),
            None => Err(QueryError::sql(format!(
                "no such table for statement: {}",
                statement.compact_sql()
            ))),
        }
    }
}
