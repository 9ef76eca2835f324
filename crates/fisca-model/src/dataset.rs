// SPDX-License-Identifier: Apache-2.0

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// An in-memory table: ordered rows under unique, named columns.
///
/// Row order is the order the warehouse produced; queries are usually
/// pre-sorted, so callers may rely on it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "DatasetParts")]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct DatasetParts {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TryFrom<DatasetParts> for Dataset {
    type Error = ValidationError;

    fn try_from(value: DatasetParts) -> Result<Self, Self::Error> {
        Self::new(value.columns, value.rows)
    }
}

impl Dataset {
    /// Builds a dataset, rejecting duplicate column names and ragged rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ValidationError(format!("duplicate column `{column}`")));
            }
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ValidationError(format!(
                "row {idx} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column in row order, or `None` when the column is absent.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// One row viewed as a column-name to value mapping.
    #[must_use]
    pub fn row_map(&self, row: usize) -> Option<BTreeMap<&str, &Value>> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(cells.iter())
                .collect(),
        )
    }

    /// Rough in-memory footprint, used for load summaries.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        let headers: usize = self.columns.iter().map(String::capacity).sum();
        let cells: usize = self
            .rows
            .iter()
            .flat_map(|row| row.iter())
            .map(Value::estimated_bytes)
            .sum();
        headers + cells
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}
