// SPDX-License-Identifier: Apache-2.0

use crate::dataset::Dataset;
use fisca_core::MachineError;
use serde::Serialize;
use std::collections::BTreeMap;

/// How a named dataset slot in a [`Snapshot`] came to hold its value.
///
/// Every non-`Loaded` status pairs with an empty dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
#[non_exhaustive]
pub enum LoadStatus {
    Loaded { rows: usize },
    Empty,
    Skipped { reason: String },
    Failed { error: MachineError },
}

impl LoadStatus {
    #[must_use]
    pub fn for_dataset(dataset: &Dataset) -> Self {
        if dataset.is_empty() {
            Self::Empty
        } else {
            Self::Loaded {
                rows: dataset.len(),
            }
        }
    }

    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Named collection of datasets produced by one loader invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Snapshot {
    datasets: BTreeMap<String, Dataset>,
    statuses: BTreeMap<String, LoadStatus>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot holding an empty dataset under every name, all with `status`.
    #[must_use]
    pub fn empty_for<I, S>(names: I, status: &LoadStatus) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut snapshot = Self::new();
        for name in names {
            snapshot.insert(name, Dataset::empty(), status.clone());
        }
        snapshot
    }

    /// Inserts or replaces the slot for `name`.
    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset, status: LoadStatus) {
        let name = name.into();
        self.statuses.insert(name.clone(), status);
        self.datasets.insert(name, dataset);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<&LoadStatus> {
        self.statuses.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.datasets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset)> + '_ {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.datasets.values().map(Dataset::len).sum()
    }

    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        self.datasets.values().map(Dataset::estimated_bytes).sum()
    }

    #[must_use]
    pub fn failed_names(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, s)| s.is_failure())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    #[must_use]
    pub fn into_datasets(self) -> BTreeMap<String, Dataset> {
        self.datasets
    }
}
