// SPDX-License-Identifier: Apache-2.0

use crate::dataset::Dataset;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeSet;

/// Deduplicated identifier values pulled from a dataset column.
///
/// Never contains blank strings. Iteration order is lexical, which keeps the
/// filters built from a key set deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct KeySet(BTreeSet<String>);

impl KeySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct non-null values of `column`; an absent column yields an empty set.
    #[must_use]
    pub fn from_column(dataset: &Dataset, column: &str) -> Self {
        let mut keys = Self::new();
        keys.extend_from_column(dataset, column);
        keys
    }

    /// Union of several columns of the same dataset.
    #[must_use]
    pub fn from_columns(dataset: &Dataset, columns: &[&str]) -> Self {
        let mut keys = Self::new();
        for column in columns {
            keys.extend_from_column(dataset, column);
        }
        keys
    }

    pub fn extend_from_column(&mut self, dataset: &Dataset, column: &str) {
        if let Some(values) = dataset.column(column) {
            for value in values {
                self.insert_value(value);
            }
        }
    }

    /// Returns `true` when the value produced a new key.
    pub fn insert_value(&mut self, value: &Value) -> bool {
        match value.key_text() {
            Some(key) => self.0.insert(key),
            None => false,
        }
    }

    pub fn insert(&mut self, key: &str) -> bool {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.0.insert(trimmed.to_string())
    }

    pub fn union_with(&mut self, other: &KeySet) {
        self.0.extend(other.0.iter().cloned());
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for KeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut keys = Self::new();
        for key in iter {
            keys.insert(key.as_ref());
        }
        keys
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
