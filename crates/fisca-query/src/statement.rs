// SPDX-License-Identifier: Apache-2.0

use fisca_model::{KeySet, Value};
use std::fmt;

/// Token in a dependent query template expanded into one bound parameter
/// per key.
pub const KEYS_PLACEHOLDER: &str = "{keys}";

/// Parameterized read query. Parameters bind positionally to `?` markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// No keys to filter by; the query must not be issued.
    EmptyKeys,
    MissingPlaceholder,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKeys => f.write_str("inclusion filter has no keys"),
            Self::MissingPlaceholder => {
                write!(f, "query template has no {KEYS_PLACEHOLDER} placeholder")
            }
        }
    }
}

impl std::error::Error for FilterError {}

impl Statement {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Expands `{keys}` in `template` into `?, ?, …` bound to every key.
    ///
    /// An empty key set is refused instead of producing `IN ()`, which some
    /// dialects reject and others treat as unfiltered.
    pub fn with_key_filter(template: &str, keys: &KeySet) -> Result<Self, FilterError> {
        if !template.contains(KEYS_PLACEHOLDER) {
            return Err(FilterError::MissingPlaceholder);
        }
        if keys.is_empty() {
            return Err(FilterError::EmptyKeys);
        }
        let markers = vec!["?"; keys.len()].join(", ");
        Ok(Self {
            sql: template.replacen(KEYS_PLACEHOLDER, &markers, 1),
            params: keys.iter().map(Value::from).collect(),
        })
    }

    /// Single line form of the SQL for log fields.
    #[must_use]
    pub fn compact_sql(&self) -> String {
        self.sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
