// SPDX-License-Identifier: Apache-2.0

use crate::dataset::ValidationError;
use serde::Serialize;
use std::collections::BTreeSet;

/// Token in a query template replaced by the configured warehouse schema.
pub const SCHEMA_PLACEHOLDER: &str = "{schema}";

pub const DATASET_NAME_MAX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ResultKind {
    /// Whole pre-aggregated table.
    Full,
    /// Reduced projection meant for pickers and lookups.
    Summary,
    /// One or a handful of rows of computed statistics.
    Aggregate,
}

impl ResultKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Summary => "summary",
            Self::Aggregate => "aggregate",
        }
    }
}

/// One independently fetchable dataset of the batch manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub name: &'static str,
    pub query: &'static str,
    pub kind: ResultKind,
}

impl ManifestEntry {
    #[must_use]
    pub const fn new(name: &'static str, query: &'static str, kind: ResultKind) -> Self {
        Self { name, query, kind }
    }

    #[must_use]
    pub fn render_query(&self, schema: &str) -> String {
        self.query.replace(SCHEMA_PLACEHOLDER, schema)
    }
}

/// Checks that entry names are well formed and unique and queries are non-empty.
pub fn validate_manifest(entries: &[ManifestEntry]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for entry in entries {
        validate_name(entry.name)?;
        if !seen.insert(entry.name) {
            return Err(ValidationError(format!(
                "duplicate manifest entry `{}`",
                entry.name
            )));
        }
        if entry.query.trim().is_empty() {
            return Err(ValidationError(format!(
                "manifest entry `{}` has an empty query",
                entry.name
            )));
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError(
            "manifest entry name must not be empty".to_string(),
        ));
    }
    if name.len() > DATASET_NAME_MAX_LEN {
        return Err(ValidationError(format!(
            "manifest entry name `{name}` exceeds {DATASET_NAME_MAX_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError(format!(
            "manifest entry name `{name}` must contain only [a-z0-9_]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_query_substitutes_every_schema_token() {
        let entry = ManifestEntry::new(
            "joined",
            "SELECT * FROM {schema}.a JOIN {schema}.b USING (id)",
            ResultKind::Full,
        );
        assert_eq!(
            entry.render_query("teste"),
            "SELECT * FROM teste.a JOIN teste.b USING (id)"
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let entries = [
            ManifestEntry::new("a", "SELECT 1", ResultKind::Full),
            ManifestEntry::new("a", "SELECT 2", ResultKind::Aggregate),
        ];
        let err = validate_manifest(&entries).expect_err("duplicate");
        assert!(err.0.contains("duplicate"));
    }

    #[test]
    fn malformed_names_and_blank_queries_are_rejected() {
        assert!(validate_manifest(&[ManifestEntry::new("Bad-Name", "SELECT 1", ResultKind::Full)]).is_err());
        assert!(validate_manifest(&[ManifestEntry::new("ok", "  ", ResultKind::Full)]).is_err());
        assert!(validate_manifest(&[ManifestEntry::new("ok_1", "SELECT 1", ResultKind::Summary)]).is_ok());
    }
}
