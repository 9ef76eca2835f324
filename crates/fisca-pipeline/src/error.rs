// SPDX-License-Identifier: Apache-2.0

use fisca_model::Snapshot;
use fisca_query::QueryError;
use std::fmt;

/// Conditions that stop a whole loader operation. Per-dataset failures never
/// surface here; they are recorded in the snapshot's load status instead.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoadError {
    /// The warehouse did not answer the connectivity probe.
    Connectivity(QueryError),
    /// The sector view's root query failed, so no dependent keys exist.
    RootFailed(QueryError),
    /// The caller cancelled the operation. Carries whatever was gathered.
    Cancelled { partial: Box<Snapshot> },
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "connectivity",
            Self::RootFailed(_) => "root_failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity(err) => write!(f, "warehouse unreachable: {err}"),
            Self::RootFailed(err) => write!(f, "root query failed: {err}"),
            Self::Cancelled { partial } => {
                write!(f, "cancelled after {} dataset(s)", partial.len())
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connectivity(err) | Self::RootFailed(err) => Some(err),
            Self::Cancelled { .. } => None,
        }
    }
}
