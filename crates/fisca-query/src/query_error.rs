// SPDX-License-Identifier: Apache-2.0

use fisca_core::MachineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum QueryErrorCode {
    /// The warehouse could not be reached at all.
    Connectivity,
    Sql,
    Timeout,
    Cancelled,
    Normalize,
}

impl QueryErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Sql => "sql",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Normalize => "normalize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub code: QueryErrorCode,
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn new(code: QueryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn sql(message: impl Into<String>) -> Self {
        Self::new(QueryErrorCode::Sql, message)
    }

    #[must_use]
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(QueryErrorCode::Connectivity, message)
    }

    #[must_use]
    pub fn to_machine_error(&self) -> MachineError {
        MachineError::new(self.code.as_str(), &self.message)
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for QueryError {}

impl From<crate::normalize::NormalizeError> for QueryError {
    fn from(value: crate::normalize::NormalizeError) -> Self {
        Self::new(QueryErrorCode::Normalize, value.to_string())
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::sql(value.to_string())
    }
}
