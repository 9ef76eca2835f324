// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod connection;
pub mod fake;
mod normalize;
mod query_error;
mod sqlite;
mod statement;

pub use connection::{fetch_dataset, fetch_dataset_preserving, RawTable, WarehouseConnection};
pub use normalize::{normalize, normalize_dataset, normalize_preserving, NormalizeError};
pub use query_error::{QueryError, QueryErrorCode};
pub use sqlite::SqliteWarehouse;
pub use statement::{FilterError, Statement, KEYS_PLACEHOLDER};

pub const CRATE_NAME: &str = "fisca-query";
