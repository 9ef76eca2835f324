// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Tabular data model shared by the fisca loaders.
//!
//! A [`Dataset`] is an ordered table with lower-case, unique column names.
//! Loaders never hand out partially built tables: failures and absent data
//! are represented in-band as empty datasets, with the reason kept in the
//! [`LoadStatus`] recorded next to each name in a [`Snapshot`].

mod dataset;
mod keys;
mod manifest;
mod snapshot;
mod value;

pub use dataset::{Dataset, ValidationError};
pub use keys::KeySet;
pub use manifest::{validate_manifest, ManifestEntry, ResultKind, SCHEMA_PLACEHOLDER};
pub use snapshot::{LoadStatus, Snapshot};
pub use value::Value;

pub const CRATE_NAME: &str = "fisca-model";
