// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub mod canonical;
pub mod env;
mod errors;

pub use canonical::sha256_hex;
pub use errors::{ErrorContext, MachineError, ResultExt};

pub const CRATE_NAME: &str = "fisca-core";

pub const ENV_FISCA_LOG_JSON: &str = "FISCA_LOG_JSON";
pub const ENV_FISCA_LOG_LEVEL: &str = "FISCA_LOG_LEVEL";
