// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Cached loaders behind the fisca reporting front end.
//!
//! Three outbound operations hang off [`Pipeline`]: the manifest snapshot
//! ([`Pipeline::load_snapshot`]), the on-demand entity loaders
//! ([`Pipeline::load_entity_detail`] and siblings) and the dependent sector
//! view ([`Pipeline::load_dependent_sector_view`]). Each takes the warehouse
//! connection explicitly and never fails for missing data: absence is an
//! empty dataset in the returned value.

mod batch;
pub mod cache;
mod config;
mod entity;
mod error;
mod isolate;
pub mod manifest;
pub mod orchestrator;
pub mod telemetry;

use std::sync::Arc;

pub use batch::{fetch_manifest, SNAPSHOT_OPERATION};
pub use cache::{CacheKey, CacheManager, CacheMetrics, CacheMetricsSnapshot};
pub use config::{
    PipelineConfig, CONFIG_SCHEMA_VERSION, DEFAULT_AUTHORIZED_OPERATORS,
    ENV_ANALYTICAL_SCHEMA, ENV_AUTHORIZED_OPERATORS, ENV_ENTITY_TTL_SECS,
    ENV_FETCH_TIMEOUT_SECS, ENV_MAX_CONCURRENT_FETCHES, ENV_OPERATIONAL_SCHEMA,
    ENV_SCORE_LIMIT, ENV_SECTOR_VIEW_TTL_SECS, ENV_SNAPSHOT_TTL_SECS,
};
pub use entity::EntityQuery;
pub use error::LoadError;
pub use isolate::{guarded, isolate, FetchLimits, FetchOutcome};

pub use fisca_model::{Dataset, KeySet, LoadStatus, Snapshot, Value};
pub use fisca_query::WarehouseConnection;
pub use tokio_util::sync::CancellationToken;

pub const CRATE_NAME: &str = "fisca-pipeline";

/// Entry point for the presentation layer. Cheap to clone; clones share one
/// cache and one fetch budget.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    cache: Arc<CacheManager>,
    limits: FetchLimits,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, String> {
        Self::with_cache(config, Arc::new(CacheManager::new()))
    }

    pub fn with_cache(config: PipelineConfig, cache: Arc<CacheManager>) -> Result<Self, String> {
        config.validate()?;
        let limits = FetchLimits::new(config.max_concurrent_fetches, config.fetch_timeout);
        Ok(Self {
            config: Arc::new(config),
            cache,
            limits,
        })
    }

    pub fn from_env() -> Result<Self, String> {
        Self::new(PipelineConfig::from_env())
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    #[must_use]
    pub fn limits(&self) -> &FetchLimits {
        &self.limits
    }
}
