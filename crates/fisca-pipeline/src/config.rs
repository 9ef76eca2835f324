// SPDX-License-Identifier: Apache-2.0

use fisca_core::env::{env_duration_secs, env_list, env_string, env_usize};
use serde::Serialize;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub const ENV_ANALYTICAL_SCHEMA: &str = "FISCA_ANALYTICAL_SCHEMA";
pub const ENV_OPERATIONAL_SCHEMA: &str = "FISCA_OPERATIONAL_SCHEMA";
pub const ENV_AUTHORIZED_OPERATORS: &str = "FISCA_AUTHORIZED_OPERATORS";
pub const ENV_SNAPSHOT_TTL_SECS: &str = "FISCA_SNAPSHOT_TTL_SECS";
pub const ENV_ENTITY_TTL_SECS: &str = "FISCA_ENTITY_TTL_SECS";
pub const ENV_SECTOR_VIEW_TTL_SECS: &str = "FISCA_SECTOR_VIEW_TTL_SECS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FISCA_FETCH_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENT_FETCHES: &str = "FISCA_MAX_CONCURRENT_FETCHES";
pub const ENV_SCORE_LIMIT: &str = "FISCA_SCORE_LIMIT";

pub const DEFAULT_AUTHORIZED_OPERATORS: &[&str] = &["9507248", "6172598"];

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Schema of the pre-aggregated reporting tables.
    pub analytical_schema: String,
    /// Schema of the raw sector tables read by the sector view.
    pub operational_schema: String,
    pub authorized_operators: Vec<String>,
    pub snapshot_ttl: Duration,
    pub entity_ttl: Duration,
    pub sector_view_ttl: Duration,
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub default_score_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analytical_schema: "teste".to_string(),
            operational_schema: "usr_sat_ods".to_string(),
            authorized_operators: DEFAULT_AUTHORIZED_OPERATORS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            snapshot_ttl: Duration::from_secs(3600),
            entity_ttl: Duration::from_secs(1800),
            sector_view_ttl: Duration::from_secs(1800),
            fetch_timeout: Duration::from_secs(120),
            max_concurrent_fetches: 8,
            default_score_limit: 1000,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            analytical_schema: env_string(ENV_ANALYTICAL_SCHEMA, &d.analytical_schema),
            operational_schema: env_string(ENV_OPERATIONAL_SCHEMA, &d.operational_schema),
            authorized_operators: env_list(ENV_AUTHORIZED_OPERATORS, DEFAULT_AUTHORIZED_OPERATORS),
            snapshot_ttl: env_duration_secs(ENV_SNAPSHOT_TTL_SECS, d.snapshot_ttl.as_secs()),
            entity_ttl: env_duration_secs(ENV_ENTITY_TTL_SECS, d.entity_ttl.as_secs()),
            sector_view_ttl: env_duration_secs(
                ENV_SECTOR_VIEW_TTL_SECS,
                d.sector_view_ttl.as_secs(),
            ),
            fetch_timeout: env_duration_secs(ENV_FETCH_TIMEOUT_SECS, d.fetch_timeout.as_secs()),
            max_concurrent_fetches: env_usize(
                ENV_MAX_CONCURRENT_FETCHES,
                d.max_concurrent_fetches,
            ),
            default_score_limit: env_usize(ENV_SCORE_LIMIT, d.default_score_limit),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.snapshot_ttl.is_zero() || self.entity_ttl.is_zero() || self.sector_view_ttl.is_zero()
        {
            return Err("cache ttls must be > 0".to_string());
        }
        if self.fetch_timeout.is_zero() {
            return Err("fetch timeout must be > 0".to_string());
        }
        if self.max_concurrent_fetches == 0 {
            return Err("max concurrent fetches must be > 0".to_string());
        }
        if self.default_score_limit == 0 {
            return Err("default score limit must be > 0".to_string());
        }
        for schema in [&self.analytical_schema, &self.operational_schema] {
            if !is_identifier(schema) {
                return Err(format!("schema name {schema:?} is not a plain identifier"));
            }
        }
        if self.authorized_operators.iter().all(|op| op.trim().is_empty()) {
            return Err("at least one authorized operator is required".to_string());
        }
        Ok(())
    }
}

// Schemas are spliced into SQL text, so only plain identifiers are accepted.
fn is_identifier(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
