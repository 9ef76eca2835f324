// SPDX-License-Identifier: Apache-2.0

//! The dependent sector view: a root query filtered by the authorized
//! operators, then staged queries filtered by key sets extracted from
//! earlier results.
//!
//! Stage boundaries are hard: a stage derives its key sets only after every
//! fetch of the previous stage resolved. Within a stage fetches run
//! concurrently and in no particular order.

mod stages;

pub use stages::{
    validate_plan, DependentQuery, KeyDerivation, KeyInput, KeyName, SectorPlan, Stage,
    ROOT_DATASET, ROOT_QUERY, SECTOR_PLAN,
};

use crate::batch::probe;
use crate::cache::CacheKey;
use crate::error::LoadError;
use crate::isolate::{guarded, isolate, FetchLimits, FetchOutcome};
use crate::Pipeline;
use fisca_core::sha256_hex;
use fisca_model::{Dataset, KeySet, LoadStatus, Snapshot, SCHEMA_PLACEHOLDER};
use fisca_query::{
    fetch_dataset_preserving, FilterError, QueryError, QueryErrorCode, Statement, WarehouseConnection,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

pub const SECTOR_VIEW_OPERATION: &str = "sector_view";

const ROOT_EMPTY: &str = "root dataset is empty";
const KEYS_EMPTY: &str = "driving key set is empty";

type KeySets = BTreeMap<KeyName, KeySet>;

impl Pipeline {
    /// Loads the sector view for the configured operators. The returned
    /// snapshot always holds every planned dataset name.
    pub async fn load_dependent_sector_view(
        &self,
        conn: &dyn WarehouseConnection,
        cancel: &CancellationToken,
    ) -> Snapshot {
        self.load_sector_plan(conn, &SECTOR_PLAN, cancel).await
    }

    pub async fn load_sector_plan(
        &self,
        conn: &dyn WarehouseConnection,
        plan: &SectorPlan,
        cancel: &CancellationToken,
    ) -> Snapshot {
        let schema = self.config.operational_schema.as_str();
        let operators: KeySet = self.config.authorized_operators.iter().collect();
        let key = CacheKey::new(
            conn.scope(),
            SECTOR_VIEW_OPERATION,
            plan_fingerprint(plan, schema, &operators),
        );
        let loaded = self
            .cache
            .get_or_compute(&key, self.config.sector_view_ttl, || {
                run_plan(conn, plan, schema, &operators, &self.limits, cancel)
            })
            .await;
        match loaded {
            Ok(snapshot) => Snapshot::clone(&snapshot),
            Err(err) => {
                let status = LoadStatus::Failed {
                    error: fisca_core::MachineError::new(err.code(), &err.to_string()),
                };
                match err {
                    LoadError::Cancelled { partial } => {
                        warn!(datasets = partial.len(), "sector view cancelled; not cached");
                        fill_missing(*partial, plan, &status)
                    }
                    other => {
                        error!(error = %other, code = other.code(), "sector view failed");
                        Snapshot::empty_for(plan.dataset_names(), &status)
                    }
                }
            }
        }
    }
}

/// Runs `plan` uncached: probe, root, then each stage in order.
///
/// A root that fails is an error (nothing downstream can be keyed); a root
/// that returns no rows short-circuits every dependent to a skipped slot.
pub async fn run_plan(
    conn: &dyn WarehouseConnection,
    plan: &SectorPlan,
    schema: &str,
    operators: &KeySet,
    limits: &FetchLimits,
    cancel: &CancellationToken,
) -> Result<Snapshot, LoadError> {
    probe(conn, limits, cancel).await?;

    let mut keys = KeySets::new();
    keys.insert(KeyName::Operators, operators.clone());

    let preserve = plan.key_columns();
    let root = fetch_root(conn, &plan.root, schema, &keys, &preserve, limits, cancel).await?;
    let mut snapshot = Snapshot::new();
    if root.is_empty() {
        info!(dataset = plan.root.name, "root dataset empty; dependent queries skipped");
        snapshot.insert(plan.root.name, root, LoadStatus::Empty);
        for name in plan.dependent_names() {
            snapshot.insert(name, Dataset::empty(), LoadStatus::skipped(ROOT_EMPTY));
        }
        return Ok(snapshot);
    }
    let status = LoadStatus::for_dataset(&root);
    snapshot.insert(plan.root.name, root, status);

    for stage in plan.stages {
        let span = info_span!("stage", stage = stage.name, queries = stage.queries.len());
        run_stage(conn, stage, schema, &mut snapshot, &mut keys, &preserve, limits, cancel)
            .instrument(span)
            .await;
    }

    info!(
        datasets = snapshot.len(),
        failed = snapshot.failed_names().len(),
        rows = snapshot.total_rows(),
        "sector view fetched"
    );
    if cancel.is_cancelled() {
        return Err(LoadError::Cancelled {
            partial: Box::new(snapshot),
        });
    }
    Ok(snapshot)
}

async fn fetch_root(
    conn: &dyn WarehouseConnection,
    root: &DependentQuery,
    schema: &str,
    keys: &KeySets,
    preserve: &[&str],
    limits: &FetchLimits,
    cancel: &CancellationToken,
) -> Result<Dataset, LoadError> {
    let fetched = match statement_for(root, schema, keys) {
        Ok(Some(statement)) => {
            let span = info_span!("fetch", dataset = root.name);
            guarded(limits, cancel, fetch_dataset_preserving(conn, &statement, preserve))
                .instrument(span)
                .await
        }
        Ok(None) => Ok(Dataset::empty()),
        Err(err) => Err(QueryError::sql(err.to_string())),
    };
    match fetched {
        Ok(dataset) => Ok(dataset),
        Err(err) if err.code == QueryErrorCode::Cancelled => Err(LoadError::Cancelled {
            partial: Box::default(),
        }),
        Err(err) => {
            error!(dataset = root.name, error = %err, "root query failed");
            Err(LoadError::RootFailed(err))
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_stage(
    conn: &dyn WarehouseConnection,
    stage: &Stage,
    schema: &str,
    snapshot: &mut Snapshot,
    keys: &mut KeySets,
    preserve: &[&str],
    limits: &FetchLimits,
    cancel: &CancellationToken,
) {
    for derivation in stage.derives {
        let set = derive_keys(snapshot, derivation);
        debug!(key = derivation.key.as_str(), size = set.len(), "key set derived");
        keys.insert(derivation.key, set);
    }

    let keys: &KeySets = keys;
    let outcomes = join_all(
        stage
            .queries
            .iter()
            .map(|query| run_query(conn, query, schema, keys, preserve, limits, cancel)),
    )
    .await;
    for (name, outcome) in outcomes {
        snapshot.insert(name, outcome.dataset, outcome.status);
    }
}

async fn run_query(
    conn: &dyn WarehouseConnection,
    query: &DependentQuery,
    schema: &str,
    keys: &KeySets,
    preserve: &[&str],
    limits: &FetchLimits,
    cancel: &CancellationToken,
) -> (&'static str, FetchOutcome) {
    let outcome = match statement_for(query, schema, keys) {
        Ok(Some(statement)) => {
            isolate(
                query.name,
                limits,
                cancel,
                fetch_dataset_preserving(conn, &statement, preserve),
            )
            .await
        }
        Ok(None) => {
            debug!(dataset = query.name, "driving key set empty; query not issued");
            FetchOutcome::skipped(KEYS_EMPTY)
        }
        Err(err) => {
            let err = QueryError::sql(err.to_string());
            warn!(dataset = query.name, error = %err, "query could not be built");
            FetchOutcome::failed(&err)
        }
    };
    (query.name, outcome)
}

/// `Ok(None)` when the query is keyed and its key set is empty.
fn statement_for(
    query: &DependentQuery,
    schema: &str,
    keys: &KeySets,
) -> Result<Option<Statement>, FilterError> {
    let sql = query.template.replace(SCHEMA_PLACEHOLDER, schema);
    match query.input {
        KeyInput::Unfiltered => Ok(Some(Statement::new(sql))),
        KeyInput::Keys(name) => match keys.get(&name) {
            Some(set) if !set.is_empty() => Statement::with_key_filter(&sql, set).map(Some),
            _ => Ok(None),
        },
    }
}

fn derive_keys(snapshot: &Snapshot, derivation: &KeyDerivation) -> KeySet {
    let mut set = KeySet::new();
    for name in derivation.datasets {
        let Some(dataset) = snapshot.get(name) else {
            continue;
        };
        if dataset.is_empty() {
            continue;
        }
        set.union_with(&KeySet::from_columns(dataset, derivation.columns));
    }
    set
}

fn fill_missing(mut snapshot: Snapshot, plan: &SectorPlan, status: &LoadStatus) -> Snapshot {
    for name in plan.dataset_names() {
        if !snapshot.contains(name) {
            snapshot.insert(name, Dataset::empty(), status.clone());
        }
    }
    snapshot
}

fn plan_fingerprint(plan: &SectorPlan, schema: &str, operators: &KeySet) -> String {
    let mut material = String::from(schema);
    for operator in operators {
        material.push('\n');
        material.push_str(operator);
    }
    material.push_str("\n--\n");
    material.push_str(plan.root.template);
    for stage in plan.stages {
        for query in stage.queries {
            material.push('\n');
            material.push_str(query.name);
            material.push('\t');
            material.push_str(query.template);
        }
    }
    let mut digest = sha256_hex(material.as_bytes());
    digest.truncate(16);
    digest
}
