// SPDX-License-Identifier: Apache-2.0

use crate::cache::CacheKey;
use crate::error::LoadError;
use crate::isolate::{guarded, isolate, FetchLimits};
use crate::manifest::SNAPSHOT_MANIFEST;
use crate::Pipeline;
use fisca_core::{sha256_hex, MachineError};
use fisca_model::{Dataset, LoadStatus, ManifestEntry, Snapshot};
use fisca_query::{fetch_dataset, QueryErrorCode, Statement, WarehouseConnection};
use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

pub const SNAPSHOT_OPERATION: &str = "snapshot";

impl Pipeline {
    /// Loads the reporting snapshot, served from cache while it is younger
    /// than the snapshot TTL.
    ///
    /// An unreachable warehouse yields an empty mapping; any other failure is
    /// confined to its own dataset slot. A cancelled load still holds every
    /// manifest name.
    pub async fn load_snapshot(
        &self,
        conn: &dyn WarehouseConnection,
        cancel: &CancellationToken,
    ) -> Snapshot {
        self.load_manifest(conn, SNAPSHOT_MANIFEST, cancel).await
    }

    /// [`Pipeline::load_snapshot`] over an arbitrary manifest.
    pub async fn load_manifest(
        &self,
        conn: &dyn WarehouseConnection,
        manifest: &[ManifestEntry],
        cancel: &CancellationToken,
    ) -> Snapshot {
        let schema = self.config.analytical_schema.as_str();
        let key = CacheKey::new(
            conn.scope(),
            SNAPSHOT_OPERATION,
            manifest_fingerprint(manifest, schema),
        );
        let loaded = self
            .cache
            .get_or_compute(&key, self.config.snapshot_ttl, || {
                fetch_manifest(conn, manifest, schema, &self.limits, cancel)
            })
            .await;
        match loaded {
            Ok(snapshot) => Snapshot::clone(&snapshot),
            Err(LoadError::Cancelled { partial }) => {
                warn!(datasets = partial.len(), "snapshot load cancelled; not cached");
                fill_cancelled(*partial, manifest)
            }
            Err(err) => {
                error!(error = %err, code = err.code(), "snapshot load failed");
                Snapshot::new()
            }
        }
    }
}

/// Probes the warehouse, then fetches every manifest entry concurrently with
/// per-entry fault isolation. Uncached.
pub async fn fetch_manifest(
    conn: &dyn WarehouseConnection,
    manifest: &[ManifestEntry],
    schema: &str,
    limits: &FetchLimits,
    cancel: &CancellationToken,
) -> Result<Snapshot, LoadError> {
    let span = info_span!("load_manifest", scope = conn.scope(), entries = manifest.len());
    async {
        probe(conn, limits, cancel).await?;
        let started = Instant::now();

        let outcomes = join_all(manifest.iter().map(|entry| async move {
            let statement = Statement::new(entry.render_query(schema));
            let outcome = isolate(entry.name, limits, cancel, fetch_dataset(conn, &statement)).await;
            (entry.name, outcome)
        }))
        .await;

        let mut snapshot = Snapshot::new();
        for (name, outcome) in outcomes {
            snapshot.insert(name, outcome.dataset, outcome.status);
        }
        info!(
            datasets = snapshot.len(),
            failed = snapshot.failed_names().len(),
            rows = snapshot.total_rows(),
            megabytes = format_args!("{:.1}", megabytes(snapshot.estimated_bytes())),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot fetched"
        );
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled {
                partial: Box::new(snapshot),
            });
        }
        Ok::<_, LoadError>(snapshot)
    }
    .instrument(span)
    .await
}

/// Connectivity gate shared by the batch loader and the sector view.
pub(crate) async fn probe(
    conn: &dyn WarehouseConnection,
    limits: &FetchLimits,
    cancel: &CancellationToken,
) -> Result<(), LoadError> {
    match guarded(limits, cancel, conn.probe()).await {
        Ok(()) => Ok(()),
        Err(err) if err.code == QueryErrorCode::Cancelled => Err(LoadError::Cancelled {
            partial: Box::default(),
        }),
        Err(err) => {
            error!(scope = conn.scope(), error = %err, "warehouse connectivity probe failed");
            Err(LoadError::Connectivity(err))
        }
    }
}

fn fill_cancelled(mut snapshot: Snapshot, manifest: &[ManifestEntry]) -> Snapshot {
    let status = LoadStatus::Failed {
        error: MachineError::new("cancelled", "load cancelled before the dataset was fetched"),
    };
    for entry in manifest {
        if !snapshot.contains(entry.name) {
            snapshot.insert(entry.name, Dataset::empty(), status.clone());
        }
    }
    snapshot
}

fn manifest_fingerprint(manifest: &[ManifestEntry], schema: &str) -> String {
    let mut material = String::from(schema);
    for entry in manifest {
        material.push('\n');
        material.push_str(entry.name);
        material.push('\t');
        material.push_str(entry.query);
    }
    let mut digest = sha256_hex(material.as_bytes());
    digest.truncate(16);
    digest
}

fn megabytes(bytes: usize) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
