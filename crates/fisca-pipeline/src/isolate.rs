// SPDX-License-Identifier: Apache-2.0

//! Fault isolation for single fetches: every failure mode of one dataset
//! slot is folded into an empty dataset plus a failed load status.

use fisca_model::{Dataset, LoadStatus};
use fisca_query::{QueryError, QueryErrorCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// Shared bounds applied to every remote fetch.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl FetchLimits {
    #[must_use]
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub dataset: Dataset,
    pub status: LoadStatus,
}

impl FetchOutcome {
    #[must_use]
    pub fn skipped(reason: &str) -> Self {
        Self {
            dataset: Dataset::empty(),
            status: LoadStatus::skipped(reason),
        }
    }

    pub(crate) fn failed(err: &QueryError) -> Self {
        Self {
            dataset: Dataset::empty(),
            status: LoadStatus::Failed {
                error: err.to_machine_error(),
            },
        }
    }
}

/// Runs `fetch` under a concurrency permit, racing it against `cancel` and
/// the configured timeout. Errors propagate.
pub async fn guarded<T, F>(
    limits: &FetchLimits,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<T, QueryError>
where
    F: Future<Output = Result<T, QueryError>>,
{
    let _permit = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(cancelled()),
        permit = limits.permits.acquire() => permit.map_err(|_| cancelled())?,
    };
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(cancelled()),
        result = tokio::time::timeout(limits.timeout, fetch) => match result {
            Ok(inner) => inner,
            Err(_) => Err(QueryError::new(
                QueryErrorCode::Timeout,
                format!("fetch exceeded {}s", limits.timeout.as_secs()),
            )),
        },
    }
}

/// [`guarded`], with any error replaced by an empty dataset and reported.
pub async fn isolate<F>(
    name: &str,
    limits: &FetchLimits,
    cancel: &CancellationToken,
    fetch: F,
) -> FetchOutcome
where
    F: Future<Output = Result<Dataset, QueryError>>,
{
    let span = info_span!("fetch", dataset = name);
    async {
        match guarded(limits, cancel, fetch).await {
            Ok(dataset) => {
                debug!(rows = dataset.len(), "dataset fetched");
                FetchOutcome {
                    status: LoadStatus::for_dataset(&dataset),
                    dataset,
                }
            }
            Err(err) => {
                warn!(dataset = name, error = %err, "dataset fetch failed; substituting empty dataset");
                FetchOutcome::failed(&err)
            }
        }
    }
    .instrument(span)
    .await
}

fn cancelled() -> QueryError {
    QueryError::new(QueryErrorCode::Cancelled, "fetch cancelled by caller")
}
