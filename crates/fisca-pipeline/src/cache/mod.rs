// SPDX-License-Identifier: Apache-2.0

//! Keyed, time-boxed memoization shared by every loader.
//!
//! A live entry (age below its TTL) is returned without running the compute
//! future. Concurrent callers for the same key are coalesced so that at most
//! one compute runs per key; failed computes are never stored.

mod coalesce;
mod hot;

use coalesce::ComputeCoalescer;
use hot::{Lookup, TimedEntries};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache identity: the warehouse scope, the loader operation and its subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    scope: String,
    operation: &'static str,
    subject: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(scope: &str, operation: &'static str, subject: impl Into<String>) -> Self {
        Self {
            scope: scope.to_string(),
            operation,
            subject: subject.into(),
        }
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.scope, self.operation, self.subject)
    }
}

#[derive(Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
    pub coalesced: AtomicU64,
    pub computes: AtomicU64,
    pub compute_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub coalesced: u64,
    pub computes: u64,
    pub compute_failures: u64,
}

impl CacheMetrics {
    #[must_use]
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computes: self.computes.load(Ordering::Relaxed),
            compute_failures: self.compute_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
pub struct CacheManager {
    entries: RwLock<TimedEntries>,
    coalescer: ComputeCoalescer,
    metrics: CacheMetrics,
}

impl CacheManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Returns the live value under `key`, or runs `compute` once and stores
    /// its success for `ttl`.
    pub async fn get_or_compute<V, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<V>, E>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup::<V>(key).await {
            self.metrics.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache_key = %key, "cache hit");
            return Ok(value);
        }
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);

        let slot = self.coalescer.acquire(key).await;
        let result = self.compute_locked(key, ttl, compute).await;
        self.coalescer.release(slot).await;
        result
    }

    /// Second half of [`CacheManager::get_or_compute`], run while holding the
    /// key's compute slot.
    async fn compute_locked<V, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<V>, E>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup::<V>(key).await {
            self.metrics.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(cache_key = %key, "cache filled by concurrent compute");
            return Ok(value);
        }

        self.metrics.computes.fetch_add(1, Ordering::Relaxed);
        match compute().await {
            Ok(value) => {
                let value = Arc::new(value);
                self.entries
                    .write()
                    .await
                    .insert(key.clone(), Arc::clone(&value), ttl);
                debug!(cache_key = %key, ttl_secs = ttl.as_secs(), "cache stored");
                Ok(value)
            }
            Err(err) => {
                self.metrics.compute_failures.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = %key, "compute failed; nothing stored");
                Err(err)
            }
        }
    }

    async fn lookup<V: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<V>> {
        let found = self.entries.read().await.peek::<V>(key);
        match found {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
            Lookup::Expired => {
                self.metrics.expired.fetch_add(1, Ordering::Relaxed);
                self.entries.write().await.drop_if_stale(key);
                None
            }
        }
    }

    /// Drops the entry for `key`; the next request recomputes it.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Stored entries. A stale one lingers until a lookup of its key or the
    /// next store sweeps it.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys with a compute running or queued.
    pub async fn tracked_keys(&self) -> usize {
        self.coalescer.tracked_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn key(subject: &str) -> CacheKey {
        CacheKey::new("test", "unit", subject)
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_a_hit() {
        let cache = CacheManager::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let v: Arc<u32> = cache
                .get_or_compute(&key("a"), Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .expect("compute");
            assert_eq!(*v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let m = cache.metrics().snapshot();
        assert_eq!((m.hits, m.misses, m.computes), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_at_exactly_ttl_age_is_stale() {
        let cache = CacheManager::new();
        let ttl = Duration::from_secs(10);
        let _: Arc<u32> = cache
            .get_or_compute(&key("a"), ttl, || async { Ok::<_, String>(1) })
            .await
            .expect("first");
        tokio::time::advance(ttl).await;
        let v: Arc<u32> = cache
            .get_or_compute(&key("a"), ttl, || async { Ok::<_, String>(2) })
            .await
            .expect("second");
        assert_eq!(*v, 2);
        assert_eq!(cache.metrics().snapshot().expired, 1);
    }

    #[tokio::test]
    async fn type_mismatch_under_same_key_recomputes() {
        let cache = CacheManager::new();
        let _: Arc<u32> = cache
            .get_or_compute(&key("a"), Duration::from_secs(60), || async {
                Ok::<_, String>(1)
            })
            .await
            .expect("u32");
        let s: Arc<String> = cache
            .get_or_compute(&key("a"), Duration::from_secs(60), || async {
                Ok::<_, String>("x".to_string())
            })
            .await
            .expect("string");
        assert_eq!(s.as_str(), "x");
    }

    #[tokio::test]
    async fn invalidate_and_clear_drop_entries() {
        let cache = CacheManager::new();
        for subject in ["a", "b"] {
            let _: Arc<u8> = cache
                .get_or_compute(&key(subject), Duration::from_secs(60), || async {
                    Ok::<_, String>(0)
                })
                .await
                .expect("compute");
        }
        assert_eq!(cache.len().await, 2);
        assert!(cache.invalidate(&key("a")).await);
        assert!(!cache.invalidate(&key("a")).await);
        assert_eq!(cache.len().await, 1);
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[test]
    fn key_display_joins_parts() {
        assert_eq!(
            CacheKey::new("sqlite:/tmp/w", "entity_detail", "123").to_string(),
            "sqlite:/tmp/w/entity_detail/123"
        );
    }
}
