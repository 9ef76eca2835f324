// SPDX-License-Identifier: Apache-2.0

use super::CacheKey;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type SharedValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub(crate) struct TimedEntry {
    value: SharedValue,
    created_at: Instant,
    ttl: Duration,
}

impl TimedEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// TTL-only entry table. Expiry is lazy: a stale entry is dropped by the
/// lookup that notices it, or by the sweep every insert runs.
#[derive(Default)]
pub(crate) struct TimedEntries {
    entries: HashMap<CacheKey, TimedEntry>,
}

pub(crate) enum Lookup<V> {
    Hit(Arc<V>),
    Miss,
    Expired,
}

impl TimedEntries {
    pub(crate) fn peek<V: Send + Sync + 'static>(&self, key: &CacheKey) -> Lookup<V> {
        match self.entries.get(key) {
            None => Lookup::Miss,
            Some(entry) if !entry.is_live(Instant::now()) => Lookup::Expired,
            Some(entry) => match Arc::clone(&entry.value).downcast::<V>() {
                Ok(value) => Lookup::Hit(value),
                Err(_) => Lookup::Miss,
            },
        }
    }

    /// Removes `key` only if it is still stale, so a fresh value written by
    /// a concurrent compute survives.
    pub(crate) fn drop_if_stale(&mut self, key: &CacheKey) {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
    }

    pub(crate) fn insert<V: Send + Sync + 'static>(
        &mut self,
        key: CacheKey,
        value: Arc<V>,
        ttl: Duration,
    ) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.entries.insert(
            key,
            TimedEntry {
                value,
                created_at: now,
                ttl,
            },
        );
    }

    pub(crate) fn remove(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
