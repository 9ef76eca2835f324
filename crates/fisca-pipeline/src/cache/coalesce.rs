// SPDX-License-Identifier: Apache-2.0

use super::CacheKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key compute locks. Holding a [`ComputeSlot`] for a key means no other
/// caller is computing that key.
///
/// Entity subjects are unbounded (one per CNPJ or document id), so a lock
/// lives only while someone holds or waits on it: [`ComputeCoalescer::release`]
/// removes it once the releasing caller was the last one interested.
#[derive(Default)]
pub(crate) struct ComputeCoalescer {
    inflight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

pub(crate) struct ComputeSlot {
    key: CacheKey,
    lock: Arc<Mutex<()>>,
    guard: OwnedMutexGuard<()>,
}

impl ComputeCoalescer {
    pub(crate) async fn acquire(&self, key: &CacheKey) -> ComputeSlot {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        ComputeSlot {
            key: key.clone(),
            lock,
            guard,
        }
    }

    /// Unlocks `slot` and forgets its key when no other caller holds a clone
    /// of the lock. Waiters clone under the map lock, so the count is exact.
    ///
    /// A slot dropped without release (cancelled compute) leaves its lock in
    /// the map until the next release for that key.
    pub(crate) async fn release(&self, slot: ComputeSlot) {
        let ComputeSlot { key, lock, guard } = slot;
        let mut inflight = self.inflight.lock().await;
        drop(guard);
        // map + `lock`
        if Arc::strong_count(&lock) == 2 {
            inflight.remove(&key);
        }
    }

    pub(crate) async fn tracked_keys(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
