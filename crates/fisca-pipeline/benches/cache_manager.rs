// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, Criterion};
use fisca_pipeline::{CacheKey, CacheManager};
use std::sync::Arc;
use std::time::Duration;

fn bench_cache_hits(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let cache = CacheManager::new();
    let keys: Vec<CacheKey> = (0..64)
        .map(|i| CacheKey::new("bench", "entity_detail", format!("{i:014}")))
        .collect();
    runtime.block_on(async {
        for key in &keys {
            let _: Arc<u64> = cache
                .get_or_compute(key, Duration::from_secs(3600), || async { Ok::<_, String>(1) })
                .await
                .expect("warm");
        }
    });

    c.bench_function("cache_hit_64_keys", |b| {
        b.to_async(&runtime).iter(|| async {
            for key in &keys {
                let _: Arc<u64> = cache
                    .get_or_compute(key, Duration::from_secs(3600), || async {
                        Ok::<_, String>(0)
                    })
                    .await
                    .expect("hit");
            }
        })
    });
}

criterion_group!(benches, bench_cache_hits);
criterion_main!(benches);
