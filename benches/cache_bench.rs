//! Benchmarks for the cache engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use block_meta_cache::cache::{BlockCache, EvictionPolicy};
use block_meta_cache::config::CacheConfig;

fn filled_cache(policy: EvictionPolicy, entries: u64) -> BlockCache {
    let cache = BlockCache::new(CacheConfig {
        enabled: true,
        capacity_bytes: entries * 4096 + 1,
        policy,
    });
    for i in 0..entries {
        cache.put(&format!("blk-{i}"), 4096, "").unwrap();
    }
    cache
}

fn bench_get_hit(c: &mut Criterion) {
    let cache = filled_cache(EvictionPolicy::Lfu, 10_000);

    c.bench_function("lfu_get_hit_10k", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 10_000;
            black_box(cache.get(&format!("blk-{i}")).unwrap());
        })
    });
}

fn bench_put_with_eviction(c: &mut Criterion) {
    for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu] {
        let cache = filled_cache(policy, 10_000);
        let mut next = 10_000u64;

        c.bench_function(&format!("{}_put_evicting_10k", policy.as_str().to_lowercase()), |b| {
            b.iter(|| {
                next += 1;
                black_box(cache.put(&format!("blk-{next}"), 4096, "").unwrap());
            })
        });
    }
}

criterion_group!(benches, bench_get_hit, bench_put_with_eviction);
criterion_main!(benches);
