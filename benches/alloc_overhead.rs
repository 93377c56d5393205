//! Allocation overhead benchmarks.
//!
//! Measures the manager's allocate/release cycle and pool bookkeeping.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use emm_core::{
    CachingDevicePool, DeviceMemoryManager, DevicePool, ManagerConfig, PoolMemoryManager, StreamId,
};

fn bench_memalloc_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("memalloc_release");

    for (name, nbytes) in [
        ("1kb", 1024u64),
        ("64kb", 64 * 1024),
        ("1mb", 1024 * 1024),
    ] {
        let pool = Arc::new(CachingDevicePool::with_capacity(8 * 1024 * 1024 * 1024));
        let manager = PoolMemoryManager::new(ManagerConfig::default());
        manager.bind_pool(pool);

        group.throughput(Throughput::Bytes(nbytes));
        group.bench_function(BenchmarkId::new("cycle", name), |b| {
            b.iter(|| {
                let handle = manager.memalloc(black_box(nbytes), StreamId::DEFAULT).unwrap();
                drop(black_box(handle))
            })
        });
    }

    group.finish();
}

fn bench_defer_cleanup_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("defer_cleanup_scope");

    let pool = Arc::new(CachingDevicePool::with_capacity(1024 * 1024));
    let manager = PoolMemoryManager::new(ManagerConfig::default());
    manager.bind_pool(pool);

    group.bench_function("enter_exit", |b| {
        b.iter(|| {
            let guard = manager.defer_cleanup();
            drop(black_box(guard))
        })
    });

    group.finish();
}

fn bench_pool_cached_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_cached_hit");

    let pool = CachingDevicePool::with_capacity(1024 * 1024);
    group.throughput(Throughput::Elements(1));
    group.bench_function("malloc_free", |b| {
        b.iter(|| {
            let block = pool.malloc(black_box(4096)).unwrap();
            pool.free(&block)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_memalloc_release,
    bench_defer_cleanup_scope,
    bench_pool_cached_hit
);
criterion_main!(benches);
