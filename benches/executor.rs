//! Benchmarks for bounded-concurrency execution
//!
//! Run with: `cargo bench --bench executor`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pacer::{BoundedExecutor, Concurrency};

fn bench_run_across_limits(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("executor");

    for limit in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("run_64_ready_ops", limit), &limit, |b, &limit| {
            let executor = BoundedExecutor::new(Concurrency::Bounded(limit));
            b.to_async(&rt).iter(|| async {
                let operations: Vec<_> = (0..64u32)
                    .map(|i| move || async move { Ok::<_, anyhow::Error>(i) })
                    .collect();
                black_box(executor.run(operations).await)
            });
        });
    }

    group.bench_function("run_64_ready_ops/unbounded", |b| {
        let executor = BoundedExecutor::new(Concurrency::Unbounded);
        b.to_async(&rt).iter(|| async {
            let operations: Vec<_> = (0..64u32)
                .map(|i| move || async move { Ok::<_, anyhow::Error>(i) })
                .collect();
            black_box(executor.run(operations).await)
        });
    });

    group.finish();
}

fn bench_empty_run(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let executor = BoundedExecutor::new(Concurrency::Bounded(4));

    c.bench_function("executor/empty_input", |b| {
        b.to_async(&rt).iter(|| async {
            let operations: Vec<fn() -> futures::future::Ready<anyhow::Result<u32>>> = Vec::new();
            black_box(executor.run(operations).await)
        });
    });
}

criterion_group!(benches, bench_run_across_limits, bench_empty_run);
criterion_main!(benches);
