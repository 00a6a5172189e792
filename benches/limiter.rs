//! Benchmarks for the temporal rate limiters
//!
//! Run with: `cargo bench --bench limiter`

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pacer::{Debouncer, KeyedThrottler, Throttler};

fn bench_throttle_immediate_path(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("throttler/immediate_call", |b| {
        // A huge quota keeps every benched call on the immediate path.
        let throttler = {
            let _guard = rt.enter();
            Throttler::new(u32::MAX, Duration::from_secs(3600), |args: u32| async move { args })
                .unwrap()
        };
        b.to_async(&rt).iter(|| async {
            black_box(throttler.call(7).await.unwrap());
        });
    });
}

fn bench_keyed_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("keyed_throttler/immediate_call_8_keys", |b| {
        let throttler = {
            let _guard = rt.enter();
            KeyedThrottler::new(
                u32::MAX,
                Duration::from_secs(3600),
                |args: &u32| args % 8,
                |args: u32| async move { args },
            )
            .unwrap()
        };
        let mut i = 0u32;
        b.to_async(&rt).iter(|| {
            i = i.wrapping_add(1);
            let throttler = &throttler;
            let arg = i;
            async move {
                black_box(throttler.call(arg).await.unwrap());
            }
        });
    });
}

fn bench_debounce_supersede(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("debouncer/supersede_call", |b| {
        let debouncer = {
            let _guard = rt.enter();
            Debouncer::new(Duration::from_secs(3600), |args: u32| async move { args })
        };
        b.to_async(&rt).iter(|| async {
            // Measures the re-arm path; the timer never actually fires.
            black_box(debouncer.call(1));
        });
    });
}

criterion_group!(
    benches,
    bench_throttle_immediate_path,
    bench_keyed_dispatch,
    bench_debounce_supersede
);
criterion_main!(benches);
