//! Store Performance Benchmarks
//!
//! - Reducer execution: pure window arithmetic, no store overhead
//! - Action routing: `send` through bindings, commit and selector fan-out
//! - Load round trip: `request_load` to committed items with an in-memory fetcher
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use pagestore_core::{PageAction, PageState, reducers};
use pagestore_runtime::{Store, StoreConfig};
use pagestore_testing::mocks::SliceFetcher;
use std::time::Duration;

fn catalogue() -> SliceFetcher<u32> {
    SliceFetcher::new((0..10_000).collect())
}

/// Benchmark reducer execution in isolation (no Store overhead)
fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("increase_offset", |b| {
        let mut state = PageState::<u32>::default();
        b.iter(|| reducers::increase_offset(&mut state, black_box(&10)));
    });

    group.finish();
}

/// Benchmark synchronous action routing (actions/sec)
fn benchmark_action_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("action_routing");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("increase_limit", |b| {
        let store = Store::with_handle(catalogue(), StoreConfig::default(), runtime.handle().clone());
        b.iter(|| store.increase_limit(black_box(1)));
    });

    for subscribers in [1usize, 10, 100] {
        group.bench_function(format!("increase_offset_{subscribers}_subscribers"), |b| {
            let store = Store::with_handle(catalogue(), StoreConfig::default(), runtime.handle().clone());
            let offset = store.offset();
            let _subs: Vec<_> = (0..subscribers)
                .map(|_| offset.subscribe(|value| {
                    black_box(*value);
                }))
                .collect();

            b.iter(|| store.increase_offset(black_box(1)));
        });
    }

    group.finish();
}

/// Benchmark a full load cycle against an in-memory fetcher
fn benchmark_load_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_round_trip");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("request_load", |b| {
        let store = Store::with_handle(catalogue(), StoreConfig::default(), runtime.handle().clone());
        b.to_async(&runtime).iter(|| async {
            let _ = store
                .send_and_wait_for(
                    PageAction::RequestLoad,
                    PageAction::is_load_outcome,
                    Duration::from_secs(1),
                )
                .await;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_action_routing,
    benchmark_load_round_trip
);
criterion_main!(benches);
