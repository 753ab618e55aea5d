//! Benchmarks for snapshot reconciliation using criterion.

use cosync_reactive::{KeyedCollection, ObservableList};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// A target that drops every tenth item and appends as many new ones.
fn shifted(size: u32) -> Vec<u32> {
    (0..size).filter(|x| x % 10 != 0).chain(size..size + size / 10).collect()
}

fn list_sync_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_sync_with");

    for size in [100u32, 1000, 10000].iter() {
        let target = shifted(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let list = ObservableList::from_vec((0..size).collect());
                list.sync_with(&target).unwrap();
                black_box(list)
            });
        });
    }

    group.finish();
}

fn keyed_sync_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_sync_with_keys");

    for size in [100u32, 1000, 10000].iter() {
        let target = shifted(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let collection = KeyedCollection::from_vec(|k: &u32| *k, (0..size).collect()).unwrap();
                collection.sync_with_keys(&target, |k| *k).unwrap();
                black_box(collection)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, list_sync_benchmark, keyed_sync_benchmark);
criterion_main!(benches);
