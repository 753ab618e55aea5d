//! Benchmarks for the diff engine using criterion.

use cosync_index::diff;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Builds a sequence and a copy with every `stride`-th element changed.
fn sequences(size: usize, stride: usize) -> (Vec<u32>, Vec<u32>) {
    let left: Vec<u32> = (0..size as u32).collect();
    let right: Vec<u32> = left
        .iter()
        .map(|&x| if x as usize % stride == 0 { x + size as u32 } else { x })
        .collect();
    (left, right)
}

fn diff_sparse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_sparse_edits");

    for size in [100, 1000, 10000].iter() {
        let (left, right) = sequences(*size, 50);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(diff(&left, &right)));
        });
    }

    group.finish();
}

fn diff_identical_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_identical");

    for size in [1000, 10000].iter() {
        let seq: Vec<u32> = (0..*size as u32).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(diff(&seq, &seq)));
        });
    }

    group.finish();
}

criterion_group!(benches, diff_sparse_benchmark, diff_identical_benchmark);
criterion_main!(benches);
