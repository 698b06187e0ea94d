//! Allocator stack benchmarks.
//!
//! Measures the slab's fixed-block alloc/free cycle against a boxed-slice
//! baseline, and matrix routing overhead as the bucket count grows.
//!
//! Run with: `cargo bench --bench alloc_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cairn_alloc::prelude::*;

// ---------------------------------------------------------------------------
// Slab: alloc/free cycle
// ---------------------------------------------------------------------------

fn bench_slab_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("slab_alloc_free_cycle");

    for &block_size in &[32usize, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &block_size| {
                let mut slab = SlabAllocator::new(SystemPages, 64, block_size);
                // Warm one page so the cycle measures the steady state.
                let warm = slab.allocate().unwrap();
                slab.free(warm);

                b.iter(|| {
                    let block = slab.allocate().unwrap();
                    black_box(block);
                    slab.free(block);
                });
            },
        );
    }

    group.bench_function("boxed_baseline_256", |b| {
        b.iter(|| {
            let block = vec![0u8; 256].into_boxed_slice();
            black_box(&block);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Matrix: routing across buckets
// ---------------------------------------------------------------------------

fn bench_matrix_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_routing");

    for &buckets in &[4usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(buckets),
            &buckets,
            |b, &buckets| {
                let mut matrix = MatrixAllocator::new(SystemPages, 64);
                // Open the buckets up front; the benchmark measures lookup
                // plus slab forwarding, not bucket creation.
                let sizes: Vec<usize> = (1..=buckets).map(|i| i * 16).collect();
                for &size in &sizes {
                    let warm = matrix.allocate(size).unwrap();
                    matrix.free(warm);
                }

                let mut cursor = 0;
                b.iter(|| {
                    let size = sizes[cursor % sizes.len()];
                    cursor += 1;
                    let block = matrix.allocate(size).unwrap();
                    black_box(block);
                    matrix.free(block);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_slab_cycle, bench_matrix_routing);
criterion_main!(benches);
