/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Microbenchmarks for the hot compressed kernels: decompression, the
//! transpose-self product and left multiplication over a synthetic DDC
//! matrix.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use cola::colgroup::encode;
use cola::CompressedMatrix;
use cola_block::MatrixBlock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn synthetic(rows: usize, cols: usize, distinct: usize) -> (CompressedMatrix, MatrixBlock) {
    let mut rng = StdRng::seed_from_u64(7);
    let pool: Vec<f64> = (0..distinct)
        .map(|i| if i == 0 { 0.0 } else { rng.random_range(-4.0..4.0) })
        .collect();
    let values: Vec<f64> = (0..rows * cols)
        .map(|_| pool[rng.random_range(0..pool.len())])
        .collect();
    let dense = MatrixBlock::from_dense(rows, cols, values);
    let groups = (0..cols as u32)
        .step_by(2)
        .map(|c| {
            let width: Vec<u32> = (c..(c + 2).min(cols as u32)).collect();
            encode::encode_ddc(&dense, &width)
        })
        .collect();
    let m = CompressedMatrix::from_groups(rows, cols, groups, false).unwrap();
    (m, dense)
}

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");
    for &rows in &[1_000usize, 10_000] {
        let (m, _) = synthetic(rows, 16, 8);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &m, |b, m| {
            b.iter(|| {
                m.clear_cached_decompressed();
                black_box(m.decompress(1))
            });
        });
    }
    group.finish();
}

fn bench_tsmm(c: &mut Criterion) {
    let mut group = c.benchmark_group("tsmm");
    for &rows in &[1_000usize, 10_000] {
        let (m, _) = synthetic(rows, 16, 8);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &m, |b, m| {
            b.iter(|| black_box(m.tsmm_left(1)));
        });
    }
    group.finish();
}

fn bench_left_mult(c: &mut Criterion) {
    let mut group = c.benchmark_group("left_mult");
    let (m, _) = synthetic(4_000, 16, 8);
    let mut rng = StdRng::seed_from_u64(8);
    let left_values: Vec<f64> = (0..8 * 4_000).map(|_| rng.random_range(-1.0..1.0)).collect();
    let left = MatrixBlock::from_dense(8, 4_000, left_values);
    group.bench_function("8x4000", |b| {
        b.iter(|| black_box(m.left_mult(&left, 1).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_decompress, bench_tsmm, bench_left_mult);
criterion_main!(benches);
