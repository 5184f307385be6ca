/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Concrete acceptance scenarios: the constant matrix, the identity
//! encoding, overlap production, serialization fallback, the chain, and
//! parallel determinism.

use std::sync::Arc;

use approx::assert_relative_eq;
use cola::colgroup::{encode, ColGroup, ColGroupKind};
use cola::{io, AggDir, AggKind, AggOp, CompressedMatrix};
use cola_block::MatrixBlock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scenario 1: a rank-one constant matrix compresses to a single CONST
/// group with the expected aggregates and tsmm.
#[test]
fn constant_matrix() {
    let dense = MatrixBlock::from_rows(&[
        &[1.0, 1.0, 2.0],
        &[1.0, 1.0, 2.0],
        &[1.0, 1.0, 2.0],
    ]);
    let group = encode::encode_ddc(&dense, &[0, 1, 2]);
    assert_eq!(group.kind(), ColGroupKind::Const);
    let m = CompressedMatrix::from_groups(3, 3, vec![group], false).unwrap();

    assert_eq!(m.sum(1), 12.0);
    assert_eq!(m.min(1), 1.0);
    assert_eq!(m.max(1), 2.0);
    let col_sums = m.aggregate_unary(AggOp::new(AggKind::Sum, AggDir::Col), 1);
    assert_eq!(col_sums.get(0, 0), 3.0);
    assert_eq!(col_sums.get(0, 1), 3.0);
    assert_eq!(col_sums.get(0, 2), 6.0);

    let tsmm = m.tsmm_left(1);
    let expected_upper = [
        [3.0, 3.0, 6.0],
        [3.0, 3.0, 6.0],
        [6.0, 6.0, 12.0],
    ];
    for p in 0..3 {
        for q in 0..3 {
            assert_eq!(tsmm.get(p, q), expected_upper[p][q], "({p},{q})");
        }
    }
}

/// Scenario 2: the 4x4 identity as a DDC group over all columns.
#[test]
fn identity_matrix() {
    let dense = MatrixBlock::identity(4);
    let group = encode::encode_ddc(&dense, &[0, 1, 2, 3]);
    assert_eq!(group.kind(), ColGroupKind::Ddc);
    let m = CompressedMatrix::from_groups(4, 4, vec![group], false).unwrap();

    let out = m.decompress(1);
    for r in 0..4 {
        for c in 0..4 {
            assert_eq!(out.get(r, c), f64::from(r == c), "({r},{c})");
        }
    }

    let row_sums = m.aggregate_unary(AggOp::new(AggKind::Sum, AggDir::Row), 1);
    for r in 0..4 {
        assert_eq!(row_sums.get(r, 0), 1.0);
    }

    let tsmm = m.tsmm_left(1);
    for p in 0..4 {
        for q in 0..4 {
            assert_eq!(tsmm.get(p, q), f64::from(p == q), "({p},{q})");
        }
    }
}

/// Scenario 3: right-multiplication with overlap permitted yields two
/// groups over the same columns; reads sum and decompression matches.
#[test]
fn overlap_production() {
    let dense = MatrixBlock::from_rows(&[&[1.0, 2.0], &[3.0, 1.0], &[1.0, 2.0]]);
    let m = CompressedMatrix::from_groups(
        3,
        2,
        vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_ddc(&dense, &[1]),
        ],
        false,
    )
    .unwrap();
    let right = MatrixBlock::from_rows(&[&[1.0, 0.0, 1.0], &[0.5, 2.0, 0.0]]);

    let out = m.right_mult(&right, 1, true).unwrap();
    let c = out.as_compressed().expect("overlap result stays compressed");
    assert!(c.is_overlapping());
    assert_eq!(c.col_groups().len(), 2);
    for g in c.col_groups() {
        assert_eq!(g.col_indices(), &[0, 1, 2]);
    }

    let want = dense.multiply(&right, 1).unwrap();
    for r in 0..3 {
        for cc in 0..3 {
            assert_relative_eq!(c.get(r, cc), want.get(r, cc), max_relative = 1e-12);
        }
    }
    let decompressed = c.decompress(1);
    for r in 0..3 {
        for cc in 0..3 {
            assert_relative_eq!(
                decompressed.get(r, cc),
                want.get(r, cc),
                max_relative = 1e-12
            );
        }
    }
}

/// Scenario 4: a dense random matrix with (almost) all-distinct values
/// serializes through the dense fallback into one UNCOMPRESSED group.
#[test]
fn serialization_fallback() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let values: Vec<f64> = (0..100 * 100).map(|_| rng.random::<f64>()).collect();
    let dense = MatrixBlock::from_dense(100, 100, values);
    let groups: Vec<ColGroup> = (0..100u32)
        .map(|c| encode::encode_ddc(&dense, &[c]))
        .collect();
    let mut m = CompressedMatrix::from_groups(100, 100, groups, false).unwrap();

    let dense_estimate = io::HEADER_BYTES
        + cola_block::io::estimate_dense_disk_size(100, 100, m.nnz());
    assert!(io::compressed_disk_size(&m) > dense_estimate);

    let mut buf = Vec::new();
    io::write_matrix(&mut m, &mut buf).unwrap();

    let loaded = io::read_matrix(&mut std::io::Cursor::new(&buf)).unwrap();
    assert_eq!(loaded.col_groups().len(), 1);
    assert_eq!(loaded.col_groups()[0].kind(), ColGroupKind::Uncompressed);
    let out = loaded.decompress(1);
    for r in 0..100 {
        for c in 0..100 {
            assert_eq!(out.get(r, c), dense.get(r, c), "({r},{c})");
        }
    }
}

/// Round trip preserving the compressed layout.
#[test]
fn serialization_round_trip() {
    let dense = MatrixBlock::from_rows(&[
        &[1.0, 0.0, 5.0],
        &[1.0, 2.0, 5.0],
        &[1.0, 0.0, 5.0],
        &[1.0, 2.0, 0.0],
    ]);
    let mut m = CompressedMatrix::from_groups(
        4,
        3,
        vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_ole(&dense, &[1]),
            encode::encode_rle(&dense, &[2]),
        ],
        false,
    )
    .unwrap();

    let mut buf = Vec::new();
    let written = io::write_matrix(&mut m, &mut buf).unwrap();
    assert_eq!(written, buf.len() as u64);

    let loaded = io::read_matrix(&mut std::io::Cursor::new(&buf)).unwrap();
    assert_eq!(loaded, m);
    let out = loaded.decompress(1);
    for r in 0..4 {
        for c in 0..3 {
            assert_eq!(out.get(r, c), dense.get(r, c), "({r},{c})");
        }
    }
}

/// Scenario 5 is covered in the multiplication suite; scenario 6:
/// parallel decompression is bitwise identical across `k`.
#[test]
fn parallel_decompress_determinism() {
    let mut rng = StdRng::seed_from_u64(0xdead);
    let pool = [0.0, 1.25, -3.5, 2.0];
    let values: Vec<f64> = (0..64 * 6)
        .map(|_| pool[rng.random_range(0..pool.len())])
        .collect();
    let dense = MatrixBlock::from_dense(64, 6, values);
    let m = CompressedMatrix::from_groups(
        64,
        6,
        vec![
            encode::encode_ddc(&dense, &[0, 1]),
            encode::encode_sdc(&dense, &[2]),
            encode::encode_rle(&dense, &[3]),
            encode::encode_ole(&dense, &[4]),
            encode::encode_ddc(&dense, &[5]),
        ],
        false,
    )
    .unwrap();

    let a = m.decompress(1);
    m.clear_cached_decompressed();
    let b = m.decompress(8);
    for r in 0..64 {
        for c in 0..6 {
            assert_eq!(a.get(r, c).to_bits(), b.get(r, c).to_bits(), "({r},{c})");
        }
    }
}

/// Decompression idempotence: the second call returns the cached block.
#[test]
fn decompress_idempotence_through_cache() {
    let dense = MatrixBlock::from_rows(&[&[1.0, 2.0], &[1.0, 2.0]]);
    let m = CompressedMatrix::from_groups(
        2,
        2,
        vec![encode::encode_ddc(&dense, &[0, 1])],
        false,
    )
    .unwrap();

    let first = m.decompress(1);
    let second = m.decompress(1);
    assert!(Arc::ptr_eq(&first, &second), "second call must hit the cache");
    assert_eq!(*first, *second);
}

/// The overlapping `containsValue` stays unsupported by design.
#[test]
fn overlapping_contains_value_is_unsupported() {
    let dense = MatrixBlock::from_rows(&[&[1.0, 2.0], &[3.0, 1.0]]);
    let m = CompressedMatrix::from_groups(
        2,
        2,
        vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_ddc(&dense, &[1]),
        ],
        false,
    )
    .unwrap();
    let overlap = m
        .right_mult(&MatrixBlock::identity(2), 1, true)
        .unwrap();
    let c = overlap.as_compressed().unwrap();
    assert!(c.is_overlapping());
    assert!(matches!(
        c.contains_value(1.0),
        Err(cola::CompressionError::Unsupported(_))
    ));
}

/// Squash folds an overlapping matrix back to disjoint groups.
#[test]
fn squash_after_overlap() {
    let dense = MatrixBlock::from_rows(&[&[1.0, 2.0], &[3.0, 1.0], &[1.0, 2.0]]);
    let m = CompressedMatrix::from_groups(
        3,
        2,
        vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_ddc(&dense, &[1]),
        ],
        false,
    )
    .unwrap();
    let right = MatrixBlock::from_rows(&[&[2.0, 1.0], &[1.0, 1.0]]);
    let overlap = m.right_mult(&right, 1, true).unwrap();
    let c = overlap.as_compressed().unwrap();

    let squashed = c.squash(1);
    assert!(!squashed.is_overlapping());
    let want = dense.multiply(&right, 1).unwrap();
    for r in 0..3 {
        for cc in 0..2 {
            assert_eq!(squashed.get(r, cc), want.get(r, cc), "({r},{cc})");
        }
    }
    // min/max work again without collapsing
    assert_eq!(squashed.min(1), want.min());
    assert_eq!(squashed.max(1), want.max());
}
