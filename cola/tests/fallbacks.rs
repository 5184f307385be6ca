/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Decompress-and-delegate operations: everything without a compressed
//! execution path must still produce the dense kernel's answer (and never
//! raise merely because the matrix is compressed).

use approx::assert_abs_diff_eq;
use cola::colgroup::encode;
use cola::{AggKind, CompressedMatrix};
use cola_block::MatrixBlock;

fn column_matrix(values: &[f64]) -> (CompressedMatrix, MatrixBlock) {
    let dense = MatrixBlock::column_vector(values.to_vec());
    let m = CompressedMatrix::from_groups(
        values.len(),
        1,
        vec![encode::encode_ddc(&dense, &[0])],
        false,
    )
    .unwrap();
    (m, dense)
}

fn wide_matrix() -> (CompressedMatrix, MatrixBlock) {
    let dense = MatrixBlock::from_rows(&[
        &[1.0, 0.0, 2.0],
        &[0.0, 0.0, 0.0],
        &[1.0, 3.0, 2.0],
        &[4.0, 3.0, 0.0],
    ]);
    let m = CompressedMatrix::from_groups(
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
    (m, dense)
}

#[test]
fn sort_and_quantiles() {
    let (m, dense) = column_matrix(&[3.0, 1.0, 4.0, 1.0, 5.0]);
    let sorted = m.sort_with_weights(None, 1).unwrap();
    assert_eq!(sorted, dense.sort_with_weights(None).unwrap());

    let got = m.pick_value(None, 0.5, false, 1).unwrap();
    assert_eq!(got, dense.pick_value(None, 0.5, false).unwrap());
}

#[test]
fn moments_and_covariance() {
    let (m, dense) = column_matrix(&[1.0, 2.0, 3.0, 4.0]);
    assert_abs_diff_eq!(
        m.central_moment(None, 2, 1).unwrap(),
        dense.central_moment(None, 2).unwrap(),
        epsilon = 1e-12
    );

    let other = MatrixBlock::column_vector(vec![2.0, 4.0, 6.0, 8.0]);
    assert_abs_diff_eq!(
        m.covariance(&other, None, 1).unwrap(),
        dense.covariance(&other, None).unwrap(),
        epsilon = 1e-12
    );
}

#[test]
fn ctable_and_grouped_aggregate() {
    let (m, dense) = column_matrix(&[1.0, 2.0, 1.0, 2.0]);
    let other = MatrixBlock::column_vector(vec![2.0, 2.0, 1.0, 1.0]);
    assert_eq!(
        m.ctable(&other, 1.0, 1).unwrap(),
        dense.ctable(&other, 1.0).unwrap()
    );

    let groups = MatrixBlock::column_vector(vec![1.0, 1.0, 2.0, 2.0]);
    assert_eq!(
        m.grouped_aggregate(&groups, None, 2, AggKind::Sum, 1).unwrap(),
        dense.grouped_aggregate(&groups, None, 2, AggKind::Sum).unwrap()
    );
}

#[test]
fn transpose_and_reorg() {
    let (m, dense) = wide_matrix();
    assert_eq!(m.transpose(1), dense.transpose());

    assert_eq!(
        m.remove_empty(true, None, 1).unwrap(),
        dense.remove_empty(true, None).unwrap()
    );

    assert_eq!(
        m.zero_out(0, 2, 0, 2, false, 1).unwrap(),
        dense.zero_out(0, 2, 0, 2, false).unwrap()
    );
}

#[test]
fn left_indexing_overwrites_region() {
    let (m, dense) = wide_matrix();
    let patch = MatrixBlock::from_rows(&[&[9.0, 8.0]]);
    let got = m.left_indexing(&patch, 1, 1, 1).unwrap();
    assert_eq!(got.get(1, 1), 9.0);
    assert_eq!(got.get(1, 2), 8.0);
    assert_eq!(got.get(0, 0), dense.get(0, 0));

    let oversized = MatrixBlock::zeros(4, 4);
    assert!(m.left_indexing(&oversized, 1, 1, 1).is_err());
}

#[test]
fn quaternary_weighted_square_loss() {
    let (m, dense) = wide_matrix();
    let u = MatrixBlock::from_rows(&[&[1.0], &[0.5], &[1.0], &[2.0]]);
    let v = MatrixBlock::from_rows(&[&[1.0], &[1.0], &[0.5]]);
    let w = MatrixBlock::from_dense(4, 3, vec![1.0; 12]);
    assert_abs_diff_eq!(
        m.weighted_square_loss(&u, &v, Some(&w), 1).unwrap(),
        dense.weighted_square_loss(&u, &v, Some(&w)).unwrap(),
        epsilon = 1e-12
    );
}

#[test]
fn incremental_aggregate_matches_dense_merge() {
    let (m, dense) = wide_matrix();
    let delta = MatrixBlock::from_dense(4, 3, vec![0.25; 12]);

    let mut correction_a = MatrixBlock::zeros(4, 3);
    let got = m.incremental_aggregate(&mut correction_a, &delta, 1).unwrap();

    let mut want = dense.clone();
    let mut correction_b = MatrixBlock::zeros(4, 3);
    want.incremental_aggregate(&mut correction_b, &delta).unwrap();
    assert_eq!(got, want);
}

#[test]
fn reexpand_dense_fallback_for_sdc_input() {
    // an SDC-encoded column has no compressed re-expansion path and must
    // still produce the dense answer
    let dense = MatrixBlock::column_vector(vec![1.0, 1.0, 2.0, 1.0, 3.0]);
    let m = CompressedMatrix::from_groups(
        5,
        1,
        vec![encode::encode_sdc(&dense, &[0])],
        false,
    )
    .unwrap();
    let got = m.reexpand(3, false, false, 1).unwrap();
    let want = dense.rexpand(3, false, false).unwrap();
    for r in 0..5 {
        for c in 0..3 {
            assert_eq!(got.get(r, c), want.get(r, c), "({r},{c})");
        }
    }
}
