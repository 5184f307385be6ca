/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Transpose-self matrix multiplication: `t(m) * m` (LEFT orientation).
//!
//! Each group accumulates its own counts-weighted dictionary product into
//! the upper triangle. When groups overlap, every unordered pair also
//! contributes its cross product, computed over per-group materialized
//! column blocks; the upper triangle is mirrored at the end.

use cola_block::MatrixBlock;

use crate::matrix::CompressedMatrix;

pub fn tsmm_left(m: &CompressedMatrix, _k: usize) -> MatrixBlock {
    let n = m.num_cols();
    if m.is_empty() {
        return MatrixBlock::zeros(n, n);
    }
    let rows = m.num_rows();
    let mut out = MatrixBlock::new(n, n, false);
    {
        let values = out.allocate_dense();
        for g in m.col_groups() {
            g.tsmm_into(values, n, rows);
        }

        if m.is_overlapping() {
            let groups = m.col_groups();
            let locals: Vec<Vec<f64>> =
                groups.iter().map(|g| g.materialize_local(rows)).collect();
            for i in 0..groups.len() {
                for j in i + 1..groups.len() {
                    cross_product(
                        values,
                        n,
                        rows,
                        groups[i].col_indices(),
                        &locals[i],
                        groups[j].col_indices(),
                        &locals[j],
                    );
                }
            }
        }

        // mirror the upper triangle
        for p in 0..n {
            for q in p + 1..n {
                values[q * n + p] = values[p * n + q];
            }
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    out
}

/// Add the cross contribution of two distinct groups. For columns `p` of
/// `a` and `q` of `b`, both ordered pairings `(a, b)` and `(b, a)`
/// contribute to the logical product, so the diagonal receives the dot
/// product twice and off-diagonal cells land in their upper-triangle slot
/// once per pairing.
fn cross_product(
    dst: &mut [f64],
    n: usize,
    rows: usize,
    a_cols: &[u32],
    a: &[f64],
    b_cols: &[u32],
    b: &[f64],
) {
    let (wa, wb) = (a_cols.len(), b_cols.len());
    for (pa, &ca) in a_cols.iter().enumerate() {
        for (pb, &cb) in b_cols.iter().enumerate() {
            let mut dot = 0.0;
            for r in 0..rows {
                dot += a[r * wa + pa] * b[r * wb + pb];
            }
            let (p, q) = (ca as usize, cb as usize);
            if p == q {
                dst[p * n + p] += 2.0 * dot;
            } else if p < q {
                dst[p * n + q] += dot;
            } else {
                dst[q * n + p] += dot;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colgroup::encode;
    use approx::assert_abs_diff_eq;

    fn reference_tsmm(dense: &MatrixBlock) -> MatrixBlock {
        dense.transpose().multiply(dense, 1).unwrap()
    }

    #[test]
    fn matches_dense_reference() {
        let dense = MatrixBlock::from_rows(&[
            &[1.0, 1.0, 2.0],
            &[1.0, 1.0, 2.0],
            &[1.0, 1.0, 2.0],
        ]);
        let m = CompressedMatrix::from_groups(
            3,
            3,
            vec![encode::encode_ddc(&dense, &[0, 1, 2])],
            false,
        )
        .unwrap();
        let out = tsmm_left(&m, 1);
        let expected = reference_tsmm(&dense);
        for p in 0..3 {
            for q in 0..3 {
                assert_abs_diff_eq!(out.get(p, q), expected.get(p, q), epsilon = 1e-12);
            }
        }
        // scenario: upper triangle [[3,3,6],[_,3,6],[_,_,12]]
        assert_eq!(out.get(0, 2), 6.0);
        assert_eq!(out.get(2, 2), 12.0);
    }

    #[test]
    fn multi_group_disjoint_columns() {
        let dense = MatrixBlock::from_rows(&[
            &[1.0, 0.0, 3.0],
            &[2.0, 5.0, 0.0],
            &[1.0, 5.0, 3.0],
            &[2.0, 0.0, 0.0],
        ]);
        let m = CompressedMatrix::from_groups(
            4,
            3,
            vec![
                encode::encode_ddc(&dense, &[0, 1]),
                encode::encode_rle(&dense, &[2]),
            ],
            false,
        )
        .unwrap();
        let out = tsmm_left(&m, 2);
        let expected = reference_tsmm(&dense);
        for p in 0..3 {
            for q in 0..3 {
                assert_abs_diff_eq!(out.get(p, q), expected.get(p, q), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn overlapping_cross_terms() {
        let dense = MatrixBlock::from_rows(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        let right = MatrixBlock::from_rows(&[&[1.0, 1.0], &[0.5, -1.0]]);
        let base = CompressedMatrix::from_groups(
            3,
            2,
            vec![
                encode::encode_ddc(&dense, &[0]),
                encode::encode_ddc(&dense, &[1]),
            ],
            false,
        )
        .unwrap();
        let overlap = base.right_mult(&right, 1, true).unwrap();
        let c = overlap.as_compressed().unwrap();
        assert!(c.is_overlapping());

        let out = tsmm_left(c, 1);
        let product = dense.multiply(&right, 1).unwrap();
        let expected = reference_tsmm(&product);
        for p in 0..2 {
            for q in 0..2 {
                assert_abs_diff_eq!(out.get(p, q), expected.get(p, q), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn result_is_symmetric() {
        let dense = MatrixBlock::from_rows(&[&[1.0, 2.0, 0.0], &[0.0, 1.0, 4.0]]);
        let m = CompressedMatrix::from_groups(
            2,
            3,
            vec![
                encode::encode_ddc(&dense, &[0]),
                encode::encode_ddc(&dense, &[1, 2]),
            ],
            false,
        )
        .unwrap();
        let out = tsmm_left(&m, 1);
        for p in 0..3 {
            for q in 0..3 {
                assert_eq!(out.get(p, q), out.get(q, p));
            }
        }
    }

    #[test]
    fn empty_matrix_yields_zero_square() {
        let m = CompressedMatrix::empty(4, 3);
        let out = tsmm_left(&m, 1);
        assert_eq!((out.num_rows(), out.num_cols()), (3, 3));
        assert_eq!(out.nnz(), 0);
    }
}
