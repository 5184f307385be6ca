/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Right matrix multiplication: `compressed * dense`.
//!
//! Each group multiplies its dictionary once, keeping its row assignment;
//! the resulting groups all span the product's full column range. With
//! `allow_overlap` the result is returned as an overlapping compressed
//! matrix with no materialization at all; otherwise the groups'
//! contributions are sum-collapsed into a dense block.

use cola_block::MatrixBlock;
use cola_utils::stripe_height;
use rayon::prelude::*;

use crate::colgroup::ColGroup;
use crate::error::{CompressionError, CompressionResult};
use crate::matrix::{AnyMatrix, CompressedMatrix};

pub fn right_mult(
    m: &CompressedMatrix,
    right: &MatrixBlock,
    k: usize,
    allow_overlap: bool,
) -> CompressionResult<AnyMatrix> {
    if m.num_cols() != right.num_rows() {
        return Err(CompressionError::DimensionMismatch {
            op: "right multiply",
            left: (m.num_rows(), m.num_cols()),
            right: (right.num_rows(), right.num_cols()),
        });
    }
    let (rows, cr) = (m.num_rows(), right.num_cols());
    if m.is_empty() || right.is_empty() {
        return Ok(AnyMatrix::Dense(MatrixBlock::zeros(rows, cr)));
    }

    let mapped: Vec<ColGroup> = m
        .col_groups()
        .iter()
        .filter_map(|g| g.right_mult(right))
        .collect();
    if mapped.is_empty() {
        return Ok(AnyMatrix::Dense(MatrixBlock::zeros(rows, cr)));
    }

    if allow_overlap && cr > 1 {
        return Ok(AnyMatrix::Compressed(CompressedMatrix::from_parts(
            rows, cr, mapped, true,
        )));
    }

    // sum-collapse the group contributions
    let mut out = MatrixBlock::new(rows, cr, false);
    {
        let height = stripe_height(rows, k);
        let values = out.allocate_dense();
        values
            .par_chunks_mut((height * cr).max(1))
            .enumerate()
            .for_each(|(stripe, chunk)| {
                let rl = stripe * height;
                let ru = (rl + chunk.len() / cr.max(1)).min(rows);
                for g in &mapped {
                    g.add_into(chunk, cr, rl, ru);
                }
            });
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(AnyMatrix::Dense(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colgroup::encode;
    use approx::assert_abs_diff_eq;

    fn compressed() -> (CompressedMatrix, MatrixBlock) {
        let dense = MatrixBlock::from_rows(&[&[1.0, 4.0], &[2.0, 4.0], &[1.0, 0.0]]);
        let groups = vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_sdc(&dense, &[1]),
        ];
        let m = CompressedMatrix::from_groups(3, 2, groups, false).unwrap();
        (m, dense)
    }

    fn reference(dense: &MatrixBlock, right: &MatrixBlock) -> MatrixBlock {
        dense.multiply(right, 1).unwrap()
    }

    #[test]
    fn collapse_matches_dense_product() {
        let (m, dense) = compressed();
        let right = MatrixBlock::from_rows(&[&[1.0, 0.0, 2.0], &[0.0, 3.0, 1.0]]);
        let out = right_mult(&m, &right, 1, false).unwrap();
        let expected = reference(&dense, &right);
        assert!(matches!(out, AnyMatrix::Dense(_)));
        for r in 0..3 {
            for c in 0..3 {
                assert_abs_diff_eq!(out.get(r, c), expected.get(r, c), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn overlap_mode_skips_materialization() {
        let (m, dense) = compressed();
        let right = MatrixBlock::from_rows(&[&[1.0, 0.0, 2.0], &[0.0, 3.0, 1.0]]);
        let out = right_mult(&m, &right, 1, true).unwrap();
        let c = out.as_compressed().unwrap();
        assert!(c.is_overlapping());
        assert_eq!(c.col_groups().len(), 2);
        // every group spans the full output width
        for g in c.col_groups() {
            assert_eq!(g.num_cols(), 3);
        }
        let expected = reference(&dense, &right);
        for r in 0..3 {
            for cc in 0..3 {
                assert_abs_diff_eq!(c.get(r, cc), expected.get(r, cc), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn single_output_column_collapses() {
        let (m, dense) = compressed();
        let right = MatrixBlock::column_vector(vec![2.0, -1.0]);
        let out = right_mult(&m, &right, 1, true).unwrap();
        assert!(matches!(out, AnyMatrix::Dense(_)));
        let expected = reference(&dense, &right);
        for r in 0..3 {
            assert_abs_diff_eq!(out.get(r, 0), expected.get(r, 0), epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_operands_yield_zeros() {
        let (m, _) = compressed();
        let right = MatrixBlock::zeros(2, 4);
        let out = right_mult(&m, &right, 1, true).unwrap();
        assert_eq!(out.num_cols(), 4);
        assert!(matches!(out, AnyMatrix::Dense(_)));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let (m, _) = compressed();
        let right = MatrixBlock::zeros(3, 2);
        assert!(right_mult(&m, &right, 1, false).is_err());
    }
}
