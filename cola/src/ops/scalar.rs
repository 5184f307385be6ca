/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Scalar operations over compressed matrices.
//!
//! The dictionary transform leaves every row assignment untouched, so the
//! result stays compressed. Overlapping matrices need the operator to
//! distribute over summed group contributions: multiplication and division
//! scale each group, addition and subtraction append a constant group
//! carrying the shift, anything else collapses.

use cola_utils::ScalarOp;
use tracing::debug;

use crate::colgroup::{ColGroup, ColGroupConst};
use crate::dictionary::Dictionary;
use crate::matrix::{AnyMatrix, CompressedMatrix};

pub fn scalar_op(m: &CompressedMatrix, op: ScalarOp, k: usize) -> AnyMatrix {
    let nrows = m.num_rows();
    if !m.is_overlapping() {
        let groups: Vec<ColGroup> = m
            .col_groups()
            .iter()
            .map(|g| g.scalar_op(op, nrows))
            .collect();
        return AnyMatrix::Compressed(CompressedMatrix::from_parts(
            nrows,
            m.num_cols(),
            groups,
            false,
        ));
    }

    match op {
        // c * (a + b) == c*a + c*b
        ScalarOp::Mul(_) | ScalarOp::Div(_) => {
            let groups: Vec<ColGroup> = m
                .col_groups()
                .iter()
                .map(|g| g.scalar_op(op, nrows))
                .collect();
            AnyMatrix::Compressed(CompressedMatrix::from_parts(
                nrows,
                m.num_cols(),
                groups,
                true,
            ))
        }
        // (a + b) + c: carry the shift in an extra constant group
        ScalarOp::Add(c) => AnyMatrix::Compressed(with_shift_group(m, m.col_groups().to_vec(), c)),
        ScalarOp::Sub(c) => AnyMatrix::Compressed(with_shift_group(m, m.col_groups().to_vec(), -c)),
        // c - (a + b) == (-a) + (-b) + c
        ScalarOp::SubFrom(c) => {
            let negated: Vec<ColGroup> = m
                .col_groups()
                .iter()
                .map(|g| g.scalar_op(ScalarOp::Mul(-1.0), nrows))
                .collect();
            AnyMatrix::Compressed(with_shift_group(m, negated, c))
        }
        // non-distributive over the summed contributions
        _ => {
            debug!(?op, "scalar op on an overlapping matrix, decompressing");
            let dense = m.get_uncompressed("non-distributive scalar op", k);
            AnyMatrix::Dense(dense.scalar_op(op))
        }
    }
}

/// Append a constant group adding `shift` to every cell.
fn with_shift_group(m: &CompressedMatrix, mut groups: Vec<ColGroup>, shift: f64) -> CompressedMatrix {
    if shift != 0.0 {
        let cols: Vec<u32> = (0..m.num_cols() as u32).collect();
        groups.push(ColGroup::Const(ColGroupConst::new(
            cols.into_boxed_slice(),
            Dictionary::single_tuple(vec![shift; m.num_cols()]),
        )));
    }
    CompressedMatrix::from_parts(m.num_rows(), m.num_cols(), groups, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colgroup::encode;
    use cola_block::MatrixBlock;

    fn compressed() -> (CompressedMatrix, MatrixBlock) {
        let dense = MatrixBlock::from_rows(&[&[1.0, 0.0], &[2.0, 3.0], &[1.0, 0.0]]);
        let groups = vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_ole(&dense, &[1]),
        ];
        let m = CompressedMatrix::from_groups(3, 2, groups, false).unwrap();
        (m, dense)
    }

    fn check_matches_dense(result: &AnyMatrix, dense: &MatrixBlock, op: ScalarOp) {
        for r in 0..dense.num_rows() {
            for c in 0..dense.num_cols() {
                assert_eq!(
                    result.get(r, c),
                    op.apply(dense.get(r, c)),
                    "{op:?} at ({r},{c})"
                );
            }
        }
    }

    #[test]
    fn stays_compressed_and_matches_dense() {
        let (m, dense) = compressed();
        for op in [
            ScalarOp::Mul(2.5),
            ScalarOp::Add(1.0),
            ScalarOp::Sub(0.5),
            ScalarOp::SubFrom(10.0),
            ScalarOp::Div(4.0),
            ScalarOp::Pow(2.0),
        ] {
            let out = scalar_op(&m, op, 1);
            assert!(out.as_compressed().is_some(), "{op:?}");
            check_matches_dense(&out, &dense, op);
        }
    }

    #[test]
    fn overlapping_mul_distributes() {
        let (m, dense) = compressed();
        let overlap = m.right_mult(&MatrixBlock::identity(2), 1, true).unwrap();
        let c = overlap.as_compressed().unwrap();
        assert!(c.is_overlapping());

        let out = scalar_op(c, ScalarOp::Mul(3.0), 1);
        assert!(out.as_compressed().unwrap().is_overlapping());
        check_matches_dense(&out, &dense, ScalarOp::Mul(3.0));
    }

    #[test]
    fn overlapping_add_appends_shift_group() {
        let (m, dense) = compressed();
        let overlap = m.right_mult(&MatrixBlock::identity(2), 1, true).unwrap();
        let c = overlap.as_compressed().unwrap();
        let before = c.col_groups().len();

        let out = scalar_op(c, ScalarOp::Add(7.0), 1);
        let oc = out.as_compressed().unwrap();
        assert_eq!(oc.col_groups().len(), before + 1);
        check_matches_dense(&out, &dense, ScalarOp::Add(7.0));
    }

    #[test]
    fn overlapping_pow_decompresses() {
        let (m, dense) = compressed();
        let overlap = m.right_mult(&MatrixBlock::identity(2), 1, true).unwrap();
        let c = overlap.as_compressed().unwrap();
        let out = scalar_op(c, ScalarOp::Pow(2.0), 1);
        assert!(matches!(out, AnyMatrix::Dense(_)));
        check_matches_dense(&out, &dense, ScalarOp::Pow(2.0));
    }
}
