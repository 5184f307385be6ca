/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Binary cell operations between a compressed matrix and an uncompressed
//! operand.
//!
//! The kernel specializes on the operand shape: a `1x1` operand becomes a
//! dictionary scalar transform, a row vector becomes a per-group row op,
//! and a column vector or full matrix decompresses and delegates to the
//! dense kernel.

use cola_block::MatrixBlock;
use cola_utils::{BinaryOp, ScalarOp};
use tracing::debug;

use crate::colgroup::{ColGroup, ColGroupConst};
use crate::dictionary::Dictionary;
use crate::error::{CompressionError, CompressionResult};
use crate::matrix::{AnyMatrix, CompressedMatrix};
use crate::ops::scalar;

/// Cell-wise `m op other` (`other op m` when `left_side`).
pub fn binary_op(
    m: &CompressedMatrix,
    op: BinaryOp,
    other: &MatrixBlock,
    left_side: bool,
    k: usize,
) -> CompressionResult<AnyMatrix> {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    if other.num_rows() == 1 && other.num_cols() == 1 {
        return Ok(scalar_broadcast(m, op, other.get(0, 0), left_side, k));
    }
    if other.num_rows() == 1 && other.num_cols() == cols {
        let mut v = vec![0.0; cols];
        other.copy_row_into(0, &mut v);
        return Ok(row_vector_broadcast(m, op, &v, left_side, k));
    }
    if (other.num_cols() == 1 && other.num_rows() == rows)
        || (other.num_rows() == rows && other.num_cols() == cols)
    {
        debug!(
            ?op,
            "binary cell op with column-vector or matrix operand, decompressing"
        );
        let dense = m.get_uncompressed("binary cell op with matrix operand", k);
        return Ok(AnyMatrix::Dense(dense_binary(&dense, op, other, left_side)?));
    }
    Err(CompressionError::DimensionMismatch {
        op: "binary cell op",
        left: (rows, cols),
        right: (other.num_rows(), other.num_cols()),
    })
}

/// Scalar broadcast: route to the dictionary transform, reusing the
/// overlap rules of the scalar kernel when the operator has a scalar-op
/// equivalent.
fn scalar_broadcast(
    m: &CompressedMatrix,
    op: BinaryOp,
    c: f64,
    left_side: bool,
    k: usize,
) -> AnyMatrix {
    let equivalent = match (op, left_side) {
        (BinaryOp::Add, _) => Some(ScalarOp::Add(c)),
        (BinaryOp::Sub, false) => Some(ScalarOp::Sub(c)),
        (BinaryOp::Sub, true) => Some(ScalarOp::SubFrom(c)),
        (BinaryOp::Mul, _) => Some(ScalarOp::Mul(c)),
        (BinaryOp::Div, false) => Some(ScalarOp::Div(c)),
        (BinaryOp::Div, true) => Some(ScalarOp::DivInto(c)),
        _ => None,
    };
    if let Some(sop) = equivalent {
        return scalar::scalar_op(m, sop, k);
    }

    // min/max/comparisons: plain dictionary map when non-overlapping
    let f = move |v: f64| {
        if left_side {
            op.apply(c, v)
        } else {
            op.apply(v, c)
        }
    };
    if m.is_overlapping() {
        debug!(?op, "comparison against an overlapping matrix, decompressing");
        let dense = m.get_uncompressed("scalar comparison on overlapping matrix", k);
        return AnyMatrix::Dense(dense.map_cells(f, f(0.0) == 0.0));
    }
    let zero_preserving = f(0.0) == 0.0;
    let groups: Vec<ColGroup> = m
        .col_groups()
        .iter()
        .map(|g| g.map_values(&f, zero_preserving, m.num_rows()))
        .collect();
    AnyMatrix::Compressed(CompressedMatrix::from_parts(
        m.num_rows(),
        m.num_cols(),
        groups,
        false,
    ))
}

/// Row-vector broadcast, delegated to the per-group row op.
fn row_vector_broadcast(
    m: &CompressedMatrix,
    op: BinaryOp,
    v: &[f64],
    left_side: bool,
    k: usize,
) -> AnyMatrix {
    let nrows = m.num_rows();
    if !m.is_overlapping() {
        let groups: Vec<ColGroup> = m
            .col_groups()
            .iter()
            .map(|g| g.binary_row_op(op, v, left_side, nrows))
            .collect();
        return AnyMatrix::Compressed(CompressedMatrix::from_parts(
            nrows,
            m.num_cols(),
            groups,
            false,
        ));
    }

    match (op, left_side) {
        // v scales each contribution independently
        (BinaryOp::Mul, _) | (BinaryOp::Div, false) => {
            let groups: Vec<ColGroup> = m
                .col_groups()
                .iter()
                .map(|g| g.binary_row_op(op, v, left_side, nrows))
                .collect();
            AnyMatrix::Compressed(CompressedMatrix::from_parts(
                nrows,
                m.num_cols(),
                groups,
                true,
            ))
        }
        // shifts ride along as an extra constant group
        (BinaryOp::Add, _) => {
            AnyMatrix::Compressed(with_vector_group(m, m.col_groups().to_vec(), v.to_vec()))
        }
        (BinaryOp::Sub, false) => {
            let negated: Vec<f64> = v.iter().map(|&x| -x).collect();
            AnyMatrix::Compressed(with_vector_group(m, m.col_groups().to_vec(), negated))
        }
        (BinaryOp::Sub, true) => {
            let negated: Vec<ColGroup> = m
                .col_groups()
                .iter()
                .map(|g| g.scalar_op(ScalarOp::Mul(-1.0), nrows))
                .collect();
            AnyMatrix::Compressed(with_vector_group(m, negated, v.to_vec()))
        }
        _ => {
            debug!(?op, "row-vector op on an overlapping matrix, decompressing");
            let dense = m.get_uncompressed("row-vector op on overlapping matrix", k);
            let vector = MatrixBlock::row_vector(v.to_vec());
            match dense_binary(&dense, op, &vector, left_side) {
                Ok(out) => AnyMatrix::Dense(out),
                // the vector shape is valid by construction
                Err(_) => AnyMatrix::Dense((*dense).clone()),
            }
        }
    }
}

/// Append a constant group adding `shift` (one value per column).
fn with_vector_group(
    m: &CompressedMatrix,
    mut groups: Vec<ColGroup>,
    shift: Vec<f64>,
) -> CompressedMatrix {
    if shift.iter().any(|&v| v != 0.0) {
        let cols: Vec<u32> = (0..m.num_cols() as u32).collect();
        groups.push(ColGroup::Const(ColGroupConst::new(
            cols.into_boxed_slice(),
            Dictionary::single_tuple(shift),
        )));
    }
    CompressedMatrix::from_parts(m.num_rows(), m.num_cols(), groups, true)
}

/// Dense fallback honoring operand sides.
fn dense_binary(
    dense: &MatrixBlock,
    op: BinaryOp,
    other: &MatrixBlock,
    left_side: bool,
) -> CompressionResult<MatrixBlock> {
    if !left_side {
        return Ok(dense.binary_op(op, other)?);
    }
    // `other op dense` with `other` broadcast over the dense shape
    let (rows, cols) = (dense.num_rows(), dense.num_cols());
    let mut values = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let o = if other.num_rows() == 1 && other.num_cols() == 1 {
                other.get(0, 0)
            } else if other.num_rows() == 1 {
                other.get(0, c)
            } else if other.num_cols() == 1 {
                other.get(r, 0)
            } else {
                other.get(r, c)
            };
            values[r * cols + c] = op.apply(o, dense.get(r, c));
        }
    }
    let mut out = MatrixBlock::from_dense(rows, cols, values);
    out.exam_sparsity();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colgroup::encode;

    fn compressed() -> (CompressedMatrix, MatrixBlock) {
        let dense = MatrixBlock::from_rows(&[
            &[1.0, 0.0, 2.0],
            &[1.0, 4.0, 2.0],
            &[3.0, 0.0, 2.0],
        ]);
        let groups = vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_rle(&dense, &[1]),
            encode::encode_ddc(&dense, &[2]),
        ];
        let m = CompressedMatrix::from_groups(3, 3, groups, false).unwrap();
        (m, dense)
    }

    fn check(result: &AnyMatrix, expected: impl Fn(usize, usize) -> f64, rows: usize, cols: usize) {
        for r in 0..rows {
            for c in 0..cols {
                assert_eq!(result.get(r, c), expected(r, c), "({r},{c})");
            }
        }
    }

    #[test]
    fn scalar_broadcast_stays_compressed() {
        let (m, dense) = compressed();
        let s = MatrixBlock::from_dense(1, 1, vec![2.0]);
        let out = binary_op(&m, BinaryOp::Add, &s, false, 1).unwrap();
        assert!(out.as_compressed().is_some());
        check(&out, |r, c| dense.get(r, c) + 2.0, 3, 3);

        let out = binary_op(&m, BinaryOp::Sub, &s, true, 1).unwrap();
        check(&out, |r, c| 2.0 - dense.get(r, c), 3, 3);

        let out = binary_op(&m, BinaryOp::Ge, &s, false, 1).unwrap();
        assert!(out.as_compressed().is_some());
        check(&out, |r, c| f64::from(dense.get(r, c) >= 2.0), 3, 3);
    }

    #[test]
    fn row_vector_broadcast_stays_compressed() {
        let (m, dense) = compressed();
        let v = MatrixBlock::row_vector(vec![1.0, 2.0, 3.0]);
        for op in [BinaryOp::Add, BinaryOp::Mul, BinaryOp::Sub, BinaryOp::Le] {
            let out = binary_op(&m, op, &v, false, 1).unwrap();
            assert!(out.as_compressed().is_some(), "{op:?}");
            check(
                &out,
                |r, c| op.apply(dense.get(r, c), v.get(0, c)),
                3,
                3,
            );
        }
    }

    #[test]
    fn column_vector_decompresses() {
        let (m, dense) = compressed();
        let v = MatrixBlock::column_vector(vec![1.0, 2.0, 3.0]);
        let out = binary_op(&m, BinaryOp::Add, &v, false, 1).unwrap();
        assert!(matches!(out, AnyMatrix::Dense(_)));
        check(&out, |r, c| dense.get(r, c) + v.get(r, 0), 3, 3);
    }

    #[test]
    fn full_matrix_decompresses() {
        let (m, dense) = compressed();
        let other = MatrixBlock::from_rows(&[
            &[1.0, 1.0, 1.0],
            &[2.0, 2.0, 2.0],
            &[3.0, 3.0, 3.0],
        ]);
        let out = binary_op(&m, BinaryOp::Mul, &other, false, 1).unwrap();
        check(&out, |r, c| dense.get(r, c) * other.get(r, c), 3, 3);

        let out = binary_op(&m, BinaryOp::Sub, &other, true, 1).unwrap();
        check(&out, |r, c| other.get(r, c) - dense.get(r, c), 3, 3);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let (m, _) = compressed();
        let bad = MatrixBlock::zeros(2, 2);
        assert!(matches!(
            binary_op(&m, BinaryOp::Add, &bad, false, 1),
            Err(CompressionError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn overlapping_add_row_vector_appends_group() {
        let (m, dense) = compressed();
        let overlap = m.right_mult(&MatrixBlock::identity(3), 1, true).unwrap();
        let c = overlap.as_compressed().unwrap().clone();
        assert!(c.is_overlapping());

        let v = MatrixBlock::row_vector(vec![10.0, 20.0, 30.0]);
        let out = binary_op(&c, BinaryOp::Add, &v, false, 1).unwrap();
        assert!(out.as_compressed().unwrap().is_overlapping());
        check(&out, |r, cc| dense.get(r, cc) + v.get(0, cc), 3, 3);

        // comparisons collapse
        let out = binary_op(&c, BinaryOp::Gt, &v, false, 1).unwrap();
        assert!(matches!(out, AnyMatrix::Dense(_)));
    }
}
