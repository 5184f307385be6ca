/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Matrix multiplication chains (`t(X) * (X * v)`) and the
//! transpose-flagged multiply between compressed operands.

use cola_block::MatrixBlock;
use cola_utils::BinaryOp;
use tracing::debug;

use crate::colgroup::ColGroup;
use crate::error::{CompressionError, CompressionResult};
use crate::matrix::{AnyMatrix, CompressedMatrix};
use crate::ops::{left_mult, right_mult};

/// `t(x) * (x * v)`, or `t(x) * (w ⊙ (x * v))` with weights.
///
/// The intermediate right-multiply stays compressed (overlapping) when `v`
/// has more than one column; it is materialized only for the final
/// transposed multiply.
pub fn chain_mm(
    x: &CompressedMatrix,
    v: &MatrixBlock,
    weights: Option<&MatrixBlock>,
    k: usize,
) -> CompressionResult<MatrixBlock> {
    if v.num_rows() != x.num_cols() {
        return Err(CompressionError::DimensionMismatch {
            op: "chain multiply",
            left: (x.num_rows(), x.num_cols()),
            right: (v.num_rows(), v.num_cols()),
        });
    }
    if let Some(w) = weights {
        if w.num_rows() != x.num_rows() || w.num_cols() != 1 {
            return Err(CompressionError::DimensionMismatch {
                op: "chain multiply weights",
                left: (x.num_rows(), x.num_cols()),
                right: (w.num_rows(), w.num_cols()),
            });
        }
    }
    if x.is_empty() {
        return Ok(MatrixBlock::zeros(x.num_cols(), v.num_cols()));
    }

    // single spanning uncompressed group: the dense chain kernel is
    // strictly better
    if let [ColGroup::Uncompressed(u)] = x.col_groups() {
        if u.data().num_cols() == x.num_cols() && v.num_cols() == 1 {
            return Ok(u.data().chain_multiply(v, weights, k)?);
        }
    }

    let tmp = right_mult::right_mult(x, v, k, v.num_cols() > 1)?;
    let mut tmp = match tmp {
        AnyMatrix::Dense(d) => d,
        AnyMatrix::Compressed(c) => {
            debug!("materializing chain intermediate for the transposed multiply");
            (*c.decompress(k)).clone()
        }
    };
    if let Some(w) = weights {
        tmp.binary_op_in_place(BinaryOp::Mul, w)?;
    }

    // out = t(t(tmp) * x) == t(x) * tmp
    let out_t = left_mult::left_mult(x, &tmp.transpose(), k)?;
    Ok(out_t.transpose())
}

/// Multiply two compressed matrices under transpose flags, using the
/// engine's rewrite rules:
///
/// * untransposed pairs decompress the right operand so the result can
///   stay compressed via the overlapping right-multiply;
/// * `t(l) * r` runs as a left-multiply with the transposed left operand
///   materialized;
/// * `t(l) * t(r)` rewrites to `t(r * l)`;
/// * `l * t(r)` would blow the result up by the shared dimension and is
///   unsupported in compressed form.
pub fn aggregate_binary(
    l: &CompressedMatrix,
    r: &CompressedMatrix,
    transpose_left: bool,
    transpose_right: bool,
    k: usize,
) -> CompressionResult<AnyMatrix> {
    match (transpose_left, transpose_right) {
        (false, false) => {
            debug!("multiplying two compressed matrices, decompressing the right side");
            let rd = r.get_uncompressed("compressed-compressed multiply", k);
            right_mult::right_mult(l, &rd, k, true)
        }
        (true, false) => {
            let ld = l.get_uncompressed("transposed compressed multiply", k);
            let out = left_mult::left_mult(r, &ld.transpose(), k)?;
            Ok(AnyMatrix::Dense(out))
        }
        (true, true) => {
            let ld = l.get_uncompressed("doubly transposed compressed multiply", k);
            let product = right_mult::right_mult(r, &ld, k, false)?;
            Ok(AnyMatrix::Dense(product.to_dense(k).transpose()))
        }
        (false, true) => Err(CompressionError::Unsupported(
            "compressed multiply with a transposed right operand",
        )),
    }
}
