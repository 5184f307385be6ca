/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Left matrix multiplication: `dense * compressed`.
//!
//! Rows of the left operand are partitioned into fixed stripes; within a
//! row every group pre-aggregates the row by value index and multiplies
//! the dictionary once, so the FLOP count scales with the number of
//! distinct tuples instead of the number of matrix rows.

use cola_block::MatrixBlock;
use cola_utils::stripe_height;
use rayon::prelude::*;

use crate::error::{CompressionError, CompressionResult};
use crate::matrix::CompressedMatrix;

pub fn left_mult(
    m: &CompressedMatrix,
    left: &MatrixBlock,
    k: usize,
) -> CompressionResult<MatrixBlock> {
    if left.num_cols() != m.num_rows() {
        return Err(CompressionError::DimensionMismatch {
            op: "left multiply",
            left: (left.num_rows(), left.num_cols()),
            right: (m.num_rows(), m.num_cols()),
        });
    }
    let (lr, cols) = (left.num_rows(), m.num_cols());
    if m.is_empty() || left.is_empty() {
        return Ok(MatrixBlock::zeros(lr, cols));
    }

    let mut out = MatrixBlock::new(lr, cols, false);
    {
        let height = stripe_height(lr, k);
        let values = out.allocate_dense();
        values
            .par_chunks_mut((height * cols).max(1))
            .enumerate()
            .for_each(|(stripe, chunk)| {
                let rl = stripe * height;
                let mut lrow = vec![0.0; m.num_rows()];
                for (local, out_row) in chunk.chunks_mut(cols.max(1)).enumerate() {
                    left.copy_row_into(rl + local, &mut lrow);
                    for g in m.col_groups() {
                        g.left_mult_row(&lrow, out_row);
                    }
                }
            });
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}
