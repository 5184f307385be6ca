/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Matrix-matrix multiplication over uncompressed blocks.

use cola_utils::stripe_height;
use rayon::prelude::*;

use crate::block::{BlockData, MatrixBlock};
use crate::error::{BlockError, BlockResult};

/// Compute `a * b` into a new dense block.
///
/// Both operands may be in any layout; the kernel iterates the stored
/// non-zeros of `a` and accumulates scaled rows of `b`. Rows of the output
/// are partitioned into fixed stripes of `ceil(rows / k)` so the reduction
/// order (and therefore the bit pattern of the result) is stable for a
/// given `k`.
pub fn multiply(a: &MatrixBlock, b: &MatrixBlock, k: usize) -> BlockResult<MatrixBlock> {
    if a.num_cols() != b.num_rows() {
        return Err(BlockError::DimensionMismatch {
            op: "multiply",
            left: (a.num_rows(), a.num_cols()),
            right: (b.num_rows(), b.num_cols()),
        });
    }
    let (m, n) = (a.num_rows(), b.num_cols());
    let mut out = MatrixBlock::new(m, n, false);
    if a.is_empty() || b.is_empty() {
        out.exam_sparsity();
        return Ok(out);
    }

    let height = stripe_height(m, k);
    let values = out.allocate_dense();
    values
        .par_chunks_mut(height * n.max(1))
        .enumerate()
        .for_each(|(stripe, chunk)| {
            let rl = stripe * height;
            for (local, out_row) in chunk.chunks_mut(n.max(1)).enumerate() {
                multiply_row(a, b, rl + local, out_row);
            }
        });

    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}

/// Accumulate row `r` of `a * b` into `out_row`.
fn multiply_row(a: &MatrixBlock, b: &MatrixBlock, r: usize, out_row: &mut [f64]) {
    a.for_each_in_row(r, |l, av| match b.data() {
        BlockData::Empty => {}
        BlockData::Dense(d) => {
            for (o, &bv) in out_row.iter_mut().zip(d.row(l).iter()) {
                *o += av * bv;
            }
        }
        BlockData::Sparse(s) => {
            for (j, bv) in s.row(l).iter() {
                out_row[j] += av * bv;
            }
        }
    });
}

/// Compute the matrix multiplication chain `t(x) * (x * v)` — optionally
/// with a cell-wise weighting `w` applied to the intermediate — without
/// materializing the transposed matrix.
///
/// `v` must be a column vector with `x.num_cols()` rows and `w`, when
/// present, a column vector with `x.num_rows()` rows. The result is a
/// `x.num_cols() x 1` column vector.
pub fn chain_multiply(
    x: &MatrixBlock,
    v: &MatrixBlock,
    w: Option<&MatrixBlock>,
    k: usize,
) -> BlockResult<MatrixBlock> {
    if v.num_rows() != x.num_cols() || v.num_cols() != 1 {
        return Err(BlockError::DimensionMismatch {
            op: "chain_multiply",
            left: (x.num_rows(), x.num_cols()),
            right: (v.num_rows(), v.num_cols()),
        });
    }
    if let Some(w) = w {
        if w.num_rows() != x.num_rows() || w.num_cols() != 1 {
            return Err(BlockError::DimensionMismatch {
                op: "chain_multiply",
                left: (x.num_rows(), x.num_cols()),
                right: (w.num_rows(), w.num_cols()),
            });
        }
    }

    // tmp = x * v, weighted when requested.
    let mut tmp = multiply(x, v, k)?;
    if let Some(w) = w {
        let weighted = super::cell::binary_op(&tmp, cola_utils::BinaryOp::Mul, w)?;
        tmp = weighted;
    }

    // out = t(x) * tmp, accumulated row-wise to avoid the transpose.
    let mut out = MatrixBlock::new(x.num_cols(), 1, false);
    let values = out.allocate_dense();
    for r in 0..x.num_rows() {
        let t = tmp.get(r, 0);
        if t == 0.0 {
            continue;
        }
        x.for_each_in_row(r, |c, xv| {
            values[c] += xv * t;
        });
    }
    out.recompute_nnz();
    Ok(out)
}
