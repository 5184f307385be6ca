/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Slicing. Column ranges stay compressed through per-group projection;
//! any row range decompresses the selected rows into a dense block
//! (group contributions are added, which also serves overlapping
//! matrices).

use cola_block::MatrixBlock;

use crate::colgroup::ColGroup;
use crate::error::{CompressionError, CompressionResult};
use crate::matrix::{AnyMatrix, CompressedMatrix};

fn check_range(
    op: &'static str,
    lo: usize,
    hi: usize,
    extent: usize,
) -> CompressionResult<()> {
    if lo >= hi || hi > extent {
        return Err(CompressionError::InvalidArgument {
            op,
            detail: format!("range [{lo}, {hi}) out of range for extent {extent}"),
        });
    }
    Ok(())
}

/// Project onto columns `[cl, cu)` as a compressed matrix.
pub fn slice_columns(
    m: &CompressedMatrix,
    cl: usize,
    cu: usize,
) -> CompressionResult<CompressedMatrix> {
    check_range("slice columns", cl, cu, m.num_cols())?;
    let groups: Vec<ColGroup> = m
        .col_groups()
        .iter()
        .filter_map(|g| g.slice_columns(cl, cu))
        .collect();
    if groups.is_empty() {
        return Ok(CompressedMatrix::empty(m.num_rows(), cu - cl));
    }
    Ok(CompressedMatrix::from_parts(
        m.num_rows(),
        cu - cl,
        groups,
        m.is_overlapping(),
    ))
}

/// Slice `rows [rl, ru) x cols [cl, cu)`.
pub fn slice(
    m: &CompressedMatrix,
    rl: usize,
    ru: usize,
    cl: usize,
    cu: usize,
    k: usize,
) -> CompressionResult<AnyMatrix> {
    check_range("slice rows", rl, ru, m.num_rows())?;
    check_range("slice cols", cl, cu, m.num_cols())?;

    // full row range: compressed column slice
    if rl == 0 && ru == m.num_rows() {
        return Ok(AnyMatrix::Compressed(slice_columns(m, cl, cu)?));
    }
    // full column range: decompress just the selected rows
    if cl == 0 && cu == m.num_cols() {
        let cols = m.num_cols();
        let mut out = MatrixBlock::new(ru - rl, cols, false);
        {
            let values = out.allocate_dense();
            for g in m.col_groups() {
                g.add_into(values, cols, rl, ru);
            }
        }
        out.recompute_nnz();
        out.exam_sparsity();
        return Ok(AnyMatrix::Dense(out));
    }
    // mixed: compressed column slice first, then the row slice over it
    let tmp = slice_columns(m, cl, cu)?;
    slice(&tmp, rl, ru, 0, tmp.num_cols(), k)
}
