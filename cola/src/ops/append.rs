/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Column-wise concatenation of compressed matrices.
//!
//! cbind is a metadata operation: the right-hand group list is cloned with
//! its column indices shifted past the left matrix. Row-wise append always
//! goes through decompression (see
//! [`crate::matrix::CompressedMatrix::append_dense`]).

use crate::colgroup::ColGroup;
use crate::error::{CompressionError, CompressionResult};
use crate::matrix::CompressedMatrix;

pub fn append_cbind(
    l: &CompressedMatrix,
    r: &CompressedMatrix,
) -> CompressionResult<CompressedMatrix> {
    if l.num_rows() != r.num_rows() {
        return Err(CompressionError::DimensionMismatch {
            op: "append cbind",
            left: (l.num_rows(), l.num_cols()),
            right: (r.num_rows(), r.num_cols()),
        });
    }
    let mut groups: Vec<ColGroup> = l.col_groups().to_vec();
    for g in r.col_groups() {
        let mut shifted = g.clone();
        shifted.shift_cols(l.num_cols());
        groups.push(shifted);
    }
    Ok(CompressedMatrix::from_parts(
        l.num_rows(),
        l.num_cols() + r.num_cols(),
        groups,
        l.is_overlapping() || r.is_overlapping(),
    ))
}
