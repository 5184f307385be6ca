/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Squash: fold an overlapping matrix back into disjoint column groups.
//!
//! The matrix is materialized once and each column re-encoded through the
//! direct encoders. Columns whose distinct-tuple count exceeds the cap
//! stay as uncompressed groups instead of inflating a dictionary.

use crate::colgroup::{encode, ColGroup};
use crate::matrix::CompressedMatrix;

/// Distinct values per column above which squash keeps the column
/// uncompressed.
const MAX_SQUASH_DISTINCT: usize = 256;

pub fn squash(m: &CompressedMatrix, k: usize) -> CompressedMatrix {
    if !m.is_overlapping() {
        return m.clone();
    }
    let dense = m.get_uncompressed("squash", k);
    let groups: Vec<ColGroup> = (0..m.num_cols() as u32)
        .map(|c| {
            let g = encode::encode_ddc(&dense, &[c]);
            if g.num_values() > MAX_SQUASH_DISTINCT {
                encode::encode_uncompressed(&dense, &[c])
            } else {
                g
            }
        })
        .collect();
    CompressedMatrix::from_parts(m.num_rows(), m.num_cols(), groups, false)
}
