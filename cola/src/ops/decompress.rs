/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Full decompression of a compressed matrix into an uncompressed block.

use std::sync::Arc;

use cola_block::{BlockData, MatrixBlock};
use cola_utils::stripe_height;
use rayon::prelude::*;

use crate::colgroup::ColGroup;
use crate::matrix::CompressedMatrix;

/// Decompress `m`, serving from the cache when a previous result is still
/// alive.
///
/// Row stripes of fixed `ceil(rows / k)` height are filled independently;
/// each group adds its contribution per stripe, so for a fixed `k` the
/// result is bitwise stable.
pub fn decompress(m: &CompressedMatrix, k: usize) -> Arc<MatrixBlock> {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    if m.is_empty() {
        return Arc::new(MatrixBlock::zeros(rows, cols));
    }
    if let Some(hit) = m.cached_decompressed() {
        return hit;
    }

    // A lone spanning uncompressed group already is the decompressed
    // form; share its allocation instead of copying.
    if let [ColGroup::Uncompressed(u)] = m.col_groups() {
        if u.data().num_rows() == rows && u.data().num_cols() == cols {
            let arc = Arc::clone(u.data_arc());
            m.cache.store(&arc);
            return arc;
        }
    }

    // A dense uncompressed group spanning the whole matrix makes a better
    // seed than a zero target: its cells are already in place and the
    // group is skipped during accumulation. Only worth probing when it can
    // be the sole contributor of its columns.
    let seed = if m.is_overlapping() || m.col_groups().len() == 1 {
        m.col_groups().iter().enumerate().find_map(|(i, g)| match g {
            ColGroup::Uncompressed(u)
                if u.data().num_rows() == rows
                    && u.data().num_cols() == cols
                    && !u.data().is_empty()
                    && matches!(u.data().data(), BlockData::Dense(_)) =>
            {
                Some((i, u.data().clone()))
            }
            _ => None,
        })
    } else {
        None
    };

    let (skip, mut out) = match seed {
        Some((i, block)) => (Some(i), block),
        None => (None, MatrixBlock::new(rows, cols, false)),
    };

    {
        let height = stripe_height(rows, k);
        let values = out.allocate_dense();
        values
            .par_chunks_mut((height * cols).max(1))
            .enumerate()
            .for_each(|(stripe, chunk)| {
                let rl = stripe * height;
                let ru = (rl + chunk.len() / cols.max(1)).min(rows);
                for (i, g) in m.col_groups().iter().enumerate() {
                    if Some(i) == skip {
                        continue;
                    }
                    g.add_into(chunk, cols, rl, ru);
                }
            });
    }

    out.recompute_nnz();
    out.exam_sparsity();

    let arc = Arc::new(out);
    m.cache.store(&arc);
    arc
}
