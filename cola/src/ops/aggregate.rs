/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Unary aggregates over the compressed form.
//!
//! Sum, sum-of-squares, mean, min, max and product (with their row/column
//! variants) execute directly on the groups. Aggregates that do not
//! distribute over summed group contributions decompress when the matrix
//! is overlapping rather than raising, and degenerate shapes return the
//! dense kernel's empty-fold identities.

use cola_block::MatrixBlock;
use cola_utils::{stripe_height, AggDir, AggKind, AggOp, KahanSum};
use rayon::prelude::*;
use tracing::debug;

use crate::matrix::CompressedMatrix;

/// The value an empty fold reduces to, matching the dense kernel's
/// conventions.
fn empty_fold_value(kind: AggKind) -> f64 {
    match kind {
        AggKind::Sum | AggKind::SumSq | AggKind::Mean => 0.0,
        AggKind::Min => f64::INFINITY,
        AggKind::Max => f64::NEG_INFINITY,
        AggKind::Product => 1.0,
    }
}

pub fn aggregate_unary(m: &CompressedMatrix, op: AggOp, k: usize) -> MatrixBlock {
    // squaring, extrema and products read cell values, which overlapping
    // groups no longer expose individually
    let needs_collapse = matches!(
        op.kind,
        AggKind::SumSq | AggKind::Min | AggKind::Max | AggKind::Product
    );
    if m.is_overlapping() && needs_collapse {
        debug!(?op, "aggregate requires collapsed cells, decompressing");
        return m
            .get_uncompressed("aggregate on overlapping matrix", k)
            .aggregate_unary(op);
    }
    if m.num_rows() == 0 || m.num_cols() == 0 {
        let fill = empty_fold_value(op.kind);
        let (rows, cols) = match op.dir {
            AggDir::All => (1, 1),
            AggDir::Row => (m.num_rows(), 1),
            AggDir::Col => (1, m.num_cols()),
        };
        return MatrixBlock::from_dense(rows, cols, vec![fill; rows * cols]);
    }

    match op.dir {
        AggDir::All => MatrixBlock::from_dense(1, 1, vec![fold_all(m, op.kind)]),
        AggDir::Row => fold_rows(m, op.kind, k),
        AggDir::Col => fold_cols(m, op.kind),
    }
}

fn fold_all(m: &CompressedMatrix, kind: AggKind) -> f64 {
    let nrows = m.num_rows();
    match kind {
        AggKind::Sum | AggKind::SumSq | AggKind::Mean => {
            let square = kind == AggKind::SumSq;
            let mut acc = KahanSum::new();
            for g in m.col_groups() {
                acc.add(g.compute_sum(nrows, square));
            }
            if kind == AggKind::Mean {
                acc.value() / (nrows * m.num_cols()) as f64
            } else {
                acc.value()
            }
        }
        AggKind::Min | AggKind::Max => {
            let min = kind == AggKind::Min;
            let init = if min { f64::INFINITY } else { f64::NEG_INFINITY };
            m.col_groups()
                .iter()
                .fold(init, |acc, g| g.compute_mxx(acc, min, nrows))
        }
        // disjoint column sets multiply independently
        AggKind::Product => m
            .col_groups()
            .iter()
            .fold(1.0, |acc, g| acc * g.compute_product(nrows)),
    }
}

fn fold_rows(m: &CompressedMatrix, kind: AggKind, k: usize) -> MatrixBlock {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    let mut out = MatrixBlock::new(rows, 1, false);
    {
        let height = stripe_height(rows, k);
        let values = out.allocate_dense();
        values
            .par_chunks_mut(height.max(1))
            .enumerate()
            .for_each(|(stripe, chunk)| {
                let rl = stripe * height;
                let ru = (rl + chunk.len()).min(rows);
                match kind {
                    AggKind::Sum | AggKind::SumSq | AggKind::Mean => {
                        let square = kind == AggKind::SumSq;
                        for g in m.col_groups() {
                            g.compute_row_sums(chunk, rl, ru, square);
                        }
                        if kind == AggKind::Mean {
                            chunk.iter_mut().for_each(|v| *v /= cols as f64);
                        }
                    }
                    AggKind::Min | AggKind::Max => {
                        let min = kind == AggKind::Min;
                        chunk.fill(if min { f64::INFINITY } else { f64::NEG_INFINITY });
                        for g in m.col_groups() {
                            g.compute_row_mxx(chunk, rl, ru, min);
                        }
                    }
                    AggKind::Product => {
                        chunk.fill(1.0);
                        for g in m.col_groups() {
                            g.compute_row_products(chunk, rl, ru);
                        }
                    }
                }
            });
    }
    out.recompute_nnz();
    out
}

fn fold_cols(m: &CompressedMatrix, kind: AggKind) -> MatrixBlock {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    let mut out = MatrixBlock::new(1, cols, false);
    {
        let values = out.allocate_dense();
        match kind {
            AggKind::Sum | AggKind::SumSq | AggKind::Mean => {
                let square = kind == AggKind::SumSq;
                for g in m.col_groups() {
                    g.compute_col_sums(values, rows, square);
                }
                if kind == AggKind::Mean {
                    values.iter_mut().for_each(|v| *v /= rows as f64);
                }
            }
            AggKind::Min | AggKind::Max => {
                let min = kind == AggKind::Min;
                values.fill(if min { f64::INFINITY } else { f64::NEG_INFINITY });
                for g in m.col_groups() {
                    g.compute_col_mxx(values, min, rows);
                }
            }
            AggKind::Product => {
                values.fill(1.0);
                for g in m.col_groups() {
                    g.compute_col_products(values, rows);
                }
            }
        }
    }
    out.recompute_nnz();
    out
}
