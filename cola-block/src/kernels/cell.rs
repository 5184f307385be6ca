/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Cell-wise kernels: scalar ops, binary ops with broadcasting, unary
//! aggregates, replace and contains.

use cola_utils::{AggDir, AggKind, AggOp, BinaryOp, KahanSum, ScalarOp};

use crate::block::{BlockData, MatrixBlock};
use crate::error::{BlockError, BlockResult};

/// Apply `op` to every cell, producing a new block.
pub fn scalar_op(m: &MatrixBlock, op: ScalarOp) -> MatrixBlock {
    map_cells(m, |v| op.apply(v), op.is_sparse_safe())
}

/// Apply an arbitrary cell function. `zero_preserving` must be `true` only
/// if `f(0) == 0`; it allows sparse and empty layouts to skip their
/// implicit zeros.
pub fn map_cells(m: &MatrixBlock, f: impl Fn(f64) -> f64, zero_preserving: bool) -> MatrixBlock {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    let mut out = match (m.data(), zero_preserving) {
        (BlockData::Empty, true) => MatrixBlock::zeros(rows, cols),
        (BlockData::Sparse(s), true) => {
            let mut out = MatrixBlock::new(rows, cols, true);
            for r in 0..rows {
                for (c, v) in s.row(r).iter() {
                    out.set(r, c, f(v));
                }
            }
            out
        }
        _ => {
            let mut out = MatrixBlock::new(rows, cols, false);
            let values = out.allocate_dense();
            for r in 0..rows {
                for c in 0..cols {
                    values[r * cols + c] = f(m.get(r, c));
                }
            }
            out
        }
    };
    out.recompute_nnz();
    out.exam_sparsity();
    out
}

/// The broadcast shape of a binary rhs relative to the lhs.
enum Broadcast {
    Scalar,
    RowVector,
    ColVector,
    Full,
}

fn classify_rhs(l: &MatrixBlock, r: &MatrixBlock, op_name: &'static str) -> BlockResult<Broadcast> {
    if r.num_rows() == 1 && r.num_cols() == 1 {
        Ok(Broadcast::Scalar)
    } else if r.num_rows() == l.num_rows() && r.num_cols() == l.num_cols() {
        Ok(Broadcast::Full)
    } else if r.num_rows() == 1 && r.num_cols() == l.num_cols() {
        Ok(Broadcast::RowVector)
    } else if r.num_cols() == 1 && r.num_rows() == l.num_rows() {
        Ok(Broadcast::ColVector)
    } else {
        Err(BlockError::DimensionMismatch {
            op: op_name,
            left: (l.num_rows(), l.num_cols()),
            right: (r.num_rows(), r.num_cols()),
        })
    }
}

/// Cell-wise `op(l, r)` with scalar, row-vector and column-vector
/// broadcasting of the right operand.
pub fn binary_op(l: &MatrixBlock, op: BinaryOp, r: &MatrixBlock) -> BlockResult<MatrixBlock> {
    let (rows, cols) = (l.num_rows(), l.num_cols());
    let broadcast = classify_rhs(l, r, "binary_op")?;
    let mut out = MatrixBlock::new(rows, cols, false);
    {
        let values = out.allocate_dense();
        for row in 0..rows {
            for col in 0..cols {
                let rv = match broadcast {
                    Broadcast::Scalar => r.get(0, 0),
                    Broadcast::RowVector => r.get(0, col),
                    Broadcast::ColVector => r.get(row, 0),
                    Broadcast::Full => r.get(row, col),
                };
                values[row * cols + col] = op.apply(l.get(row, col), rv);
            }
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}

/// In-place variant of [`binary_op`] for the chain kernel; the left block
/// is densified.
pub fn binary_op_in_place(l: &mut MatrixBlock, op: BinaryOp, r: &MatrixBlock) -> BlockResult<()> {
    let result = binary_op(l, op, r)?;
    *l = result;
    Ok(())
}

/// Unary aggregate producing a `1x1`, `rows x 1` or `1 x cols` block.
pub fn aggregate_unary(m: &MatrixBlock, op: AggOp) -> MatrixBlock {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    match op.dir {
        AggDir::All => {
            let v = fold_all(m, op.kind);
            MatrixBlock::from_dense(1, 1, vec![v])
        }
        AggDir::Row => {
            let mut values = Vec::with_capacity(rows);
            for r in 0..rows {
                values.push(fold_cells(op.kind, (0..cols).map(|c| m.get(r, c))));
            }
            MatrixBlock::column_vector(values)
        }
        AggDir::Col => {
            let mut values = Vec::with_capacity(cols);
            for c in 0..cols {
                values.push(fold_cells(op.kind, (0..rows).map(|r| m.get(r, c))));
            }
            MatrixBlock::row_vector(values)
        }
    }
}

fn fold_all(m: &MatrixBlock, kind: AggKind) -> f64 {
    fold_cells(
        kind,
        (0..m.num_rows()).flat_map(|r| (0..m.num_cols()).map(move |c| m.get(r, c))),
    )
}

fn fold_cells(kind: AggKind, cells: impl Iterator<Item = f64>) -> f64 {
    match kind {
        AggKind::Sum => {
            let mut acc = KahanSum::new();
            cells.for_each(|v| acc.add(v));
            acc.value()
        }
        AggKind::SumSq => {
            let mut acc = KahanSum::new();
            cells.for_each(|v| acc.add_sq(v));
            acc.value()
        }
        AggKind::Mean => {
            let mut acc = KahanSum::new();
            let mut count = 0u64;
            cells.for_each(|v| {
                acc.add(v);
                count += 1;
            });
            if count == 0 {
                0.0
            } else {
                acc.value() / count as f64
            }
        }
        AggKind::Min => cells.fold(f64::INFINITY, f64::min),
        AggKind::Max => cells.fold(f64::NEG_INFINITY, f64::max),
        AggKind::Product => cells.fold(1.0, |acc, v| acc * v),
    }
}

/// Merge `delta` into `acc` with a per-cell Kahan correction carried in
/// `correction` (the distributed-aggregation merge step).
pub fn incremental_aggregate(
    acc: &mut MatrixBlock,
    correction: &mut MatrixBlock,
    delta: &MatrixBlock,
) -> BlockResult<()> {
    let (rows, cols) = (acc.num_rows(), acc.num_cols());
    for operand in [&*correction, delta] {
        if operand.num_rows() != rows || operand.num_cols() != cols {
            return Err(BlockError::DimensionMismatch {
                op: "incremental_aggregate",
                left: (rows, cols),
                right: (operand.num_rows(), operand.num_cols()),
            });
        }
    }
    for r in 0..rows {
        for c in 0..cols {
            let corrected = delta.get(r, c) + correction.get(r, c);
            let sum = acc.get(r, c);
            let new_sum = sum + corrected;
            correction.set(r, c, corrected - (new_sum - sum));
            acc.set(r, c, new_sum);
        }
    }
    Ok(())
}

/// The weighted squared loss `sum(w ⊙ (x - u * t(v))^2)` (the quaternary
/// kernel the compressed path delegates to).
pub fn weighted_square_loss(
    x: &MatrixBlock,
    u: &MatrixBlock,
    v: &MatrixBlock,
    w: Option<&MatrixBlock>,
) -> BlockResult<f64> {
    let (rows, cols) = (x.num_rows(), x.num_cols());
    if u.num_rows() != rows || v.num_rows() != cols || u.num_cols() != v.num_cols() {
        return Err(BlockError::DimensionMismatch {
            op: "weighted_square_loss",
            left: (u.num_rows(), u.num_cols()),
            right: (v.num_rows(), v.num_cols()),
        });
    }
    if let Some(w) = w {
        if w.num_rows() != rows || w.num_cols() != cols {
            return Err(BlockError::DimensionMismatch {
                op: "weighted_square_loss",
                left: (rows, cols),
                right: (w.num_rows(), w.num_cols()),
            });
        }
    }
    let rank = u.num_cols();
    let mut acc = KahanSum::new();
    for r in 0..rows {
        for c in 0..cols {
            let weight = w.map_or(1.0, |w| w.get(r, c));
            if weight == 0.0 {
                continue;
            }
            let mut estimate = 0.0;
            for l in 0..rank {
                estimate += u.get(r, l) * v.get(c, l);
            }
            let residual = x.get(r, c) - estimate;
            acc.add(weight * residual * residual);
        }
    }
    Ok(acc.value())
}

/// Whether `v` matches `pattern`, with NaN matching NaN.
#[inline]
pub fn matches_pattern(v: f64, pattern: f64) -> bool {
    v == pattern || (v.is_nan() && pattern.is_nan())
}

/// Replace every cell matching `pattern` with `replacement`.
pub fn replace(m: &MatrixBlock, pattern: f64, replacement: f64) -> MatrixBlock {
    // A zero (or NaN-free empty) pattern touches implicit zeros, so the
    // zero-preserving shortcut only applies to non-zero patterns.
    let zero_preserving = !matches_pattern(0.0, pattern) || replacement == 0.0;
    map_cells(
        m,
        |v| {
            if matches_pattern(v, pattern) {
                replacement
            } else {
                v
            }
        },
        zero_preserving,
    )
}

/// Whether any cell (including implicit zeros) equals `pattern`.
pub fn contains_value(m: &MatrixBlock, pattern: f64) -> bool {
    if matches_pattern(0.0, pattern) && m.nnz() < (m.num_rows() * m.num_cols()) as u64 {
        return true;
    }
    for r in 0..m.num_rows() {
        let mut found = false;
        m.for_each_in_row(r, |_, v| found |= matches_pattern(v, pattern));
        if found {
            return true;
        }
    }
    false
}
