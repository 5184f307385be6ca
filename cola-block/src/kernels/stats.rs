/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Order-statistic and grouping kernels.
//!
//! These are the delegation endpoints for compressed-matrix operations
//! that always decompress: weighted sort, quantile pick, central moments,
//! covariance, contingency tables and grouped aggregates.

use cola_utils::{AggKind, KahanSum};

use crate::block::MatrixBlock;
use crate::error::{BlockError, BlockResult};

fn require_column_vector(op: &'static str, m: &MatrixBlock) -> BlockResult<()> {
    if m.num_cols() != 1 {
        return Err(BlockError::NotAColumnVector {
            op,
            rows: m.num_rows(),
            cols: m.num_cols(),
        });
    }
    Ok(())
}

fn weighted_values(
    op: &'static str,
    data: &MatrixBlock,
    weights: Option<&MatrixBlock>,
) -> BlockResult<Vec<(f64, f64)>> {
    require_column_vector(op, data)?;
    if let Some(w) = weights {
        require_column_vector(op, w)?;
        if w.num_rows() != data.num_rows() {
            return Err(BlockError::DimensionMismatch {
                op,
                left: (data.num_rows(), data.num_cols()),
                right: (w.num_rows(), w.num_cols()),
            });
        }
    }
    Ok((0..data.num_rows())
        .map(|r| {
            let w = weights.map_or(1.0, |w| w.get(r, 0));
            (data.get(r, 0), w)
        })
        .collect())
}

/// Sort a column vector, carrying weights, into a `rows x 2` block of
/// `(value, weight)` pairs ordered by value.
pub fn sort_with_weights(
    data: &MatrixBlock,
    weights: Option<&MatrixBlock>,
) -> BlockResult<MatrixBlock> {
    let mut pairs = weighted_values("sort", data, weights)?;
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut values = Vec::with_capacity(pairs.len() * 2);
    for (v, w) in pairs {
        values.push(v);
        values.push(w);
    }
    Ok(MatrixBlock::from_dense(data.num_rows(), 2, values))
}

/// Pick the weighted `quantile` from a column vector; `average` averages
/// the two straddling values at an exact boundary (used for medians over
/// even weight totals).
pub fn pick_value(
    data: &MatrixBlock,
    weights: Option<&MatrixBlock>,
    quantile: f64,
    average: bool,
) -> BlockResult<f64> {
    let mut pairs = weighted_values("pick_value", data, weights)?;
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let total: f64 = pairs.iter().map(|&(_, w)| w).sum();
    if total <= 0.0 {
        return Err(BlockError::InvalidValue {
            op: "pick_value",
            value: total,
        });
    }
    let target = quantile * total;
    let mut cumulative = 0.0;
    for (i, &(v, w)) in pairs.iter().enumerate() {
        cumulative += w;
        if cumulative >= target {
            if average && cumulative == target && i + 1 < pairs.len() {
                return Ok((v + pairs[i + 1].0) / 2.0);
            }
            return Ok(v);
        }
    }
    Ok(pairs.last().map_or(0.0, |&(v, _)| v))
}

/// The weighted central moment of the given order (order 0 returns the
/// weight total, order 1 is identically zero, order 2 is the population
/// variance).
pub fn central_moment(
    data: &MatrixBlock,
    weights: Option<&MatrixBlock>,
    order: u32,
) -> BlockResult<f64> {
    let pairs = weighted_values("central_moment", data, weights)?;
    let total: f64 = pairs.iter().map(|&(_, w)| w).sum();
    if order == 0 {
        return Ok(total);
    }
    if total <= 0.0 {
        return Err(BlockError::InvalidValue {
            op: "central_moment",
            value: total,
        });
    }
    let mean = pairs.iter().map(|&(v, w)| v * w).sum::<f64>() / total;
    let mut acc = KahanSum::new();
    for &(v, w) in &pairs {
        acc.add(w * (v - mean).powi(order as i32));
    }
    Ok(acc.value() / total)
}

/// The weighted covariance of two column vectors.
pub fn covariance(
    a: &MatrixBlock,
    b: &MatrixBlock,
    weights: Option<&MatrixBlock>,
) -> BlockResult<f64> {
    let left = weighted_values("covariance", a, weights)?;
    let right = weighted_values("covariance", b, weights)?;
    if left.len() != right.len() {
        return Err(BlockError::DimensionMismatch {
            op: "covariance",
            left: (a.num_rows(), a.num_cols()),
            right: (b.num_rows(), b.num_cols()),
        });
    }
    let total: f64 = left.iter().map(|&(_, w)| w).sum();
    if total <= 0.0 {
        return Err(BlockError::InvalidValue {
            op: "covariance",
            value: total,
        });
    }
    let mean_a = left.iter().map(|&(v, w)| v * w).sum::<f64>() / total;
    let mean_b = right.iter().map(|&(v, w)| v * w).sum::<f64>() / total;
    let mut acc = KahanSum::new();
    for (&(va, w), &(vb, _)) in left.iter().zip(right.iter()) {
        acc.add(w * (va - mean_a) * (vb - mean_b));
    }
    Ok(acc.value() / total)
}

/// Build a contingency table from two category vectors: cell
/// `(a[r] - 1, b[r] - 1)` accumulates `weight`. Non-positive, fractional
/// or non-finite categories are skipped, as is conventional for ctable.
pub fn ctable(
    a: &MatrixBlock,
    b: &MatrixBlock,
    weight: f64,
) -> BlockResult<MatrixBlock> {
    require_column_vector("ctable", a)?;
    require_column_vector("ctable", b)?;
    if a.num_rows() != b.num_rows() {
        return Err(BlockError::DimensionMismatch {
            op: "ctable",
            left: (a.num_rows(), a.num_cols()),
            right: (b.num_rows(), b.num_cols()),
        });
    }
    let valid = |v: f64| v.is_finite() && v >= 1.0 && v == v.trunc();
    let mut max_a = 0usize;
    let mut max_b = 0usize;
    for r in 0..a.num_rows() {
        let (va, vb) = (a.get(r, 0), b.get(r, 0));
        if valid(va) && valid(vb) {
            max_a = max_a.max(va as usize);
            max_b = max_b.max(vb as usize);
        }
    }
    let mut out = MatrixBlock::new(max_a, max_b, true);
    for r in 0..a.num_rows() {
        let (va, vb) = (a.get(r, 0), b.get(r, 0));
        if valid(va) && valid(vb) {
            let (i, j) = (va as usize - 1, vb as usize - 1);
            out.set(i, j, out.get(i, j) + weight);
        }
    }
    out.exam_sparsity();
    Ok(out)
}

/// Grouped aggregate: reduce `target[r]` into bucket `groups[r] - 1` of an
/// `ngroups x 1` result.
pub fn grouped_aggregate(
    target: &MatrixBlock,
    groups: &MatrixBlock,
    weights: Option<&MatrixBlock>,
    ngroups: usize,
    kind: AggKind,
) -> BlockResult<MatrixBlock> {
    let values = weighted_values("grouped_aggregate", target, weights)?;
    require_column_vector("grouped_aggregate", groups)?;
    if groups.num_rows() != target.num_rows() {
        return Err(BlockError::DimensionMismatch {
            op: "grouped_aggregate",
            left: (target.num_rows(), target.num_cols()),
            right: (groups.num_rows(), groups.num_cols()),
        });
    }
    let mut sums = vec![KahanSum::new(); ngroups];
    let mut counts = vec![0.0f64; ngroups];
    let mut mins = vec![f64::INFINITY; ngroups];
    let mut maxs = vec![f64::NEG_INFINITY; ngroups];
    let mut prods: Vec<Option<f64>> = vec![None; ngroups];
    for (r, &(v, w)) in values.iter().enumerate() {
        let g = groups.get(r, 0);
        if !(g.is_finite() && g >= 1.0 && g == g.trunc() && (g as usize) <= ngroups) {
            continue;
        }
        let g = g as usize - 1;
        match kind {
            AggKind::Sum | AggKind::Mean => sums[g].add(v * w),
            AggKind::SumSq => sums[g].add(v * v * w),
            AggKind::Min => mins[g] = mins[g].min(v),
            AggKind::Max => maxs[g] = maxs[g].max(v),
            // products carry no weight semantics; fold plainly
            AggKind::Product => prods[g] = Some(prods[g].unwrap_or(1.0) * v),
        }
        counts[g] += w;
    }
    let values: Vec<f64> = (0..ngroups)
        .map(|g| match kind {
            AggKind::Sum | AggKind::SumSq => sums[g].value(),
            AggKind::Mean => {
                if counts[g] == 0.0 {
                    0.0
                } else {
                    sums[g].value() / counts[g]
                }
            }
            AggKind::Min => {
                if mins[g].is_finite() {
                    mins[g]
                } else {
                    0.0
                }
            }
            AggKind::Max => {
                if maxs[g].is_finite() {
                    maxs[g]
                } else {
                    0.0
                }
            }
            AggKind::Product => prods[g].unwrap_or(0.0),
        })
        .collect();
    Ok(MatrixBlock::column_vector(values))
}
