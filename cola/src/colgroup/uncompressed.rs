/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The uncompressed column group: an embedded dense/sparse block covering
//! a subset of columns.

use std::sync::Arc;

use cola_block::MatrixBlock;
use cola_utils::{AggDir, AggKind, AggOp, BinaryOp, KahanSum};

use super::{gather_rows, ColGroup};

/// The embedded block is shared: a matrix built around a pre-existing
/// uncompressed block hands the same allocation to its decompression
/// cache, and single-group decompression returns it without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct ColGroupUncompressed {
    pub(crate) cols: Box<[u32]>,
    /// `nrows x cols.len()` cells, locally indexed.
    pub(crate) data: Arc<MatrixBlock>,
}

impl ColGroupUncompressed {
    pub fn new(cols: Box<[u32]>, data: MatrixBlock) -> Self {
        debug_assert_eq!(cols.len(), data.num_cols());
        Self {
            cols,
            data: Arc::new(data),
        }
    }

    /// Wrap a full block as a group spanning columns `0..block.num_cols()`.
    pub fn spanning(data: MatrixBlock) -> Self {
        Self::spanning_shared(Arc::new(data))
    }

    /// Shared-allocation variant of [`ColGroupUncompressed::spanning`].
    pub fn spanning_shared(data: Arc<MatrixBlock>) -> Self {
        let cols: Vec<u32> = (0..data.num_cols() as u32).collect();
        debug_assert_eq!(cols.len(), data.num_cols());
        Self { cols: cols.into_boxed_slice(), data }
    }

    pub fn data(&self) -> &MatrixBlock {
        &self.data
    }

    pub fn data_arc(&self) -> &Arc<MatrixBlock> {
        &self.data
    }

    pub(crate) fn get(&self, r: usize, local: usize) -> f64 {
        self.data.get(r, local)
    }

    pub(crate) fn add_into(
        &self,
        dst: &mut [f64],
        stride: usize,
        rl: usize,
        ru: usize,
        cols: &[u32],
    ) {
        for r in rl..ru {
            let row = &mut dst[(r - rl) * stride..];
            self.data.for_each_in_row(r, |j, v| {
                row[cols[j] as usize] += v;
            });
        }
    }

    pub(crate) fn sum(&self, _nrows: usize, square: bool) -> f64 {
        let kind = if square { AggKind::SumSq } else { AggKind::Sum };
        self.data
            .aggregate_unary(AggOp::new(kind, AggDir::All))
            .get(0, 0)
    }

    pub(crate) fn row_sums(&self, out: &mut [f64], rl: usize, ru: usize, square: bool) {
        for r in rl..ru {
            let mut acc = KahanSum::new();
            self.data.for_each_in_row(r, |_, v| {
                acc.add(if square { v * v } else { v });
            });
            out[r - rl] += acc.value();
        }
    }

    pub(crate) fn col_sums(&self, out: &mut [f64], _nrows: usize, square: bool) {
        let kind = if square { AggKind::SumSq } else { AggKind::Sum };
        let sums = self.data.aggregate_unary(AggOp::new(kind, AggDir::Col));
        for (j, &c) in self.cols.iter().enumerate() {
            out[c as usize] += sums.get(0, j);
        }
    }

    pub(crate) fn mxx(&self, init: f64, min: bool, nrows: usize) -> f64 {
        if nrows == 0 || self.cols.is_empty() {
            return init;
        }
        let kind = if min { AggKind::Min } else { AggKind::Max };
        let v = self.data.aggregate_unary(AggOp::new(kind, AggDir::All)).get(0, 0);
        if min {
            init.min(v)
        } else {
            init.max(v)
        }
    }

    pub(crate) fn col_mxx(&self, out: &mut [f64], min: bool, nrows: usize) {
        if nrows == 0 {
            return;
        }
        let kind = if min { AggKind::Min } else { AggKind::Max };
        let m = self.data.aggregate_unary(AggOp::new(kind, AggDir::Col));
        for (j, &c) in self.cols.iter().enumerate() {
            let slot = &mut out[c as usize];
            let v = m.get(0, j);
            *slot = if min { slot.min(v) } else { slot.max(v) };
        }
    }

    pub(crate) fn row_mxx(&self, out: &mut [f64], rl: usize, ru: usize, min: bool) {
        if self.cols.is_empty() {
            return;
        }
        for r in rl..ru {
            let mut v = if min { f64::INFINITY } else { f64::NEG_INFINITY };
            for j in 0..self.cols.len() {
                let cell = self.data.get(r, j);
                v = if min { v.min(cell) } else { v.max(cell) };
            }
            let slot = &mut out[r - rl];
            *slot = if min { slot.min(v) } else { slot.max(v) };
        }
    }

    pub(crate) fn product(&self, nrows: usize) -> f64 {
        let mut acc = 1.0;
        for r in 0..nrows {
            for j in 0..self.cols.len() {
                acc *= self.data.get(r, j);
            }
        }
        acc
    }

    pub(crate) fn row_products(&self, out: &mut [f64], rl: usize, ru: usize) {
        for r in rl..ru {
            let mut acc = 1.0;
            for j in 0..self.cols.len() {
                acc *= self.data.get(r, j);
            }
            out[r - rl] *= acc;
        }
    }

    pub(crate) fn col_products(&self, out: &mut [f64], nrows: usize) {
        for (j, &c) in self.cols.iter().enumerate() {
            let mut acc = 1.0;
            for r in 0..nrows {
                acc *= self.data.get(r, j);
            }
            out[c as usize] *= acc;
        }
    }

    pub(crate) fn map_values(&self, f: &dyn Fn(f64) -> f64, zero_preserving: bool) -> ColGroup {
        ColGroup::Uncompressed(Self::new(
            self.cols.clone(),
            self.data.map_cells(f, zero_preserving),
        ))
    }

    pub(crate) fn binary_row_op(&self, op: BinaryOp, v: &[f64], left_side: bool) -> ColGroup {
        let (rows, ncols) = (self.data.num_rows(), self.cols.len());
        let mut values = vec![0.0; rows * ncols];
        for r in 0..rows {
            for (j, &c) in self.cols.iter().enumerate() {
                let cell = self.data.get(r, j);
                let vc = v[c as usize];
                values[r * ncols + j] = if left_side {
                    op.apply(vc, cell)
                } else {
                    op.apply(cell, vc)
                };
            }
        }
        let mut data = MatrixBlock::from_dense(rows, ncols, values);
        data.exam_sparsity();
        ColGroup::Uncompressed(Self::new(self.cols.clone(), data))
    }

    pub(crate) fn replace(&self, pattern: f64, replacement: f64) -> ColGroup {
        ColGroup::Uncompressed(Self::new(
            self.cols.clone(),
            self.data.replace(pattern, replacement),
        ))
    }

    pub(crate) fn right_mult(&self, right: &MatrixBlock) -> Option<ColGroup> {
        if right.is_empty() {
            return None;
        }
        let gathered = gather_rows(right, &self.cols);
        let product = self.data.multiply(&gathered, 1).ok()?;
        Some(ColGroup::Uncompressed(Self::spanning(product)))
    }

    pub(crate) fn left_mult_row(&self, lrow: &[f64], out_row: &mut [f64]) {
        for (r, &lv) in lrow.iter().enumerate() {
            if lv == 0.0 {
                continue;
            }
            self.data.for_each_in_row(r, |j, v| {
                out_row[self.cols[j] as usize] += lv * v;
            });
        }
    }

    pub(crate) fn tsmm_into(&self, dst: &mut [f64], n: usize, nrows: usize) {
        let ncols = self.cols.len();
        let mut buf = vec![0.0; ncols];
        for r in 0..nrows {
            self.data.copy_row_into(r, &mut buf);
            for i in 0..ncols {
                let v = buf[i];
                if v == 0.0 {
                    continue;
                }
                let off = self.cols[i] as usize * n;
                for j in i..ncols {
                    dst[off + self.cols[j] as usize] += v * buf[j];
                }
            }
        }
    }

    pub(crate) fn slice_columns(&self, cl: usize, cu: usize) -> Option<ColGroup> {
        let (lo, hi, cols) = super::slice_col_range(&self.cols, cl, cu)?;
        let rows = self.data.num_rows();
        let width = hi - lo;
        let mut values = vec![0.0; rows * width];
        for r in 0..rows {
            for (out_j, j) in (lo..hi).enumerate() {
                values[r * width + out_j] = self.data.get(r, j);
            }
        }
        let mut data = MatrixBlock::from_dense(rows, width, values);
        data.exam_sparsity();
        Some(ColGroup::Uncompressed(Self::new(cols, data)))
    }

    pub(crate) fn contains_value(&self, pattern: f64) -> bool {
        self.data.contains_value(pattern)
    }

    pub(crate) fn nnz(&self, _nrows: usize) -> u64 {
        self.data.nnz()
    }
}
