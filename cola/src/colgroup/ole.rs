/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The offset-list encoded column group: per-value sorted row offsets.
//! Rows named by no list are implicit zero.

use cola_block::MatrixBlock;
use cola_utils::BinaryOp;

use super::codes::CodeMap;
use super::ddc::ColGroupDdc;
use super::{gather_rows, powi_count, preagg_mult, tsmm_dict, ColGroup};
use crate::dictionary::Dictionary;

#[derive(Debug, Clone, PartialEq)]
pub struct ColGroupOle {
    pub(crate) cols: Box<[u32]>,
    pub(crate) dict: Dictionary,
    /// Offset boundaries per value: value `k` owns
    /// `offsets[ptr[k]..ptr[k+1]]`.
    pub(crate) ptr: Box<[u32]>,
    /// Row offsets, ascending within each value.
    pub(crate) offsets: Box<[u32]>,
    pub(crate) counts: Box<[u32]>,
}

impl ColGroupOle {
    pub fn new(cols: Box<[u32]>, dict: Dictionary, ptr: Box<[u32]>, offsets: Box<[u32]>) -> Self {
        let nv = dict.num_values(cols.len());
        debug_assert_eq!(ptr.len(), nv + 1);
        let counts: Vec<u32> = (0..nv).map(|k| ptr[k + 1] - ptr[k]).collect();
        Self {
            cols,
            dict,
            ptr,
            offsets,
            counts: counts.into_boxed_slice(),
        }
    }

    fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub(crate) fn num_values(&self) -> usize {
        self.counts.len()
    }

    fn zero_rows(&self, nrows: usize) -> u64 {
        nrows as u64 - self.offsets.len() as u64
    }

    fn value_offsets(&self, k: usize) -> &[u32] {
        &self.offsets[self.ptr[k] as usize..self.ptr[k + 1] as usize]
    }

    fn value_at(&self, r: usize) -> Option<usize> {
        (0..self.num_values()).find(|&k| self.value_offsets(k).binary_search(&(r as u32)).is_ok())
    }

    fn for_each_covered(&self, rl: usize, ru: usize, mut f: impl FnMut(usize, usize)) {
        for k in 0..self.num_values() {
            let offsets = self.value_offsets(k);
            let from = offsets.partition_point(|&o| (o as usize) < rl);
            for &o in &offsets[from..] {
                let r = o as usize;
                if r >= ru {
                    break;
                }
                f(r, k);
            }
        }
    }

    pub(crate) fn get(&self, r: usize, local: usize) -> f64 {
        match self.value_at(r) {
            Some(k) => self.dict.tuple_cell(k, local, self.ncols()),
            None => 0.0,
        }
    }

    pub(crate) fn add_into(
        &self,
        dst: &mut [f64],
        stride: usize,
        rl: usize,
        ru: usize,
        cols: &[u32],
    ) {
        let ncols = self.ncols();
        self.for_each_covered(rl, ru, |r, k| {
            let row = &mut dst[(r - rl) * stride..];
            for (j, &c) in cols.iter().enumerate() {
                row[c as usize] += self.dict.tuple_cell(k, j, ncols);
            }
        });
    }

    pub(crate) fn sum(&self, _nrows: usize, square: bool) -> f64 {
        if square {
            self.dict.sum_sq(&self.counts, self.ncols())
        } else {
            self.dict.sum(&self.counts, self.ncols())
        }
    }

    pub(crate) fn row_sums(&self, out: &mut [f64], rl: usize, ru: usize, square: bool) {
        let per_tuple = self.dict.sum_all_rows(square, self.ncols());
        self.for_each_covered(rl, ru, |r, k| {
            out[r - rl] += per_tuple[k];
        });
    }

    pub(crate) fn col_sums(&self, out: &mut [f64], _nrows: usize, square: bool) {
        self.dict.col_sum(out, &self.counts, &self.cols, square);
    }

    pub(crate) fn mxx(&self, init: f64, min: bool, nrows: usize) -> f64 {
        if nrows == 0 || self.cols.is_empty() {
            return init;
        }
        let f = if min { f64::min } else { f64::max };
        let mut acc = self.dict.aggregate(init, self.ncols(), f);
        if self.zero_rows(nrows) > 0 {
            acc = f(acc, 0.0);
        }
        acc
    }

    pub(crate) fn col_mxx(&self, out: &mut [f64], min: bool, nrows: usize) {
        if nrows == 0 {
            return;
        }
        let f = if min { f64::min } else { f64::max };
        self.dict.aggregate_cols(out, &self.cols, self.ncols(), f);
        if self.zero_rows(nrows) > 0 {
            for &c in self.cols.iter() {
                let slot = &mut out[c as usize];
                *slot = f(*slot, 0.0);
            }
        }
    }

    pub(crate) fn row_mxx(&self, out: &mut [f64], rl: usize, ru: usize, min: bool) {
        if self.cols.is_empty() {
            return;
        }
        let f = if min { f64::min } else { f64::max };
        let init = if min { f64::INFINITY } else { f64::NEG_INFINITY };
        let per_tuple = self.dict.aggregate_tuples(init, self.ncols(), f);
        let mut covered = vec![false; ru - rl];
        self.for_each_covered(rl, ru, |r, k| {
            let slot = &mut out[r - rl];
            *slot = f(*slot, per_tuple[k]);
            covered[r - rl] = true;
        });
        for (i, c) in covered.iter().enumerate() {
            if !c {
                out[i] = f(out[i], 0.0);
            }
        }
    }

    pub(crate) fn product(&self, nrows: usize) -> f64 {
        if self.zero_rows(nrows) > 0 {
            return 0.0;
        }
        let mut acc = 1.0;
        for k in 0..self.num_values() {
            let count = self.counts[k] as u64;
            if count == 0 {
                continue;
            }
            for j in 0..self.ncols() {
                acc *= powi_count(self.dict.tuple_cell(k, j, self.ncols()), count);
            }
        }
        acc
    }

    pub(crate) fn row_products(&self, out: &mut [f64], rl: usize, ru: usize) {
        if self.cols.is_empty() {
            return;
        }
        let per_tuple = self.dict.aggregate_tuples(1.0, self.ncols(), |acc, v| acc * v);
        let mut covered = vec![false; ru - rl];
        self.for_each_covered(rl, ru, |r, k| {
            out[r - rl] *= per_tuple[k];
            covered[r - rl] = true;
        });
        for (i, c) in covered.iter().enumerate() {
            if !c {
                out[i] = 0.0;
            }
        }
    }

    pub(crate) fn col_products(&self, out: &mut [f64], nrows: usize) {
        let zero = self.zero_rows(nrows) > 0;
        for (j, &c) in self.cols.iter().enumerate() {
            if zero {
                out[c as usize] = 0.0;
                continue;
            }
            let mut acc = 1.0;
            for k in 0..self.num_values() {
                let count = self.counts[k] as u64;
                if count > 0 {
                    acc *= powi_count(self.dict.tuple_cell(k, j, self.ncols()), count);
                }
            }
            out[c as usize] *= acc;
        }
    }

    /// Explicit per-row codes, interning a zero tuple for uncovered rows.
    pub(crate) fn to_ddc(&self, nrows: usize) -> ColGroupDdc {
        let ncols = self.ncols();
        let nv = self.num_values();
        let has_zero = self.zero_rows(nrows) > 0;
        let total = if has_zero { nv + 1 } else { nv };
        let mut values = Vec::with_capacity(total * ncols);
        for k in 0..nv {
            for j in 0..ncols {
                values.push(self.dict.tuple_cell(k, j, ncols));
            }
        }
        if has_zero {
            values.resize(total * ncols, 0.0);
        }
        let mut codes = vec![if has_zero { nv } else { 0 }; nrows];
        self.for_each_covered(0, nrows, |r, k| codes[r] = k);
        ColGroupDdc::new(
            self.cols.clone(),
            Dictionary::dense(values),
            CodeMap::from_codes(&codes, total),
        )
    }

    pub(crate) fn map_values(
        &self,
        f: &dyn Fn(f64) -> f64,
        zero_preserving: bool,
        nrows: usize,
    ) -> ColGroup {
        if zero_preserving {
            ColGroup::Ole(Self::new(
                self.cols.clone(),
                self.dict.map_values(f, true),
                self.ptr.clone(),
                self.offsets.clone(),
            ))
        } else {
            self.to_ddc(nrows).map_values(f, false)
        }
    }

    pub(crate) fn binary_row_op(
        &self,
        op: BinaryOp,
        v: &[f64],
        left_side: bool,
        nrows: usize,
    ) -> ColGroup {
        let zero_preserving = self.cols.iter().all(|&c| {
            let vc = v[c as usize];
            let r = if left_side {
                op.apply(vc, 0.0)
            } else {
                op.apply(0.0, vc)
            };
            r == 0.0
        });
        if zero_preserving {
            ColGroup::Ole(Self::new(
                self.cols.clone(),
                self.dict.apply_binary_row(op, v, &self.cols, left_side),
                self.ptr.clone(),
                self.offsets.clone(),
            ))
        } else {
            self.to_ddc(nrows).binary_row_op(op, v, left_side)
        }
    }

    pub(crate) fn replace(&self, pattern: f64, replacement: f64, nrows: usize) -> ColGroup {
        if pattern == 0.0 && replacement != 0.0 && self.zero_rows(nrows) > 0 {
            self.to_ddc(nrows).replace(pattern, replacement)
        } else {
            ColGroup::Ole(Self::new(
                self.cols.clone(),
                self.dict.replace(pattern, replacement),
                self.ptr.clone(),
                self.offsets.clone(),
            ))
        }
    }

    pub(crate) fn right_mult(&self, right: &MatrixBlock) -> Option<ColGroup> {
        if right.is_empty() {
            return None;
        }
        let gathered = gather_rows(right, &self.cols);
        let product = self
            .dict
            .to_block(self.ncols())
            .multiply(&gathered, 1)
            .ok()?;
        let cols: Vec<u32> = (0..right.num_cols() as u32).collect();
        Some(ColGroup::Ole(Self::new(
            cols.into_boxed_slice(),
            Dictionary::from_block(product),
            self.ptr.clone(),
            self.offsets.clone(),
        )))
    }

    pub(crate) fn left_mult_row(&self, lrow: &[f64], out_row: &mut [f64]) {
        let mut preagg = vec![0.0; self.num_values()];
        for (k, slot) in preagg.iter_mut().enumerate() {
            for &o in self.value_offsets(k) {
                *slot += lrow[o as usize];
            }
        }
        preagg_mult(&self.dict, self.ncols(), &self.cols, &preagg, out_row);
    }

    pub(crate) fn tsmm_into(&self, dst: &mut [f64], n: usize, _nrows: usize) {
        tsmm_dict(dst, n, &self.cols, &self.dict, &self.counts);
    }

    pub(crate) fn slice_columns(&self, cl: usize, cu: usize) -> Option<ColGroup> {
        let (lo, hi, cols) = super::slice_col_range(&self.cols, cl, cu)?;
        Some(ColGroup::Ole(Self::new(
            cols,
            self.dict.slice_columns(lo, hi, self.ncols()),
            self.ptr.clone(),
            self.offsets.clone(),
        )))
    }

    pub(crate) fn contains_value(&self, pattern: f64, nrows: usize) -> bool {
        if pattern == 0.0 && self.zero_rows(nrows) > 0 {
            return true;
        }
        self.dict.contains_value(pattern, self.ncols())
    }

    pub(crate) fn nnz(&self, _nrows: usize) -> u64 {
        self.dict.nnz_weighted(&self.counts, self.ncols())
    }
}
