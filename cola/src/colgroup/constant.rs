/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The constant column group: one dictionary tuple shared by every row.

use cola_block::MatrixBlock;
use cola_utils::{BinaryOp, KahanSum};

use super::empty::constant_or_empty;
use super::{gather_rows, powi_count, tsmm_tuple, ColGroup};
use crate::dictionary::Dictionary;

#[derive(Debug, Clone, PartialEq)]
pub struct ColGroupConst {
    pub(crate) cols: Box<[u32]>,
    pub(crate) dict: Dictionary,
}

impl ColGroupConst {
    pub fn new(cols: Box<[u32]>, dict: Dictionary) -> Self {
        debug_assert_eq!(dict.num_values(cols.len()), 1);
        Self { cols, dict }
    }

    fn ncols(&self) -> usize {
        self.cols.len()
    }

    fn tuple(&self) -> Vec<f64> {
        (0..self.ncols())
            .map(|j| self.dict.tuple_cell(0, j, self.ncols()))
            .collect()
    }

    pub(crate) fn get(&self, _r: usize, local: usize) -> f64 {
        self.dict.tuple_cell(0, local, self.ncols())
    }

    pub(crate) fn add_into(
        &self,
        dst: &mut [f64],
        stride: usize,
        rl: usize,
        ru: usize,
        cols: &[u32],
    ) {
        let tuple = self.tuple();
        for r in rl..ru {
            let row = &mut dst[(r - rl) * stride..];
            for (j, &c) in cols.iter().enumerate() {
                row[c as usize] += tuple[j];
            }
        }
    }

    pub(crate) fn sum(&self, nrows: usize, square: bool) -> f64 {
        let counts = [nrows as u32];
        if square {
            self.dict.sum_sq(&counts, self.ncols())
        } else {
            self.dict.sum(&counts, self.ncols())
        }
    }

    pub(crate) fn row_sums(&self, out: &mut [f64], rl: usize, ru: usize, square: bool) {
        let per_row = self.dict.sum_all_rows(square, self.ncols())[0];
        out.iter_mut().take(ru - rl).for_each(|v| *v += per_row);
    }

    pub(crate) fn col_sums(&self, out: &mut [f64], nrows: usize, square: bool) {
        self.dict
            .col_sum(out, &[nrows as u32], &self.cols, square);
    }

    pub(crate) fn mxx(&self, init: f64, min: bool, nrows: usize) -> f64 {
        if nrows == 0 {
            return init;
        }
        let f = if min { f64::min } else { f64::max };
        self.dict.aggregate(init, self.ncols(), f)
    }

    pub(crate) fn col_mxx(&self, out: &mut [f64], min: bool, nrows: usize) {
        if nrows == 0 {
            return;
        }
        let f = if min { f64::min } else { f64::max };
        self.dict.aggregate_cols(out, &self.cols, self.ncols(), f);
    }

    pub(crate) fn row_mxx(&self, out: &mut [f64], rl: usize, ru: usize, min: bool) {
        let f = if min { f64::min } else { f64::max };
        let init = if min { f64::INFINITY } else { f64::NEG_INFINITY };
        let value = self.dict.aggregate_tuples(init, self.ncols(), f)[0];
        out.iter_mut().take(ru - rl).for_each(|v| *v = f(*v, value));
    }

    pub(crate) fn product(&self, nrows: usize) -> f64 {
        // a zero tuple value zeroes the product outright
        let mut acc = 1.0;
        for &v in self.tuple().iter() {
            if v != 0.0 {
                acc *= powi_count(v, nrows as u64);
            } else {
                acc = 0.0;
            }
        }
        acc
    }

    pub(crate) fn row_products(&self, out: &mut [f64], rl: usize, ru: usize) {
        let per_row = self.tuple().iter().product::<f64>();
        out.iter_mut().take(ru - rl).for_each(|v| *v *= per_row);
    }

    pub(crate) fn col_products(&self, out: &mut [f64], nrows: usize) {
        for (j, &c) in self.cols.iter().enumerate() {
            let v = self.dict.tuple_cell(0, j, self.ncols());
            if v != 0.0 {
                out[c as usize] *= powi_count(v, nrows as u64);
            } else {
                out[c as usize] = 0.0;
            }
        }
    }

    pub(crate) fn map_values(&self, f: &dyn Fn(f64) -> f64, zero_preserving: bool) -> ColGroup {
        ColGroup::Const(Self::new(
            self.cols.clone(),
            self.dict.map_values(f, zero_preserving),
        ))
    }

    pub(crate) fn binary_row_op(&self, op: BinaryOp, v: &[f64], left_side: bool) -> ColGroup {
        ColGroup::Const(Self::new(
            self.cols.clone(),
            self.dict.apply_binary_row(op, v, &self.cols, left_side),
        ))
    }

    pub(crate) fn replace(&self, pattern: f64, replacement: f64) -> ColGroup {
        ColGroup::Const(Self::new(
            self.cols.clone(),
            self.dict.replace(pattern, replacement),
        ))
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
        Some(ColGroup::Const(Self::new(
            cols.into_boxed_slice(),
            Dictionary::from_block(product),
        )))
    }

    pub(crate) fn left_mult_row(&self, lrow: &[f64], out_row: &mut [f64]) {
        let mut acc = KahanSum::new();
        lrow.iter().for_each(|&v| acc.add(v));
        let total = acc.value();
        if total == 0.0 {
            return;
        }
        for (j, &c) in self.cols.iter().enumerate() {
            out_row[c as usize] += total * self.dict.tuple_cell(0, j, self.ncols());
        }
    }

    pub(crate) fn tsmm_into(&self, dst: &mut [f64], n: usize, nrows: usize) {
        tsmm_tuple(dst, n, &self.cols, &self.tuple(), nrows as u64);
    }

    pub(crate) fn slice_columns(&self, cl: usize, cu: usize) -> Option<ColGroup> {
        let (lo, hi, cols) = super::slice_col_range(&self.cols, cl, cu)?;
        let dict = self.dict.slice_columns(lo, hi, self.ncols());
        let tuple: Vec<f64> = (0..cols.len())
            .map(|j| dict.tuple_cell(0, j, cols.len()))
            .collect();
        Some(constant_or_empty(cols, tuple))
    }

    pub(crate) fn contains_value(&self, pattern: f64) -> bool {
        self.dict.contains_value(pattern, self.ncols())
    }

    pub(crate) fn nnz(&self, nrows: usize) -> u64 {
        self.dict.nnz_weighted(&[nrows as u32], self.ncols())
    }
}
