/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The sparse dictionary-coded column group: a default tuple carried by
//! most rows plus a sorted exception list of `(row, value-index)` pairs.

use cola_block::MatrixBlock;
use cola_utils::{BinaryOp, KahanSum};

use super::codes::CodeMap;
use super::{gather_rows, powi_count, preagg_mult, tsmm_dict, tsmm_tuple, ColGroup};
use crate::dictionary::Dictionary;

#[derive(Debug, Clone, PartialEq)]
pub struct ColGroupSdc {
    pub(crate) cols: Box<[u32]>,
    pub(crate) dict: Dictionary,
    /// Tuple carried by every row not named in `rows`.
    pub(crate) default: Box<[f64]>,
    /// Exception rows, strictly ascending.
    pub(crate) rows: Box<[u32]>,
    /// Value index per exception row.
    pub(crate) codes: CodeMap,
    pub(crate) counts: Box<[u32]>,
}

impl ColGroupSdc {
    pub fn new(
        cols: Box<[u32]>,
        dict: Dictionary,
        default: Box<[f64]>,
        rows: Box<[u32]>,
        codes: CodeMap,
    ) -> Self {
        debug_assert_eq!(cols.len(), default.len());
        debug_assert_eq!(rows.len(), codes.len());
        debug_assert!(rows.windows(2).all(|w| w[0] < w[1]));
        let counts = codes.counts(dict.num_values(cols.len()));
        Self {
            cols,
            dict,
            default,
            rows,
            codes,
            counts,
        }
    }

    fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub(crate) fn num_values(&self) -> usize {
        self.counts.len()
    }

    fn default_count(&self, nrows: usize) -> u64 {
        (nrows - self.rows.len()) as u64
    }

    /// The exception index for row `r`, if any.
    fn exception_at(&self, r: usize) -> Option<usize> {
        self.rows.binary_search(&(r as u32)).ok()
    }

    /// Walk rows `[rl, ru)` calling `f(row, Some(code))` for exceptions
    /// and `f(row, None)` for default rows.
    fn for_each_row(&self, rl: usize, ru: usize, mut f: impl FnMut(usize, Option<usize>)) {
        let mut p = self.rows.partition_point(|&r| (r as usize) < rl);
        for r in rl..ru {
            if p < self.rows.len() && self.rows[p] as usize == r {
                f(r, Some(self.codes.get(p)));
                p += 1;
            } else {
                f(r, None);
            }
        }
    }

    pub(crate) fn get(&self, r: usize, local: usize) -> f64 {
        match self.exception_at(r) {
            Some(p) => self.dict.tuple_cell(self.codes.get(p), local, self.ncols()),
            None => self.default[local],
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
        self.for_each_row(rl, ru, |r, code| {
            let row = &mut dst[(r - rl) * stride..];
            match code {
                Some(k) => {
                    for (j, &c) in cols.iter().enumerate() {
                        row[c as usize] += self.dict.tuple_cell(k, j, ncols);
                    }
                }
                None => {
                    for (j, &c) in cols.iter().enumerate() {
                        row[c as usize] += self.default[j];
                    }
                }
            }
        });
    }

    fn default_sum(&self, square: bool) -> f64 {
        let mut acc = KahanSum::new();
        for &v in self.default.iter() {
            acc.add(if square { v * v } else { v });
        }
        acc.value()
    }

    pub(crate) fn sum(&self, nrows: usize, square: bool) -> f64 {
        let dict_part = if square {
            self.dict.sum_sq(&self.counts, self.ncols())
        } else {
            self.dict.sum(&self.counts, self.ncols())
        };
        dict_part + self.default_sum(square) * self.default_count(nrows) as f64
    }

    pub(crate) fn row_sums(&self, out: &mut [f64], rl: usize, ru: usize, square: bool) {
        let per_tuple = self.dict.sum_all_rows(square, self.ncols());
        let default_sum = self.default_sum(square);
        self.for_each_row(rl, ru, |r, code| {
            out[r - rl] += match code {
                Some(k) => per_tuple[k],
                None => default_sum,
            };
        });
    }

    pub(crate) fn col_sums(&self, out: &mut [f64], nrows: usize, square: bool) {
        self.dict.col_sum(out, &self.counts, &self.cols, square);
        let dc = self.default_count(nrows) as f64;
        for (j, &c) in self.cols.iter().enumerate() {
            let v = self.default[j];
            out[c as usize] += dc * if square { v * v } else { v };
        }
    }

    pub(crate) fn mxx(&self, init: f64, min: bool, nrows: usize) -> f64 {
        if nrows == 0 || self.cols.is_empty() {
            return init;
        }
        let f = if min { f64::min } else { f64::max };
        let mut acc = self.dict.aggregate(init, self.ncols(), f);
        if self.default_count(nrows) > 0 {
            for &v in self.default.iter() {
                acc = f(acc, v);
            }
        }
        acc
    }

    pub(crate) fn col_mxx(&self, out: &mut [f64], min: bool, nrows: usize) {
        if nrows == 0 {
            return;
        }
        let f = if min { f64::min } else { f64::max };
        self.dict.aggregate_cols(out, &self.cols, self.ncols(), f);
        if self.default_count(nrows) > 0 {
            for (j, &c) in self.cols.iter().enumerate() {
                let slot = &mut out[c as usize];
                *slot = f(*slot, self.default[j]);
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
        let default_mxx = self.default.iter().copied().fold(init, f);
        self.for_each_row(rl, ru, |r, code| {
            let slot = &mut out[r - rl];
            *slot = f(
                *slot,
                match code {
                    Some(k) => per_tuple[k],
                    None => default_mxx,
                },
            );
        });
    }

    pub(crate) fn product(&self, nrows: usize) -> f64 {
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
        let dc = self.default_count(nrows);
        if dc > 0 {
            for &v in self.default.iter() {
                acc *= powi_count(v, dc);
            }
        }
        acc
    }

    pub(crate) fn row_products(&self, out: &mut [f64], rl: usize, ru: usize) {
        if self.cols.is_empty() {
            return;
        }
        let per_tuple = self.dict.aggregate_tuples(1.0, self.ncols(), |acc, v| acc * v);
        let default_prod: f64 = self.default.iter().product();
        self.for_each_row(rl, ru, |r, code| {
            out[r - rl] *= match code {
                Some(k) => per_tuple[k],
                None => default_prod,
            };
        });
    }

    pub(crate) fn col_products(&self, out: &mut [f64], nrows: usize) {
        let dc = self.default_count(nrows);
        for (j, &c) in self.cols.iter().enumerate() {
            let mut acc = 1.0;
            for k in 0..self.num_values() {
                let count = self.counts[k] as u64;
                if count > 0 {
                    acc *= powi_count(self.dict.tuple_cell(k, j, self.ncols()), count);
                }
            }
            if dc > 0 {
                acc *= powi_count(self.default[j], dc);
            }
            out[c as usize] *= acc;
        }
    }

    fn with_parts(&self, dict: Dictionary, default: Box<[f64]>) -> ColGroup {
        ColGroup::Sdc(Self {
            cols: self.cols.clone(),
            dict,
            default,
            rows: self.rows.clone(),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        })
    }

    pub(crate) fn map_values(&self, f: &dyn Fn(f64) -> f64, zero_preserving: bool) -> ColGroup {
        self.with_parts(
            self.dict.map_values(f, zero_preserving),
            self.default.iter().map(|&v| f(v)).collect(),
        )
    }

    pub(crate) fn binary_row_op(&self, op: BinaryOp, v: &[f64], left_side: bool) -> ColGroup {
        let default: Box<[f64]> = self
            .cols
            .iter()
            .zip(self.default.iter())
            .map(|(&c, &d)| {
                let vc = v[c as usize];
                if left_side {
                    op.apply(vc, d)
                } else {
                    op.apply(d, vc)
                }
            })
            .collect();
        self.with_parts(
            self.dict.apply_binary_row(op, v, &self.cols, left_side),
            default,
        )
    }

    pub(crate) fn replace(&self, pattern: f64, replacement: f64) -> ColGroup {
        let matches = |v: f64| v == pattern || (v.is_nan() && pattern.is_nan());
        self.with_parts(
            self.dict.replace(pattern, replacement),
            self.default
                .iter()
                .map(|&v| if matches(v) { replacement } else { v })
                .collect(),
        )
    }

    pub(crate) fn right_mult(&self, right: &MatrixBlock) -> Option<ColGroup> {
        if right.is_empty() {
            return None;
        }
        let gathered = gather_rows(right, &self.cols);
        let dict = Dictionary::from_block(
            self.dict
                .to_block(self.ncols())
                .multiply(&gathered, 1)
                .ok()?,
        );
        let default_block = MatrixBlock::from_dense(1, self.ncols(), self.default.to_vec());
        let default_product = default_block.multiply(&gathered, 1).ok()?;
        let default: Box<[f64]> = (0..right.num_cols())
            .map(|j| default_product.get(0, j))
            .collect();
        let cols: Vec<u32> = (0..right.num_cols() as u32).collect();
        Some(ColGroup::Sdc(Self {
            cols: cols.into_boxed_slice(),
            dict,
            default,
            rows: self.rows.clone(),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        }))
    }

    pub(crate) fn left_mult_row(&self, lrow: &[f64], out_row: &mut [f64]) {
        let mut total = KahanSum::new();
        lrow.iter().for_each(|&v| total.add(v));

        let mut preagg = vec![0.0; self.num_values()];
        let mut exception_sum = KahanSum::new();
        for (p, &r) in self.rows.iter().enumerate() {
            let v = lrow[r as usize];
            if v != 0.0 {
                preagg[self.codes.get(p)] += v;
                exception_sum.add(v);
            }
        }

        let default_weight = total.value() - exception_sum.value();
        if default_weight != 0.0 {
            for (j, &c) in self.cols.iter().enumerate() {
                out_row[c as usize] += default_weight * self.default[j];
            }
        }
        preagg_mult(&self.dict, self.ncols(), &self.cols, &preagg, out_row);
    }

    pub(crate) fn tsmm_into(&self, dst: &mut [f64], n: usize, nrows: usize) {
        tsmm_dict(dst, n, &self.cols, &self.dict, &self.counts);
        tsmm_tuple(dst, n, &self.cols, &self.default, self.default_count(nrows));
    }

    pub(crate) fn slice_columns(&self, cl: usize, cu: usize) -> Option<ColGroup> {
        let (lo, hi, cols) = super::slice_col_range(&self.cols, cl, cu)?;
        Some(ColGroup::Sdc(Self {
            cols,
            dict: self.dict.slice_columns(lo, hi, self.ncols()),
            default: self.default[lo..hi].to_vec().into_boxed_slice(),
            rows: self.rows.clone(),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        }))
    }

    pub(crate) fn contains_value(&self, pattern: f64, nrows: usize) -> bool {
        let matches = |v: f64| v == pattern || (v.is_nan() && pattern.is_nan());
        if self.default_count(nrows) > 0 && self.default.iter().any(|&v| matches(v)) {
            return true;
        }
        self.dict.contains_value(pattern, self.ncols())
    }

    pub(crate) fn nnz(&self, nrows: usize) -> u64 {
        let default_nnz = self.default.iter().filter(|&&v| v != 0.0).count() as u64;
        self.dict.nnz_weighted(&self.counts, self.ncols())
            + default_nnz * self.default_count(nrows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 5 rows over columns {0, 2}: default tuple [5, 6], exceptions at
    /// rows 1 and 3 with tuples [1, 2] and [3, 4].
    fn group() -> ColGroupSdc {
        ColGroupSdc::new(
            vec![0, 2].into_boxed_slice(),
            Dictionary::dense(vec![1.0, 2.0, 3.0, 4.0]),
            vec![5.0, 6.0].into_boxed_slice(),
            vec![1, 3].into_boxed_slice(),
            CodeMap::from_codes(&[0, 1], 2),
        )
    }

    #[test]
    fn get_picks_default_or_exception() {
        let g = group();
        assert_eq!(g.get(0, 0), 5.0);
        assert_eq!(g.get(1, 0), 1.0);
        assert_eq!(g.get(1, 1), 2.0);
        assert_eq!(g.get(3, 1), 4.0);
        assert_eq!(g.get(4, 1), 6.0);
    }

    #[test]
    fn sum_weights_default_by_remaining_rows() {
        let g = group();
        // exceptions: 1+2 + 3+4 = 10; defaults: 3 rows * 11 = 33
        assert_abs_diff_eq!(g.sum(5, false), 43.0);
        assert_abs_diff_eq!(g.sum(5, true), 5.0 + 25.0 + 3.0 * (25.0 + 36.0));
    }

    #[test]
    fn row_sums_respect_exceptions() {
        let g = group();
        let mut out = vec![0.0; 5];
        g.row_sums(&mut out, 0, 5, false);
        assert_eq!(out, vec![11.0, 3.0, 11.0, 7.0, 11.0]);
    }

    #[test]
    fn col_sums_combine_parts() {
        let g = group();
        let mut out = vec![0.0; 3];
        g.col_sums(&mut out, 5, false);
        assert_eq!(out, vec![1.0 + 3.0 + 3.0 * 5.0, 0.0, 2.0 + 4.0 + 3.0 * 6.0]);
    }

    #[test]
    fn mxx_includes_default() {
        let g = group();
        assert_eq!(g.mxx(f64::NEG_INFINITY, false, 5), 6.0);
        assert_eq!(g.mxx(f64::INFINITY, true, 5), 1.0);
        // with every row an exception the default is ignored
        let g_all_exceptions = ColGroupSdc::new(
            vec![0].into_boxed_slice(),
            Dictionary::dense(vec![1.0, 2.0]),
            vec![99.0].into_boxed_slice(),
            vec![0, 1].into_boxed_slice(),
            CodeMap::from_codes(&[0, 1], 2),
        );
        assert_eq!(g_all_exceptions.mxx(f64::NEG_INFINITY, false, 2), 2.0);
    }

    #[test]
    fn left_mult_row_splits_default_and_exceptions() {
        let g = group();
        let mut out = vec![0.0; 3];
        let lrow = [1.0, 2.0, 3.0, 4.0, 5.0];
        g.left_mult_row(&lrow, &mut out);
        // default weight = (1+2+3+4+5) - (2+4) = 9
        assert_abs_diff_eq!(out[0], 9.0 * 5.0 + 2.0 * 1.0 + 4.0 * 3.0);
        assert_eq!(out[1], 0.0);
        assert_abs_diff_eq!(out[2], 9.0 * 6.0 + 2.0 * 2.0 + 4.0 * 4.0);
    }

    #[test]
    fn tsmm_counts_default_rows() {
        let g = group();
        let mut dst = vec![0.0; 9];
        g.tsmm_into(&mut dst, 3, 5);
        // (0,0): 1*1 + 3*3 + 3 * 5*5 = 85
        assert_abs_diff_eq!(dst[0], 85.0);
        // (0,2): 1*2 + 3*4 + 3 * 5*6 = 104
        assert_abs_diff_eq!(dst[2], 104.0);
        // (2,2): 4 + 16 + 3 * 36 = 128
        assert_abs_diff_eq!(dst[8], 128.0);
    }

    #[test]
    fn decompress_matches_get() {
        let g = group();
        let mut dst = vec![0.0; 5 * 3];
        g.add_into(&mut dst, 3, 0, 5, &[0, 2]);
        for r in 0..5 {
            assert_eq!(dst[r * 3], g.get(r, 0), "row {r} col 0");
            assert_eq!(dst[r * 3 + 1], 0.0);
            assert_eq!(dst[r * 3 + 2], g.get(r, 1), "row {r} col 2");
        }
    }

    #[test]
    fn right_mult_transforms_default_and_dict() {
        let g = group();
        let right = MatrixBlock::from_rows(&[&[1.0], &[0.0], &[2.0]]);
        match g.right_mult(&right) {
            Some(ColGroup::Sdc(s)) => {
                assert_eq!(s.default.as_ref(), &[5.0 + 12.0]);
                assert_eq!(s.get(1, 0), 1.0 + 4.0);
                assert_eq!(s.get(3, 0), 3.0 + 8.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nnz_counts_default_rows() {
        let g = group();
        assert_eq!(g.nnz(5), 4 + 2 * 3);
        // zero default contributes nothing
        let z = ColGroupSdc::new(
            vec![0].into_boxed_slice(),
            Dictionary::dense(vec![7.0]),
            vec![0.0].into_boxed_slice(),
            vec![2].into_boxed_slice(),
            CodeMap::from_codes(&[0], 1),
        );
        assert_eq!(z.nnz(4), 1);
    }
}
