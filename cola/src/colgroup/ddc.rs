/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The dense dictionary-coded column group: one value-index per row.

use cola_block::MatrixBlock;
use cola_utils::BinaryOp;

use super::codes::CodeMap;
use super::{gather_rows, powi_count, preagg_mult, tsmm_dict, ColGroup};
use crate::dictionary::Dictionary;

#[derive(Debug, Clone, PartialEq)]
pub struct ColGroupDdc {
    pub(crate) cols: Box<[u32]>,
    pub(crate) dict: Dictionary,
    pub(crate) codes: CodeMap,
    pub(crate) counts: Box<[u32]>,
}

impl ColGroupDdc {
    pub fn new(cols: Box<[u32]>, dict: Dictionary, codes: CodeMap) -> Self {
        let counts = codes.counts(dict.num_values(cols.len()));
        Self {
            cols,
            dict,
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

    pub(crate) fn get(&self, r: usize, local: usize) -> f64 {
        self.dict.tuple_cell(self.codes.get(r), local, self.ncols())
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
        match self.dict.as_view(ncols) {
            Some(view) => {
                for r in rl..ru {
                    let row = &mut dst[(r - rl) * stride..];
                    let tuple = view.row(self.codes.get(r));
                    for (j, &c) in cols.iter().enumerate() {
                        row[c as usize] += tuple[j];
                    }
                }
            }
            None => {
                // block dictionary: walk the stored non-zeros per tuple
                for r in rl..ru {
                    let row = &mut dst[(r - rl) * stride..];
                    let k = self.codes.get(r);
                    #[allow(clippy::unwrap_used)]
                    self.dict.block_ref().unwrap().for_each_in_row(k, |j, v| {
                        row[cols[j] as usize] += v;
                    });
                }
            }
        }
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
        for r in rl..ru {
            out[r - rl] += per_tuple[self.codes.get(r)];
        }
    }

    pub(crate) fn col_sums(&self, out: &mut [f64], _nrows: usize, square: bool) {
        self.dict.col_sum(out, &self.counts, &self.cols, square);
    }

    pub(crate) fn mxx(&self, init: f64, min: bool, nrows: usize) -> f64 {
        if nrows == 0 || self.cols.is_empty() {
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
        if self.cols.is_empty() {
            return;
        }
        let f = if min { f64::min } else { f64::max };
        let init = if min { f64::INFINITY } else { f64::NEG_INFINITY };
        let per_tuple = self.dict.aggregate_tuples(init, self.ncols(), f);
        for r in rl..ru {
            let slot = &mut out[r - rl];
            *slot = f(*slot, per_tuple[self.codes.get(r)]);
        }
    }

    pub(crate) fn product(&self, _nrows: usize) -> f64 {
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
        for r in rl..ru {
            out[r - rl] *= per_tuple[self.codes.get(r)];
        }
    }

    pub(crate) fn col_products(&self, out: &mut [f64], _nrows: usize) {
        for (j, &c) in self.cols.iter().enumerate() {
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

    pub(crate) fn map_values(&self, f: &dyn Fn(f64) -> f64, zero_preserving: bool) -> ColGroup {
        ColGroup::Ddc(Self {
            cols: self.cols.clone(),
            dict: self.dict.map_values(f, zero_preserving),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        })
    }

    pub(crate) fn binary_row_op(&self, op: BinaryOp, v: &[f64], left_side: bool) -> ColGroup {
        ColGroup::Ddc(Self {
            cols: self.cols.clone(),
            dict: self.dict.apply_binary_row(op, v, &self.cols, left_side),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        })
    }

    pub(crate) fn replace(&self, pattern: f64, replacement: f64) -> ColGroup {
        ColGroup::Ddc(Self {
            cols: self.cols.clone(),
            dict: self.dict.replace(pattern, replacement),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        })
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
        Some(ColGroup::Ddc(Self {
            cols: cols.into_boxed_slice(),
            dict: Dictionary::from_block(product),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        }))
    }

    pub(crate) fn left_mult_row(&self, lrow: &[f64], out_row: &mut [f64]) {
        let mut preagg = vec![0.0; self.num_values()];
        for (r, &v) in lrow.iter().enumerate() {
            if v != 0.0 {
                preagg[self.codes.get(r)] += v;
            }
        }
        preagg_mult(&self.dict, self.ncols(), &self.cols, &preagg, out_row);
    }

    pub(crate) fn tsmm_into(&self, dst: &mut [f64], n: usize, _nrows: usize) {
        tsmm_dict(dst, n, &self.cols, &self.dict, &self.counts);
    }

    pub(crate) fn slice_columns(&self, cl: usize, cu: usize) -> Option<ColGroup> {
        let (lo, hi, cols) = super::slice_col_range(&self.cols, cl, cu)?;
        Some(ColGroup::Ddc(Self {
            cols,
            dict: self.dict.slice_columns(lo, hi, self.ncols()),
            codes: self.codes.clone(),
            counts: self.counts.clone(),
        }))
    }

    pub(crate) fn contains_value(&self, pattern: f64) -> bool {
        self.dict.contains_value(pattern, self.ncols())
    }

    pub(crate) fn nnz(&self, _nrows: usize) -> u64 {
        self.dict.nnz_weighted(&self.counts, self.ncols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The 4x4 identity encoded as a DDC group over all four columns with
    /// a one-hot dictionary (scenario two of the acceptance suite uses two
    /// distinct tuples; here every row carries its own one-hot tuple).
    fn identity_ddc() -> ColGroupDdc {
        let mut values = vec![0.0; 16];
        for i in 0..4 {
            values[i * 4 + i] = 1.0;
        }
        ColGroupDdc::new(
            vec![0, 1, 2, 3].into_boxed_slice(),
            Dictionary::dense(values),
            CodeMap::from_codes(&[0, 1, 2, 3], 4),
        )
    }

    fn two_tuple_ddc() -> ColGroupDdc {
        // rows: [1,2], [3,4], [1,2], [1,2]
        ColGroupDdc::new(
            vec![0, 1].into_boxed_slice(),
            Dictionary::dense(vec![1.0, 2.0, 3.0, 4.0]),
            CodeMap::from_codes(&[0, 1, 0, 0], 2),
        )
    }

    #[test]
    fn counts_derived_from_codes() {
        let g = two_tuple_ddc();
        assert_eq!(g.counts.as_ref(), &[3, 1]);
    }

    #[test]
    fn get_reads_through_codes() {
        let g = two_tuple_ddc();
        assert_eq!(g.get(0, 1), 2.0);
        assert_eq!(g.get(1, 0), 3.0);
        assert_eq!(g.get(3, 1), 2.0);
    }

    #[test]
    fn identity_aggregates() {
        let g = identity_ddc();
        assert_eq!(g.sum(4, false), 4.0);
        let mut rows = vec![0.0; 4];
        g.row_sums(&mut rows, 0, 4, false);
        assert_eq!(rows, vec![1.0, 1.0, 1.0, 1.0]);
        let mut cols = vec![0.0; 4];
        g.col_sums(&mut cols, 4, false);
        assert_eq!(cols, vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn identity_tsmm_is_identity() {
        let g = identity_ddc();
        let mut dst = vec![0.0; 16];
        g.tsmm_into(&mut dst, 4, 4);
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(dst[i * 4 + j], expected, "at ({i},{j})");
            }
        }
    }

    #[test]
    fn left_mult_row_pre_aggregates() {
        let g = two_tuple_ddc();
        let mut out = vec![0.0; 2];
        // lrow picks rows 0, 1 and 3: preagg = [lrow0 + lrow3, lrow1]
        g.left_mult_row(&[1.0, 10.0, 0.0, 2.0], &mut out);
        assert_eq!(out, vec![3.0 * 1.0 + 10.0 * 3.0, 3.0 * 2.0 + 10.0 * 4.0]);
    }

    #[test]
    fn right_mult_keeps_codes() {
        let g = two_tuple_ddc();
        let right = MatrixBlock::from_rows(&[&[1.0], &[1.0]]);
        match g.right_mult(&right) {
            Some(ColGroup::Ddc(r)) => {
                assert_eq!(r.cols.as_ref(), &[0]);
                // tuples become row sums
                assert_eq!(r.get(0, 0), 3.0);
                assert_eq!(r.get(1, 0), 7.0);
                assert_eq!(r.counts.as_ref(), &[3, 1]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn products() {
        let g = two_tuple_ddc();
        assert_eq!(g.product(4), 2.0f64.powi(3) * 12.0);
        let mut rows = vec![1.0; 4];
        g.row_products(&mut rows, 0, 4);
        assert_eq!(rows, vec![2.0, 12.0, 2.0, 2.0]);
    }

    #[test]
    fn mxx_and_row_mxx() {
        let g = two_tuple_ddc();
        assert_eq!(g.mxx(f64::NEG_INFINITY, false, 4), 4.0);
        assert_eq!(g.mxx(f64::INFINITY, true, 4), 1.0);
        let mut rows = vec![f64::INFINITY; 4];
        g.row_mxx(&mut rows, 0, 4, true);
        assert_eq!(rows, vec![1.0, 3.0, 1.0, 1.0]);
    }
}
