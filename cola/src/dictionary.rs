/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Dictionaries: the distinct-tuple tables referenced by column groups.
//!
//! A dictionary stores `num_values` tuples of `ncols` cells each. The
//! tuple width is a property of the owning column group and is passed into
//! the operations that need it, so the same storage can be re-interpreted
//! when a group is sliced.
//!
//! Two kinds exist: [`DenseDictionary`] holds the tuples as one contiguous
//! `f64` buffer; [`BlockDictionary`] embeds them as a (possibly sparse)
//! [`MatrixBlock`], which is what right-multiplication produces and what
//! the sparse tsmm path consumes.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cola_block::MatrixBlock;
use cola_utils::views::DenseView;
use cola_utils::{BinaryOp, KahanSum};

const KIND_DENSE: u8 = 0;
const KIND_BLOCK: u8 = 1;

/// Tuples stored as one contiguous row-major buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseDictionary {
    values: Box<[f64]>,
}

/// Tuples stored as an embedded matrix block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDictionary {
    block: MatrixBlock,
}

/// A column-group dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum Dictionary {
    Dense(DenseDictionary),
    Block(BlockDictionary),
}

impl Dictionary {
    /// A dense dictionary over row-major tuple values.
    pub fn dense(values: Vec<f64>) -> Self {
        Dictionary::Dense(DenseDictionary {
            values: values.into_boxed_slice(),
        })
    }

    /// A dictionary embedding `block` (rows are tuples).
    pub fn from_block(block: MatrixBlock) -> Self {
        Dictionary::Block(BlockDictionary { block })
    }

    /// A dictionary holding a single tuple.
    pub fn single_tuple(tuple: Vec<f64>) -> Self {
        Self::dense(tuple)
    }

    /// The number of tuples for width `ncols`.
    pub fn num_values(&self, ncols: usize) -> usize {
        match self {
            Dictionary::Dense(d) => {
                if ncols == 0 {
                    0
                } else {
                    d.values.len() / ncols
                }
            }
            Dictionary::Block(b) => b.block.num_rows(),
        }
    }

    /// Read cell `j` of tuple `k`.
    #[inline]
    pub fn tuple_cell(&self, k: usize, j: usize, ncols: usize) -> f64 {
        match self {
            Dictionary::Dense(d) => d.values[k * ncols + j],
            Dictionary::Block(b) => b.block.get(k, j),
        }
    }

    /// Read a cell by flat index `k * ncols + j`.
    #[inline]
    pub fn get_value(&self, flat: usize, ncols: usize) -> f64 {
        match self {
            Dictionary::Dense(d) => d.values[flat],
            Dictionary::Block(b) => b.block.get(flat / ncols, flat % ncols),
        }
    }

    /// Invoke `f(k, j, value)` for every stored non-zero cell.
    #[inline]
    pub fn for_each_nonzero(&self, ncols: usize, mut f: impl FnMut(usize, usize, f64)) {
        match self {
            Dictionary::Dense(d) => {
                for (flat, &v) in d.values.iter().enumerate() {
                    if v != 0.0 {
                        f(flat / ncols, flat % ncols, v);
                    }
                }
            }
            Dictionary::Block(b) => {
                for k in 0..b.block.num_rows() {
                    b.block.for_each_in_row(k, |j, v| f(k, j, v));
                }
            }
        }
    }

    /// Fold `f` over every cell (implicit zeros of a sparse block
    /// included).
    pub fn aggregate(&self, init: f64, ncols: usize, f: impl Fn(f64, f64) -> f64) -> f64 {
        let mut acc = init;
        for k in 0..self.num_values(ncols) {
            for j in 0..ncols {
                acc = f(acc, self.tuple_cell(k, j, ncols));
            }
        }
        acc
    }

    /// Fold `f` per tuple column into `acc`, indexed through `cols` (the
    /// owning group's global column indices).
    pub fn aggregate_cols(
        &self,
        acc: &mut [f64],
        cols: &[u32],
        ncols: usize,
        f: impl Fn(f64, f64) -> f64,
    ) {
        for k in 0..self.num_values(ncols) {
            for (j, &c) in cols.iter().enumerate() {
                let slot = &mut acc[c as usize];
                *slot = f(*slot, self.tuple_cell(k, j, ncols));
            }
        }
    }

    /// Reduce each tuple to one value with `f`, starting from `init`.
    pub fn aggregate_tuples(
        &self,
        init: f64,
        ncols: usize,
        f: impl Fn(f64, f64) -> f64,
    ) -> Vec<f64> {
        (0..self.num_values(ncols))
            .map(|k| (0..ncols).fold(init, |acc, j| f(acc, self.tuple_cell(k, j, ncols))))
            .collect()
    }

    /// The counts-weighted sum of all tuples.
    pub fn sum(&self, counts: &[u32], ncols: usize) -> f64 {
        let mut acc = KahanSum::new();
        self.for_each_nonzero(ncols, |k, _, v| acc.add(v * counts[k] as f64));
        acc.value()
    }

    /// The counts-weighted sum of squares of all tuples.
    pub fn sum_sq(&self, counts: &[u32], ncols: usize) -> f64 {
        let mut acc = KahanSum::new();
        self.for_each_nonzero(ncols, |k, _, v| acc.add(v * v * counts[k] as f64));
        acc.value()
    }

    /// The per-tuple row sum (or sum of squares).
    pub fn sum_all_rows(&self, square: bool, ncols: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.num_values(ncols)];
        self.for_each_nonzero(ncols, |k, _, v| {
            out[k] += if square { v * v } else { v };
        });
        out
    }

    /// Counts-weighted per-column sums scattered into `acc` at the group's
    /// global column indices.
    pub fn col_sum(&self, acc: &mut [f64], counts: &[u32], cols: &[u32], square: bool) {
        let ncols = cols.len();
        self.for_each_nonzero(ncols, |k, j, v| {
            let v = if square { v * v } else { v };
            acc[cols[j] as usize] += v * counts[k] as f64;
        });
    }

    /// Apply a scalar operator to every tuple cell.
    pub fn apply(&self, op: cola_utils::ScalarOp) -> Dictionary {
        self.map_values(|v| op.apply(v), op.is_sparse_safe())
    }

    /// Apply a cell function to every tuple cell, producing a new
    /// dictionary of the same kind.
    ///
    /// `zero_preserving` must hold only if `f(0) == 0`; it lets a sparse
    /// embedded block skip its implicit zeros.
    pub fn map_values(&self, f: impl Fn(f64) -> f64, zero_preserving: bool) -> Dictionary {
        match self {
            Dictionary::Dense(d) => {
                Dictionary::dense(d.values.iter().map(|&v| f(v)).collect())
            }
            Dictionary::Block(b) => {
                Dictionary::from_block(b.block.map_cells(f, zero_preserving))
            }
        }
    }

    /// Apply `op` between each tuple and the row vector `v` (global
    /// indexing through `cols`). `left_side` applies `op(v, tuple)`.
    pub fn apply_binary_row(
        &self,
        op: BinaryOp,
        v: &[f64],
        cols: &[u32],
        left_side: bool,
    ) -> Dictionary {
        let ncols = cols.len();
        let n = self.num_values(ncols);
        let mut values = Vec::with_capacity(n * ncols);
        for k in 0..n {
            for (j, &c) in cols.iter().enumerate() {
                let cell = self.tuple_cell(k, j, ncols);
                let vc = v[c as usize];
                values.push(if left_side {
                    op.apply(vc, cell)
                } else {
                    op.apply(cell, vc)
                });
            }
        }
        Dictionary::dense(values)
    }

    /// Substitute every cell matching `pattern` (NaN matches NaN) with
    /// `replacement`.
    pub fn replace(&self, pattern: f64, replacement: f64) -> Dictionary {
        let zero_preserving = pattern != 0.0 || replacement == 0.0;
        self.map_values(
            |v| {
                if v == pattern || (v.is_nan() && pattern.is_nan()) {
                    replacement
                } else {
                    v
                }
            },
            zero_preserving,
        )
    }

    /// Project each tuple onto columns `[lo, hi)`.
    pub fn slice_columns(&self, lo: usize, hi: usize, ncols: usize) -> Dictionary {
        let width = hi - lo;
        let n = self.num_values(ncols);
        let mut values = Vec::with_capacity(n * width);
        for k in 0..n {
            for j in lo..hi {
                values.push(self.tuple_cell(k, j, ncols));
            }
        }
        Dictionary::dense(values)
    }

    /// Whether any stored cell equals `pattern` (NaN matches NaN).
    pub fn contains_value(&self, pattern: f64, ncols: usize) -> bool {
        if pattern == 0.0 {
            if let Dictionary::Block(b) = self {
                if b.block.nnz() < (b.block.num_rows() * b.block.num_cols()) as u64 {
                    return true;
                }
            }
        }
        let mut found = false;
        for k in 0..self.num_values(ncols) {
            for j in 0..ncols {
                let v = self.tuple_cell(k, j, ncols);
                found |= v == pattern || (v.is_nan() && pattern.is_nan());
            }
        }
        found
    }

    /// The counts-weighted number of non-zero cells.
    pub fn nnz_weighted(&self, counts: &[u32], ncols: usize) -> u64 {
        let mut total = 0u64;
        self.for_each_nonzero(ncols, |k, _, _| total += counts[k] as u64);
        total
    }

    /// The stored non-zeros per tuple.
    pub fn tuple_nnz(&self, ncols: usize) -> Vec<u32> {
        let mut out = vec![0u32; self.num_values(ncols)];
        self.for_each_nonzero(ncols, |k, _, _| out[k] += 1);
        out
    }

    /// A zero-copy view of a dense dictionary's tuples, when available.
    pub fn as_view(&self, ncols: usize) -> Option<DenseView<'_>> {
        match self {
            Dictionary::Dense(d) => DenseView::new(&d.values, self.num_values(ncols), ncols).ok(),
            Dictionary::Block(_) => None,
        }
    }

    /// The embedded block of a block dictionary, when available.
    pub fn block_ref(&self) -> Option<&MatrixBlock> {
        match self {
            Dictionary::Dense(_) => None,
            Dictionary::Block(b) => Some(&b.block),
        }
    }

    /// Materialize the tuples as a `num_values x ncols` matrix block.
    pub fn to_block(&self, ncols: usize) -> MatrixBlock {
        match self {
            Dictionary::Dense(d) => {
                MatrixBlock::from_dense(self.num_values(ncols), ncols, d.values.to_vec())
            }
            Dictionary::Block(b) => b.block.clone(),
        }
    }

    /// Serialize as `u8 kind` followed by the kind-specific payload.
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<u64> {
        match self {
            Dictionary::Dense(d) => {
                w.write_u8(KIND_DENSE)?;
                w.write_u32::<LittleEndian>(d.values.len() as u32)?;
                for &v in d.values.iter() {
                    w.write_f64::<LittleEndian>(v)?;
                }
                Ok(1 + 4 + 8 * d.values.len() as u64)
            }
            Dictionary::Block(b) => {
                w.write_u8(KIND_BLOCK)?;
                let bytes = cola_block::io::write_block(&b.block, w)?;
                Ok(1 + bytes)
            }
        }
    }

    /// Deserialize a dictionary written by [`Dictionary::write`].
    pub fn read(r: &mut impl Read) -> std::io::Result<Dictionary> {
        match r.read_u8()? {
            KIND_DENSE => {
                let n = r.read_u32::<LittleEndian>()? as usize;
                let mut values = vec![0.0; n];
                for v in values.iter_mut() {
                    *v = r.read_f64::<LittleEndian>()?;
                }
                Ok(Dictionary::dense(values))
            }
            KIND_BLOCK => Ok(Dictionary::from_block(cola_block::io::read_block(r)?)),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown dictionary kind {other}"),
            )),
        }
    }

    /// The exact bytes [`Dictionary::write`] produces.
    pub fn disk_size(&self) -> u64 {
        match self {
            Dictionary::Dense(d) => 1 + 4 + 8 * d.values.len() as u64,
            Dictionary::Block(b) => 1 + cola_block::io::block_disk_size(&b.block),
        }
    }

    /// An upper bound on the heap bytes held by the dictionary.
    pub fn in_memory_size(&self) -> usize {
        match self {
            Dictionary::Dense(d) => std::mem::size_of::<Self>() + 8 * d.values.len(),
            Dictionary::Block(b) => {
                std::mem::size_of::<Self>()
                    + 8 * (b.block.num_rows() * b.block.num_cols())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cola_utils::ScalarOp;

    fn dict() -> Dictionary {
        // two tuples of width three
        Dictionary::dense(vec![1.0, 0.0, 2.0, -1.0, 3.0, 0.0])
    }

    #[test]
    fn basic_accessors() {
        let d = dict();
        assert_eq!(d.num_values(3), 2);
        assert_eq!(d.tuple_cell(0, 2, 3), 2.0);
        assert_eq!(d.tuple_cell(1, 1, 3), 3.0);
        assert_eq!(d.get_value(4, 3), 3.0);
    }

    #[test]
    fn weighted_sums() {
        let d = dict();
        let counts = [2u32, 3];
        assert_abs_diff_eq!(d.sum(&counts, 3), 2.0 * 3.0 + 3.0 * 2.0);
        assert_abs_diff_eq!(d.sum_sq(&counts, 3), 2.0 * 5.0 + 3.0 * 10.0);
        assert_eq!(d.sum_all_rows(false, 3), vec![3.0, 2.0]);
        assert_eq!(d.sum_all_rows(true, 3), vec![5.0, 10.0]);
    }

    #[test]
    fn col_sum_scatters_to_global_columns() {
        let d = dict();
        let mut acc = vec![0.0; 6];
        d.col_sum(&mut acc, &[2, 1], &[1, 4, 5], false);
        assert_eq!(acc, vec![0.0, 2.0 * 1.0 + 1.0 * -1.0, 0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn aggregates() {
        let d = dict();
        assert_eq!(d.aggregate(f64::NEG_INFINITY, 3, f64::max), 3.0);
        assert_eq!(d.aggregate(f64::INFINITY, 3, f64::min), -1.0);
        assert_eq!(
            d.aggregate_tuples(f64::NEG_INFINITY, 3, f64::max),
            vec![2.0, 3.0]
        );
        let mut acc = vec![f64::NEG_INFINITY; 3];
        d.aggregate_cols(&mut acc, &[0, 1, 2], 3, f64::max);
        assert_eq!(acc, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn map_and_binary_row() {
        let d = dict().map_values(|v| ScalarOp::Mul(2.0).apply(v), true);
        assert_eq!(d.tuple_cell(0, 2, 3), 4.0);

        let v = vec![10.0, 20.0, 30.0];
        let d = dict().apply_binary_row(BinaryOp::Add, &v, &[0, 1, 2], false);
        assert_eq!(d.tuple_cell(0, 0, 3), 11.0);
        assert_eq!(d.tuple_cell(1, 2, 3), 30.0);

        let d = dict().apply_binary_row(BinaryOp::Sub, &v, &[0, 1, 2], true);
        assert_eq!(d.tuple_cell(0, 0, 3), 9.0);
    }

    #[test]
    fn replace_matches_nan() {
        let d = Dictionary::dense(vec![f64::NAN, 1.0]);
        let r = d.replace(f64::NAN, 7.0);
        assert_eq!(r.tuple_cell(0, 0, 2), 7.0);
        assert_eq!(r.tuple_cell(0, 1, 2), 1.0);
    }

    #[test]
    fn slice_projects_tuple_columns() {
        let d = dict().slice_columns(1, 3, 3);
        assert_eq!(d.num_values(2), 2);
        assert_eq!(d.tuple_cell(0, 0, 2), 0.0);
        assert_eq!(d.tuple_cell(0, 1, 2), 2.0);
        assert_eq!(d.tuple_cell(1, 0, 2), 3.0);
    }

    #[test]
    fn contains_and_nnz() {
        let d = dict();
        assert!(d.contains_value(3.0, 3));
        assert!(d.contains_value(0.0, 3));
        assert!(!d.contains_value(9.0, 3));
        assert_eq!(d.nnz_weighted(&[2, 3], 3), 2 * 2 + 3 * 2);
        assert_eq!(d.tuple_nnz(3), vec![2, 2]);
    }

    #[test]
    fn block_dictionary_round_trip_ops() {
        let mut block = MatrixBlock::from_rows(&[&[0.0, 5.0], &[1.0, 0.0]]);
        block.to_sparse();
        let d = Dictionary::from_block(block);
        assert_eq!(d.num_values(2), 2);
        assert_eq!(d.tuple_cell(0, 1, 2), 5.0);
        assert_eq!(d.sum(&[1, 1], 2), 6.0);
        assert!(d.contains_value(0.0, 2));
        assert!(d.as_view(2).is_none());
        assert!(d.block_ref().is_some());

        let dense = d.to_block(2);
        assert_eq!(dense.get(0, 1), 5.0);
    }

    #[test]
    fn serialization_round_trip() {
        for d in [dict(), {
            let block = MatrixBlock::from_rows(&[&[0.0, 5.0]]);
            Dictionary::from_block(block)
        }] {
            let mut buf = Vec::new();
            let written = d.write(&mut buf).unwrap();
            assert_eq!(written, buf.len() as u64);
            assert_eq!(written, d.disk_size());
            let loaded = Dictionary::read(&mut std::io::Cursor::new(&buf)).unwrap();
            assert_eq!(loaded, d);
        }
    }
}
