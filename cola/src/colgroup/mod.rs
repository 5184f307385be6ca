/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Column groups: the per-encoding building blocks of a compressed matrix.
//!
//! A group covers a strictly increasing set of column indices and knows how
//! to answer reads, aggregates and multiplications directly on its encoded
//! form. The variants are a tagged union dispatched by `match`, so the hot
//! kernels stay monomorphic and the row-assignment bytes live inline with
//! the group.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cola_block::MatrixBlock;
use cola_utils::{BinaryOp, ScalarOp};

pub mod codes;
mod constant;
mod ddc;
mod empty;
pub mod encode;
mod ole;
mod rle;
mod sdc;
mod uncompressed;

pub use codes::CodeMap;
pub use constant::ColGroupConst;
pub use ddc::ColGroupDdc;
pub use empty::ColGroupEmpty;
pub use ole::ColGroupOle;
pub use rle::ColGroupRle;
pub use sdc::ColGroupSdc;
pub use uncompressed::ColGroupUncompressed;

use crate::dictionary::Dictionary;

const TAG_EMPTY: u8 = 0;
const TAG_UNCOMPRESSED: u8 = 1;
const TAG_CONST: u8 = 2;
const TAG_DDC: u8 = 3;
const TAG_SDC: u8 = 4;
const TAG_RLE: u8 = 5;
const TAG_OLE: u8 = 6;

/// The encoding scheme of a column group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColGroupKind {
    Empty,
    Uncompressed,
    Const,
    Ddc,
    Sdc,
    Rle,
    Ole,
}

/// One encoding covering a subset of the matrix columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ColGroup {
    Empty(ColGroupEmpty),
    Uncompressed(ColGroupUncompressed),
    Const(ColGroupConst),
    Ddc(ColGroupDdc),
    Sdc(ColGroupSdc),
    Rle(ColGroupRle),
    Ole(ColGroupOle),
}

impl ColGroup {
    pub fn kind(&self) -> ColGroupKind {
        match self {
            ColGroup::Empty(_) => ColGroupKind::Empty,
            ColGroup::Uncompressed(_) => ColGroupKind::Uncompressed,
            ColGroup::Const(_) => ColGroupKind::Const,
            ColGroup::Ddc(_) => ColGroupKind::Ddc,
            ColGroup::Sdc(_) => ColGroupKind::Sdc,
            ColGroup::Rle(_) => ColGroupKind::Rle,
            ColGroup::Ole(_) => ColGroupKind::Ole,
        }
    }

    /// The covered column indices, strictly increasing.
    pub fn col_indices(&self) -> &[u32] {
        match self {
            ColGroup::Empty(g) => &g.cols,
            ColGroup::Uncompressed(g) => &g.cols,
            ColGroup::Const(g) => &g.cols,
            ColGroup::Ddc(g) => &g.cols,
            ColGroup::Sdc(g) => &g.cols,
            ColGroup::Rle(g) => &g.cols,
            ColGroup::Ole(g) => &g.cols,
        }
    }

    fn cols_mut(&mut self) -> &mut Box<[u32]> {
        match self {
            ColGroup::Empty(g) => &mut g.cols,
            ColGroup::Uncompressed(g) => &mut g.cols,
            ColGroup::Const(g) => &mut g.cols,
            ColGroup::Ddc(g) => &mut g.cols,
            ColGroup::Sdc(g) => &mut g.cols,
            ColGroup::Rle(g) => &mut g.cols,
            ColGroup::Ole(g) => &mut g.cols,
        }
    }

    pub fn num_cols(&self) -> usize {
        self.col_indices().len()
    }

    /// The local position of global column `c`, if covered.
    pub fn contains_col(&self, c: usize) -> Option<usize> {
        self.col_indices().binary_search(&(c as u32)).ok()
    }

    /// The number of distinct tuples referenced by the group.
    pub fn num_values(&self) -> usize {
        match self {
            ColGroup::Empty(_) => 0,
            ColGroup::Uncompressed(g) => g.data.num_rows(),
            ColGroup::Const(_) => 1,
            ColGroup::Ddc(g) => g.num_values(),
            ColGroup::Sdc(g) => g.num_values(),
            ColGroup::Rle(g) => g.num_values(),
            ColGroup::Ole(g) => g.num_values(),
        }
    }

    /// Rows per value index, for the variants that track it.
    pub fn counts(&self) -> Option<&[u32]> {
        match self {
            ColGroup::Ddc(g) => Some(&g.counts),
            ColGroup::Sdc(g) => Some(&g.counts),
            ColGroup::Rle(g) => Some(&g.counts),
            ColGroup::Ole(g) => Some(&g.counts),
            _ => None,
        }
    }

    /// Read the cell at matrix row `r` and *local* column `local`.
    pub fn get_local(&self, r: usize, local: usize) -> f64 {
        match self {
            ColGroup::Empty(_) => 0.0,
            ColGroup::Uncompressed(g) => g.get(r, local),
            ColGroup::Const(g) => g.get(r, local),
            ColGroup::Ddc(g) => g.get(r, local),
            ColGroup::Sdc(g) => g.get(r, local),
            ColGroup::Rle(g) => g.get(r, local),
            ColGroup::Ole(g) => g.get(r, local),
        }
    }

    /// Read the cell at matrix row `r` and *global* column `c`; zero when
    /// the column is not covered.
    pub fn get(&self, r: usize, c: usize) -> f64 {
        match self.contains_col(c) {
            Some(local) => self.get_local(r, local),
            None => 0.0,
        }
    }

    /// Add the group's contribution for matrix rows `[rl, ru)` into a
    /// row-major destination whose row 0 is matrix row `rl` and whose
    /// width is `stride` (global column positions).
    pub fn add_into(&self, dst: &mut [f64], stride: usize, rl: usize, ru: usize) {
        self.add_into_cols(dst, stride, rl, ru, self.col_indices());
    }

    fn add_into_cols(&self, dst: &mut [f64], stride: usize, rl: usize, ru: usize, cols: &[u32]) {
        match self {
            ColGroup::Empty(_) => {}
            ColGroup::Uncompressed(g) => g.add_into(dst, stride, rl, ru, cols),
            ColGroup::Const(g) => g.add_into(dst, stride, rl, ru, cols),
            ColGroup::Ddc(g) => g.add_into(dst, stride, rl, ru, cols),
            ColGroup::Sdc(g) => g.add_into(dst, stride, rl, ru, cols),
            ColGroup::Rle(g) => g.add_into(dst, stride, rl, ru, cols),
            ColGroup::Ole(g) => g.add_into(dst, stride, rl, ru, cols),
        }
    }

    /// Materialize the covered cells as a dense `nrows x num_cols` buffer
    /// with locally-indexed columns.
    pub fn materialize_local(&self, nrows: usize) -> Vec<f64> {
        let ncols = self.num_cols();
        let mut dst = vec![0.0; nrows * ncols];
        let identity: Vec<u32> = (0..ncols as u32).collect();
        self.add_into_cols(&mut dst, ncols, 0, nrows, &identity);
        dst
    }

    pub fn compute_sum(&self, nrows: usize, square: bool) -> f64 {
        match self {
            ColGroup::Empty(_) => 0.0,
            ColGroup::Uncompressed(g) => g.sum(nrows, square),
            ColGroup::Const(g) => g.sum(nrows, square),
            ColGroup::Ddc(g) => g.sum(nrows, square),
            ColGroup::Sdc(g) => g.sum(nrows, square),
            ColGroup::Rle(g) => g.sum(nrows, square),
            ColGroup::Ole(g) => g.sum(nrows, square),
        }
    }

    /// Add per-row sums for rows `[rl, ru)` into `out` (`out[0]` is row
    /// `rl`).
    pub fn compute_row_sums(&self, out: &mut [f64], rl: usize, ru: usize, square: bool) {
        match self {
            ColGroup::Empty(_) => {}
            ColGroup::Uncompressed(g) => g.row_sums(out, rl, ru, square),
            ColGroup::Const(g) => g.row_sums(out, rl, ru, square),
            ColGroup::Ddc(g) => g.row_sums(out, rl, ru, square),
            ColGroup::Sdc(g) => g.row_sums(out, rl, ru, square),
            ColGroup::Rle(g) => g.row_sums(out, rl, ru, square),
            ColGroup::Ole(g) => g.row_sums(out, rl, ru, square),
        }
    }

    /// Add per-column sums into `out` at global column positions.
    pub fn compute_col_sums(&self, out: &mut [f64], nrows: usize, square: bool) {
        match self {
            ColGroup::Empty(_) => {}
            ColGroup::Uncompressed(g) => g.col_sums(out, nrows, square),
            ColGroup::Const(g) => g.col_sums(out, nrows, square),
            ColGroup::Ddc(g) => g.col_sums(out, nrows, square),
            ColGroup::Sdc(g) => g.col_sums(out, nrows, square),
            ColGroup::Rle(g) => g.col_sums(out, nrows, square),
            ColGroup::Ole(g) => g.col_sums(out, nrows, square),
        }
    }

    /// Fold the group's extremum over `init` (`min` selects the kernel).
    pub fn compute_mxx(&self, init: f64, min: bool, nrows: usize) -> f64 {
        match self {
            ColGroup::Empty(g) => g.mxx(init, min, nrows),
            ColGroup::Uncompressed(g) => g.mxx(init, min, nrows),
            ColGroup::Const(g) => g.mxx(init, min, nrows),
            ColGroup::Ddc(g) => g.mxx(init, min, nrows),
            ColGroup::Sdc(g) => g.mxx(init, min, nrows),
            ColGroup::Rle(g) => g.mxx(init, min, nrows),
            ColGroup::Ole(g) => g.mxx(init, min, nrows),
        }
    }

    pub fn compute_col_mxx(&self, out: &mut [f64], min: bool, nrows: usize) {
        match self {
            ColGroup::Empty(g) => g.col_mxx(out, min, nrows),
            ColGroup::Uncompressed(g) => g.col_mxx(out, min, nrows),
            ColGroup::Const(g) => g.col_mxx(out, min, nrows),
            ColGroup::Ddc(g) => g.col_mxx(out, min, nrows),
            ColGroup::Sdc(g) => g.col_mxx(out, min, nrows),
            ColGroup::Rle(g) => g.col_mxx(out, min, nrows),
            ColGroup::Ole(g) => g.col_mxx(out, min, nrows),
        }
    }

    pub fn compute_row_mxx(&self, out: &mut [f64], rl: usize, ru: usize, min: bool) {
        match self {
            ColGroup::Empty(g) => g.row_mxx(out, rl, ru, min),
            ColGroup::Uncompressed(g) => g.row_mxx(out, rl, ru, min),
            ColGroup::Const(g) => g.row_mxx(out, rl, ru, min),
            ColGroup::Ddc(g) => g.row_mxx(out, rl, ru, min),
            ColGroup::Sdc(g) => g.row_mxx(out, rl, ru, min),
            ColGroup::Rle(g) => g.row_mxx(out, rl, ru, min),
            ColGroup::Ole(g) => g.row_mxx(out, rl, ru, min),
        }
    }

    /// The product of every covered cell. A zero value (including the
    /// implicit zeros of an empty group) zeroes the product outright.
    pub fn compute_product(&self, nrows: usize) -> f64 {
        match self {
            ColGroup::Empty(_) => 0.0,
            ColGroup::Uncompressed(g) => g.product(nrows),
            ColGroup::Const(g) => g.product(nrows),
            ColGroup::Ddc(g) => g.product(nrows),
            ColGroup::Sdc(g) => g.product(nrows),
            ColGroup::Rle(g) => g.product(nrows),
            ColGroup::Ole(g) => g.product(nrows),
        }
    }

    /// Multiply per-row products for rows `[rl, ru)` into `out`.
    pub fn compute_row_products(&self, out: &mut [f64], rl: usize, ru: usize) {
        match self {
            ColGroup::Empty(g) => g.row_products(out, rl, ru),
            ColGroup::Uncompressed(g) => g.row_products(out, rl, ru),
            ColGroup::Const(g) => g.row_products(out, rl, ru),
            ColGroup::Ddc(g) => g.row_products(out, rl, ru),
            ColGroup::Sdc(g) => g.row_products(out, rl, ru),
            ColGroup::Rle(g) => g.row_products(out, rl, ru),
            ColGroup::Ole(g) => g.row_products(out, rl, ru),
        }
    }

    /// Multiply per-column products into `out` at global positions.
    pub fn compute_col_products(&self, out: &mut [f64], nrows: usize) {
        match self {
            ColGroup::Empty(g) => g.col_products(out, nrows),
            ColGroup::Uncompressed(g) => g.col_products(out, nrows),
            ColGroup::Const(g) => g.col_products(out, nrows),
            ColGroup::Ddc(g) => g.col_products(out, nrows),
            ColGroup::Sdc(g) => g.col_products(out, nrows),
            ColGroup::Rle(g) => g.col_products(out, nrows),
            ColGroup::Ole(g) => g.col_products(out, nrows),
        }
    }

    /// Apply a scalar operator to the group's values, preserving the row
    /// assignment.
    pub fn scalar_op(&self, op: ScalarOp, nrows: usize) -> ColGroup {
        self.map_values(&|v| op.apply(v), op.is_sparse_safe(), nrows)
    }

    /// Apply an arbitrary cell function; `zero_preserving` must hold only
    /// if `f(0) == 0`. Zero-default variants that cannot represent the
    /// transform convert to DDC first.
    pub fn map_values(
        &self,
        f: &dyn Fn(f64) -> f64,
        zero_preserving: bool,
        nrows: usize,
    ) -> ColGroup {
        match self {
            ColGroup::Empty(g) => g.map_values(f, zero_preserving),
            ColGroup::Uncompressed(g) => g.map_values(f, zero_preserving),
            ColGroup::Const(g) => g.map_values(f, zero_preserving),
            ColGroup::Ddc(g) => g.map_values(f, zero_preserving),
            ColGroup::Sdc(g) => g.map_values(f, zero_preserving),
            ColGroup::Rle(g) => g.map_values(f, zero_preserving, nrows),
            ColGroup::Ole(g) => g.map_values(f, zero_preserving, nrows),
        }
    }

    /// Pointwise op against a row vector `v` (global length), broadcast
    /// over the group's columns.
    pub fn binary_row_op(
        &self,
        op: BinaryOp,
        v: &[f64],
        left_side: bool,
        nrows: usize,
    ) -> ColGroup {
        match self {
            ColGroup::Empty(g) => g.binary_row_op(op, v, left_side),
            ColGroup::Uncompressed(g) => g.binary_row_op(op, v, left_side),
            ColGroup::Const(g) => g.binary_row_op(op, v, left_side),
            ColGroup::Ddc(g) => g.binary_row_op(op, v, left_side),
            ColGroup::Sdc(g) => g.binary_row_op(op, v, left_side),
            ColGroup::Rle(g) => g.binary_row_op(op, v, left_side, nrows),
            ColGroup::Ole(g) => g.binary_row_op(op, v, left_side, nrows),
        }
    }

    /// Substitute `pattern` (NaN matches NaN) with `replacement`.
    pub fn replace(&self, pattern: f64, replacement: f64, nrows: usize) -> ColGroup {
        match self {
            ColGroup::Empty(g) => g.replace(pattern, replacement),
            ColGroup::Uncompressed(g) => g.replace(pattern, replacement),
            ColGroup::Const(g) => g.replace(pattern, replacement),
            ColGroup::Ddc(g) => g.replace(pattern, replacement),
            ColGroup::Sdc(g) => g.replace(pattern, replacement),
            ColGroup::Rle(g) => g.replace(pattern, replacement, nrows),
            ColGroup::Ole(g) => g.replace(pattern, replacement, nrows),
        }
    }

    /// Multiply the group by `right`, producing a group over columns
    /// `0..right.num_cols()` with the row assignment preserved. `None`
    /// when the product is all-zero.
    pub fn right_mult(&self, right: &MatrixBlock) -> Option<ColGroup> {
        match self {
            ColGroup::Empty(g) => g.right_mult(right),
            ColGroup::Uncompressed(g) => g.right_mult(right),
            ColGroup::Const(g) => g.right_mult(right),
            ColGroup::Ddc(g) => g.right_mult(right),
            ColGroup::Sdc(g) => g.right_mult(right),
            ColGroup::Rle(g) => g.right_mult(right),
            ColGroup::Ole(g) => g.right_mult(right),
        }
    }

    /// Accumulate `lrow · group` into `out_row` (global columns), where
    /// `lrow` is one row of the left operand with `nrows` entries.
    pub fn left_mult_row(&self, lrow: &[f64], out_row: &mut [f64]) {
        match self {
            ColGroup::Empty(g) => g.left_mult_row(lrow, out_row),
            ColGroup::Uncompressed(g) => g.left_mult_row(lrow, out_row),
            ColGroup::Const(g) => g.left_mult_row(lrow, out_row),
            ColGroup::Ddc(g) => g.left_mult_row(lrow, out_row),
            ColGroup::Sdc(g) => g.left_mult_row(lrow, out_row),
            ColGroup::Rle(g) => g.left_mult_row(lrow, out_row),
            ColGroup::Ole(g) => g.left_mult_row(lrow, out_row),
        }
    }

    /// Accumulate `groupᵀ · group` into the upper triangle of the
    /// `n x n` row-major buffer `dst` at the group's column positions.
    pub fn tsmm_into(&self, dst: &mut [f64], n: usize, nrows: usize) {
        match self {
            ColGroup::Empty(_) => {}
            ColGroup::Uncompressed(g) => g.tsmm_into(dst, n, nrows),
            ColGroup::Const(g) => g.tsmm_into(dst, n, nrows),
            ColGroup::Ddc(g) => g.tsmm_into(dst, n, nrows),
            ColGroup::Sdc(g) => g.tsmm_into(dst, n, nrows),
            ColGroup::Rle(g) => g.tsmm_into(dst, n, nrows),
            ColGroup::Ole(g) => g.tsmm_into(dst, n, nrows),
        }
    }

    /// Project onto global columns `[cl, cu)`, shifting indices down by
    /// `cl`. `None` when the intersection is empty.
    pub fn slice_columns(&self, cl: usize, cu: usize) -> Option<ColGroup> {
        match self {
            ColGroup::Empty(g) => g.slice_columns(cl, cu),
            ColGroup::Uncompressed(g) => g.slice_columns(cl, cu),
            ColGroup::Const(g) => g.slice_columns(cl, cu),
            ColGroup::Ddc(g) => g.slice_columns(cl, cu),
            ColGroup::Sdc(g) => g.slice_columns(cl, cu),
            ColGroup::Rle(g) => g.slice_columns(cl, cu),
            ColGroup::Ole(g) => g.slice_columns(cl, cu),
        }
    }

    /// Whether any covered cell equals `pattern` (NaN matches NaN).
    pub fn contains_value(&self, pattern: f64, nrows: usize) -> bool {
        match self {
            ColGroup::Empty(g) => pattern == 0.0 && nrows > 0 && !g.cols.is_empty(),
            ColGroup::Uncompressed(g) => g.contains_value(pattern),
            ColGroup::Const(g) => g.contains_value(pattern),
            ColGroup::Ddc(g) => g.contains_value(pattern),
            ColGroup::Sdc(g) => g.contains_value(pattern, nrows),
            ColGroup::Rle(g) => g.contains_value(pattern, nrows),
            ColGroup::Ole(g) => g.contains_value(pattern, nrows),
        }
    }

    /// The number of non-zero cells covered by the group.
    pub fn count_nonzeros(&self, nrows: usize) -> u64 {
        match self {
            ColGroup::Empty(_) => 0,
            ColGroup::Uncompressed(g) => g.nnz(nrows),
            ColGroup::Const(g) => g.nnz(nrows),
            ColGroup::Ddc(g) => g.nnz(nrows),
            ColGroup::Sdc(g) => g.nnz(nrows),
            ColGroup::Rle(g) => g.nnz(nrows),
            ColGroup::Ole(g) => g.nnz(nrows),
        }
    }

    /// Shift every column index up by `off` (used by cbind append).
    pub fn shift_cols(&mut self, off: usize) {
        let cols = self.cols_mut();
        let shifted: Vec<u32> = cols.iter().map(|&c| c + off as u32).collect();
        *cols = shifted.into_boxed_slice();
    }

    /// Serialize as `u8 tag, u32 n_cols, cols…, body`.
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<u64> {
        let cols = self.col_indices();
        let tag = match self.kind() {
            ColGroupKind::Empty => TAG_EMPTY,
            ColGroupKind::Uncompressed => TAG_UNCOMPRESSED,
            ColGroupKind::Const => TAG_CONST,
            ColGroupKind::Ddc => TAG_DDC,
            ColGroupKind::Sdc => TAG_SDC,
            ColGroupKind::Rle => TAG_RLE,
            ColGroupKind::Ole => TAG_OLE,
        };
        w.write_u8(tag)?;
        w.write_u32::<LittleEndian>(cols.len() as u32)?;
        for &c in cols {
            w.write_u32::<LittleEndian>(c)?;
        }
        let mut written = 1 + 4 + 4 * cols.len() as u64;
        match self {
            ColGroup::Empty(_) => {}
            ColGroup::Uncompressed(g) => {
                written += cola_block::io::write_block(&g.data, w)?;
            }
            ColGroup::Const(g) => {
                written += g.dict.write(w)?;
            }
            ColGroup::Ddc(g) => {
                written += g.dict.write(w)?;
                written += g.codes.write(w)?;
            }
            ColGroup::Sdc(g) => {
                written += g.dict.write(w)?;
                for &v in g.default.iter() {
                    w.write_f64::<LittleEndian>(v)?;
                }
                w.write_u32::<LittleEndian>(g.rows.len() as u32)?;
                for &r in g.rows.iter() {
                    w.write_u32::<LittleEndian>(r)?;
                }
                written += 8 * g.default.len() as u64 + 4 + 4 * g.rows.len() as u64;
                written += g.codes.write(w)?;
            }
            ColGroup::Rle(g) => {
                written += g.dict.write(w)?;
                for &p in g.ptr.iter() {
                    w.write_u32::<LittleEndian>(p)?;
                }
                for &r in g.runs.iter() {
                    w.write_u32::<LittleEndian>(r)?;
                }
                written += 4 * (g.ptr.len() + g.runs.len()) as u64;
            }
            ColGroup::Ole(g) => {
                written += g.dict.write(w)?;
                for &p in g.ptr.iter() {
                    w.write_u32::<LittleEndian>(p)?;
                }
                for &o in g.offsets.iter() {
                    w.write_u32::<LittleEndian>(o)?;
                }
                written += 4 * (g.ptr.len() + g.offsets.len()) as u64;
            }
        }
        Ok(written)
    }

    /// Deserialize a group written by [`ColGroup::write`].
    pub fn read(r: &mut impl Read) -> std::io::Result<ColGroup> {
        let tag = r.read_u8()?;
        let ncols = r.read_u32::<LittleEndian>()? as usize;
        let mut cols = vec![0u32; ncols];
        for c in cols.iter_mut() {
            *c = r.read_u32::<LittleEndian>()?;
        }
        let cols = cols.into_boxed_slice();
        match tag {
            TAG_EMPTY => Ok(ColGroup::Empty(ColGroupEmpty::new(cols))),
            TAG_UNCOMPRESSED => {
                let data = cola_block::io::read_block(r)?;
                Ok(ColGroup::Uncompressed(ColGroupUncompressed::new(cols, data)))
            }
            TAG_CONST => {
                let dict = Dictionary::read(r)?;
                Ok(ColGroup::Const(ColGroupConst::new(cols, dict)))
            }
            TAG_DDC => {
                let dict = Dictionary::read(r)?;
                let codes = CodeMap::read(r)?;
                Ok(ColGroup::Ddc(ColGroupDdc::new(cols, dict, codes)))
            }
            TAG_SDC => {
                let dict = Dictionary::read(r)?;
                let mut default = vec![0.0; ncols];
                for v in default.iter_mut() {
                    *v = r.read_f64::<LittleEndian>()?;
                }
                let nrows = r.read_u32::<LittleEndian>()? as usize;
                let mut rows = vec![0u32; nrows];
                for row in rows.iter_mut() {
                    *row = r.read_u32::<LittleEndian>()?;
                }
                let codes = CodeMap::read(r)?;
                Ok(ColGroup::Sdc(ColGroupSdc::new(
                    cols,
                    dict,
                    default.into_boxed_slice(),
                    rows.into_boxed_slice(),
                    codes,
                )))
            }
            TAG_RLE => {
                let dict = Dictionary::read(r)?;
                let nv = dict.num_values(ncols);
                let mut ptr = vec![0u32; nv + 1];
                for p in ptr.iter_mut() {
                    *p = r.read_u32::<LittleEndian>()?;
                }
                let nruns = ptr[nv] as usize * 2;
                let mut runs = vec![0u32; nruns];
                for run in runs.iter_mut() {
                    *run = r.read_u32::<LittleEndian>()?;
                }
                Ok(ColGroup::Rle(ColGroupRle::new(
                    cols,
                    dict,
                    ptr.into_boxed_slice(),
                    runs.into_boxed_slice(),
                )))
            }
            TAG_OLE => {
                let dict = Dictionary::read(r)?;
                let nv = dict.num_values(ncols);
                let mut ptr = vec![0u32; nv + 1];
                for p in ptr.iter_mut() {
                    *p = r.read_u32::<LittleEndian>()?;
                }
                let noffsets = ptr[nv] as usize;
                let mut offsets = vec![0u32; noffsets];
                for o in offsets.iter_mut() {
                    *o = r.read_u32::<LittleEndian>()?;
                }
                Ok(ColGroup::Ole(ColGroupOle::new(
                    cols,
                    dict,
                    ptr.into_boxed_slice(),
                    offsets.into_boxed_slice(),
                )))
            }
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown column group tag {other}"),
            )),
        }
    }

    /// The exact bytes [`ColGroup::write`] produces.
    pub fn disk_size(&self) -> u64 {
        let base = 1 + 4 + 4 * self.num_cols() as u64;
        base + match self {
            ColGroup::Empty(_) => 0,
            ColGroup::Uncompressed(g) => cola_block::io::block_disk_size(&g.data),
            ColGroup::Const(g) => g.dict.disk_size(),
            ColGroup::Ddc(g) => g.dict.disk_size() + g.codes.disk_size(),
            ColGroup::Sdc(g) => {
                g.dict.disk_size()
                    + 8 * g.default.len() as u64
                    + 4
                    + 4 * g.rows.len() as u64
                    + g.codes.disk_size()
            }
            ColGroup::Rle(g) => g.dict.disk_size() + 4 * (g.ptr.len() + g.runs.len()) as u64,
            ColGroup::Ole(g) => g.dict.disk_size() + 4 * (g.ptr.len() + g.offsets.len()) as u64,
        }
    }

    /// An upper bound on the heap bytes held by the group.
    pub fn in_memory_size(&self) -> usize {
        let base = std::mem::size_of::<Self>() + 4 * self.num_cols();
        base + match self {
            ColGroup::Empty(_) => 0,
            ColGroup::Uncompressed(g) => {
                8 * (g.data.num_rows() * g.data.num_cols())
            }
            ColGroup::Const(g) => g.dict.in_memory_size(),
            ColGroup::Ddc(g) => {
                g.dict.in_memory_size() + g.codes.in_memory_size() + 4 * g.counts.len()
            }
            ColGroup::Sdc(g) => {
                g.dict.in_memory_size()
                    + 8 * g.default.len()
                    + 4 * g.rows.len()
                    + g.codes.in_memory_size()
                    + 4 * g.counts.len()
            }
            ColGroup::Rle(g) => {
                g.dict.in_memory_size() + 4 * (g.ptr.len() + g.runs.len() + g.counts.len())
            }
            ColGroup::Ole(g) => {
                g.dict.in_memory_size() + 4 * (g.ptr.len() + g.offsets.len() + g.counts.len())
            }
        }
    }
}

//////////////////////
// Shared kernels   //
//////////////////////

/// `v^count` for a row-count exponent.
#[inline]
pub(crate) fn powi_count(v: f64, count: u64) -> f64 {
    v.powi(count.min(i32::MAX as u64) as i32)
}

/// Gather the rows of `right` named by `cols` into a dense
/// `cols.len() x right.num_cols()` block.
pub(crate) fn gather_rows(right: &MatrixBlock, cols: &[u32]) -> MatrixBlock {
    let cr = right.num_cols();
    let mut values = vec![0.0; cols.len() * cr];
    for (i, &c) in cols.iter().enumerate() {
        right.copy_row_into(c as usize, &mut values[i * cr..(i + 1) * cr]);
    }
    MatrixBlock::from_dense(cols.len(), cr, values)
}

/// Multiply pre-aggregated per-value weights by the dictionary, scattering
/// into `out_row` at global columns.
pub(crate) fn preagg_mult(
    dict: &Dictionary,
    ncols: usize,
    cols: &[u32],
    preagg: &[f64],
    out_row: &mut [f64],
) {
    match dict.as_view(ncols) {
        Some(view) => {
            for (k, &w) in preagg.iter().enumerate() {
                if w == 0.0 {
                    continue;
                }
                let tuple = view.row(k);
                for (j, &c) in cols.iter().enumerate() {
                    out_row[c as usize] += w * tuple[j];
                }
            }
        }
        None => {
            #[allow(clippy::unwrap_used)]
            let block = dict.block_ref().unwrap();
            for (k, &w) in preagg.iter().enumerate() {
                if w == 0.0 {
                    continue;
                }
                block.for_each_in_row(k, |j, v| {
                    out_row[cols[j] as usize] += w * v;
                });
            }
        }
    }
}

/// Counts-weighted `dictᵀ · dict` into the upper triangle of `dst` at the
/// group's column positions. Sparse block dictionaries walk stored
/// non-zeros only.
pub(crate) fn tsmm_dict(dst: &mut [f64], n: usize, cols: &[u32], dict: &Dictionary, counts: &[u32]) {
    let ncols = cols.len();
    match dict.as_view(ncols) {
        Some(view) => {
            for (k, &count) in counts.iter().enumerate() {
                tsmm_tuple(dst, n, cols, view.row(k), count as u64);
            }
        }
        None => {
            #[allow(clippy::unwrap_used)]
            let block = dict.block_ref().unwrap();
            let mut cells: Vec<(usize, f64)> = Vec::with_capacity(ncols);
            for (k, &count) in counts.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                cells.clear();
                block.for_each_in_row(k, |j, v| cells.push((j, v)));
                for (a, &(i, vi)) in cells.iter().enumerate() {
                    let off = cols[i] as usize * n;
                    let v = vi * count as f64;
                    for &(j, vj) in &cells[a..] {
                        dst[off + cols[j] as usize] += v * vj;
                    }
                }
            }
        }
    }
}

/// One tuple's counts-weighted self-product into the upper triangle.
pub(crate) fn tsmm_tuple(dst: &mut [f64], n: usize, cols: &[u32], tuple: &[f64], count: u64) {
    if count == 0 {
        return;
    }
    let scale = count as f64;
    for (i, &vi) in tuple.iter().enumerate() {
        let v = vi * scale;
        if v == 0.0 {
            continue;
        }
        let off = cols[i] as usize * n;
        for (j, &vj) in tuple.iter().enumerate().skip(i) {
            dst[off + cols[j] as usize] += v * vj;
        }
    }
}

/// Locate the local position range of global columns `[cl, cu)` and build
/// the shifted column set. `None` when the intersection is empty.
pub(crate) fn slice_col_range(
    cols: &[u32],
    cl: usize,
    cu: usize,
) -> Option<(usize, usize, Box<[u32]>)> {
    let lo = cols.partition_point(|&c| (c as usize) < cl);
    let hi = cols.partition_point(|&c| (c as usize) < cu);
    if lo == hi {
        return None;
    }
    let shifted: Box<[u32]> = cols[lo..hi].iter().map(|&c| c - cl as u32).collect();
    Some((lo, hi, shifted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    fn sample_groups() -> Vec<ColGroup> {
        vec![
            ColGroup::Empty(ColGroupEmpty::new(vec![0, 1].into_boxed_slice())),
            ColGroup::Const(ColGroupConst::new(
                vec![2].into_boxed_slice(),
                Dictionary::single_tuple(vec![4.0]),
            )),
            ColGroup::Ddc(ColGroupDdc::new(
                vec![3, 5].into_boxed_slice(),
                Dictionary::dense(vec![1.0, 2.0, 0.0, 3.0]),
                CodeMap::from_codes(&[0, 1, 0], 2),
            )),
            ColGroup::Sdc(ColGroupSdc::new(
                vec![4].into_boxed_slice(),
                Dictionary::dense(vec![9.0]),
                vec![1.0].into_boxed_slice(),
                vec![1].into_boxed_slice(),
                CodeMap::from_codes(&[0], 1),
            )),
            ColGroup::Rle(ColGroupRle::new(
                vec![6].into_boxed_slice(),
                Dictionary::dense(vec![5.0]),
                vec![0, 1].into_boxed_slice(),
                vec![0, 2].into_boxed_slice(),
            )),
            ColGroup::Ole(ColGroupOle::new(
                vec![7].into_boxed_slice(),
                Dictionary::dense(vec![6.0]),
                vec![0, 1].into_boxed_slice(),
                vec![2].into_boxed_slice(),
            )),
            ColGroup::Uncompressed(ColGroupUncompressed::new(
                vec![8].into_boxed_slice(),
                MatrixBlock::from_rows(&[&[1.0], &[0.0], &[2.0]]),
            )),
        ]
    }

    #[test]
    fn serialization_round_trips_every_variant() {
        for g in sample_groups() {
            let mut buf = Vec::new();
            let written = g.write(&mut buf).unwrap();
            assert_eq!(written, buf.len() as u64, "{:?}", g.kind());
            assert_eq!(written, g.disk_size(), "{:?}", g.kind());
            let loaded = ColGroup::read(&mut std::io::Cursor::new(&buf)).unwrap();
            assert_eq!(loaded, g, "{:?}", g.kind());
        }
    }

    #[test]
    fn get_returns_zero_outside_cols() {
        let g = ColGroup::Const(ColGroupConst::new(
            vec![2].into_boxed_slice(),
            Dictionary::single_tuple(vec![4.0]),
        ));
        assert_eq!(g.get(0, 2), 4.0);
        assert_eq!(g.get(0, 1), 0.0);
        assert_eq!(g.contains_col(2), Some(0));
        assert_eq!(g.contains_col(3), None);
    }

    #[test]
    fn shift_cols_moves_indices() {
        let mut g = ColGroup::Empty(ColGroupEmpty::new(vec![0, 3].into_boxed_slice()));
        g.shift_cols(5);
        assert_eq!(g.col_indices(), &[5, 8]);
    }

    #[test]
    fn materialize_local_matches_get() {
        for g in sample_groups() {
            let nrows = 3;
            let local = g.materialize_local(nrows);
            for r in 0..nrows {
                for j in 0..g.num_cols() {
                    assert_eq!(
                        local[r * g.num_cols() + j],
                        g.get_local(r, j),
                        "{:?} at ({r},{j})",
                        g.kind()
                    );
                }
            }
        }
    }

    #[test]
    fn product_kernels_match_materialized_cells() {
        let nrows = 3;
        for g in sample_groups() {
            let ncols = g.num_cols();
            let local = g.materialize_local(nrows);

            let expected: f64 = local.iter().product();
            assert_eq!(
                g.compute_product(nrows),
                expected,
                "{:?} full product",
                g.kind()
            );

            let mut rows = vec![1.0; nrows];
            g.compute_row_products(&mut rows, 0, nrows);
            for (r, &got) in rows.iter().enumerate() {
                let want: f64 = local[r * ncols..(r + 1) * ncols].iter().product();
                assert_eq!(got, want, "{:?} row {r}", g.kind());
            }

            let mut cols = vec![1.0; 9];
            g.compute_col_products(&mut cols, nrows);
            for (j, &c) in g.col_indices().iter().enumerate() {
                let want: f64 = (0..nrows).map(|r| local[r * ncols + j]).product();
                assert_eq!(cols[c as usize], want, "{:?} col {c}", g.kind());
            }
        }
    }

    #[test]
    fn slice_col_range_shifts() {
        let cols = vec![1u32, 4, 6, 9];
        let (lo, hi, shifted) = slice_col_range(&cols, 3, 8).unwrap();
        assert_eq!((lo, hi), (1, 3));
        assert_eq!(shifted.as_ref(), &[1, 3]);
        assert!(slice_col_range(&cols, 2, 4).is_none());
    }
}
