/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The compressed matrix container: an ordered list of column groups plus
//! the dimensions, non-zero count, overlap flag and decompression cache.

use std::sync::Arc;

use cola_block::MatrixBlock;
use cola_utils::{AggDir, AggKind, AggOp, BinaryOp, ScalarOp};
use tracing::debug;

use crate::cache::DecompressCache;
use crate::colgroup::{ColGroup, ColGroupEmpty, ColGroupUncompressed};
use crate::error::{CompressionError, CompressionResult};
use crate::ops;

/// The result of an operation that may stay compressed or fall out to a
/// dense block.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyMatrix {
    Compressed(CompressedMatrix),
    Dense(MatrixBlock),
}

impl AnyMatrix {
    pub fn num_rows(&self) -> usize {
        match self {
            AnyMatrix::Compressed(m) => m.num_rows(),
            AnyMatrix::Dense(m) => m.num_rows(),
        }
    }

    pub fn num_cols(&self) -> usize {
        match self {
            AnyMatrix::Compressed(m) => m.num_cols(),
            AnyMatrix::Dense(m) => m.num_cols(),
        }
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        match self {
            AnyMatrix::Compressed(m) => m.get(r, c),
            AnyMatrix::Dense(m) => m.get(r, c),
        }
    }

    /// Materialize as an uncompressed block (decompressing if needed).
    pub fn to_dense(&self, k: usize) -> MatrixBlock {
        match self {
            AnyMatrix::Compressed(m) => (*m.decompress(k)).clone(),
            AnyMatrix::Dense(m) => m.clone(),
        }
    }

    pub fn as_compressed(&self) -> Option<&CompressedMatrix> {
        match self {
            AnyMatrix::Compressed(m) => Some(m),
            AnyMatrix::Dense(_) => None,
        }
    }
}

/// A column-group compressed matrix.
///
/// The group list is read-only after construction except through the
/// whole-replacement methods ([`CompressedMatrix::allocate_col_group`],
/// [`CompressedMatrix::allocate_col_group_list`]) and
/// [`CompressedMatrix::recompute_nnz`]; kernels may therefore share the
/// matrix freely across threads for reading.
#[derive(Debug)]
pub struct CompressedMatrix {
    rows: usize,
    cols: usize,
    /// `None` when unknown; refreshed by [`CompressedMatrix::recompute_nnz`].
    nnz: Option<u64>,
    overlapping: bool,
    groups: Vec<ColGroup>,
    pub(crate) cache: DecompressCache,
}

impl Clone for CompressedMatrix {
    /// Deep-clones the group list; the clone starts with an empty cache.
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            nnz: self.nnz,
            overlapping: self.overlapping,
            groups: self.groups.clone(),
            cache: DecompressCache::new(),
        }
    }
}

impl PartialEq for CompressedMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.nnz == other.nnz
            && self.overlapping == other.overlapping
            && self.groups == other.groups
    }
}

impl CompressedMatrix {
    /// An all-zero matrix represented by one `EMPTY` group.
    pub fn empty(rows: usize, cols: usize) -> Self {
        let cols_idx: Vec<u32> = (0..cols as u32).collect();
        Self {
            rows,
            cols,
            nnz: Some(0),
            overlapping: false,
            groups: vec![ColGroup::Empty(ColGroupEmpty::new(
                cols_idx.into_boxed_slice(),
            ))],
            cache: DecompressCache::new(),
        }
    }

    /// Build from an explicit group list, validating the column-coverage
    /// invariants.
    pub fn from_groups(
        rows: usize,
        cols: usize,
        groups: Vec<ColGroup>,
        overlapping: bool,
    ) -> CompressionResult<Self> {
        if groups.iter().any(|g| g.num_cols() == 0) {
            return Err(CompressionError::InvalidState(
                "column groups must cover at least one column",
            ));
        }
        let mut seen: Vec<u32> = groups
            .iter()
            .flat_map(|g| g.col_indices().iter().copied())
            .collect();
        if seen.iter().any(|&c| (c as usize) >= cols) {
            return Err(CompressionError::InvalidState(
                "group column index out of range",
            ));
        }
        if !overlapping {
            seen.sort_unstable();
            let disjoint_and_complete =
                seen.len() == cols && seen.iter().enumerate().all(|(i, &c)| c as usize == i);
            if !disjoint_and_complete {
                return Err(CompressionError::InvalidState(
                    "non-overlapping groups must partition the column range",
                ));
            }
        }
        let mut m = Self {
            rows,
            cols,
            nnz: None,
            overlapping,
            groups,
            cache: DecompressCache::new(),
        };
        m.recompute_nnz();
        Ok(m)
    }

    /// Assemble from already-validated parts (kernel-internal: the column
    /// coverage invariants must hold by construction).
    pub(crate) fn from_parts(
        rows: usize,
        cols: usize,
        groups: Vec<ColGroup>,
        overlapping: bool,
    ) -> Self {
        let mut m = Self {
            rows,
            cols,
            nnz: None,
            overlapping,
            groups,
            cache: DecompressCache::new(),
        };
        m.recompute_nnz();
        m
    }

    /// Wrap a pre-existing uncompressed block as a single-group compressed
    /// matrix, seeding the decompression cache with it.
    pub fn from_uncompressed(block: MatrixBlock) -> Self {
        let (rows, cols) = (block.num_rows(), block.num_cols());
        let nnz = block.nnz();
        let arc = Arc::new(block);
        let m = Self {
            rows,
            cols,
            nnz: Some(nnz),
            overlapping: false,
            groups: vec![ColGroup::Uncompressed(ColGroupUncompressed::spanning_shared(
                Arc::clone(&arc),
            ))],
            cache: DecompressCache::new(),
        };
        // the group keeps the allocation alive, so the weak slot stays
        // serviceable for the lifetime of the matrix
        m.cache.store(&arc);
        m
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// The non-zero count, `None` when unknown.
    pub fn nnz(&self) -> Option<u64> {
        self.nnz
    }

    pub fn col_groups(&self) -> &[ColGroup] {
        &self.groups
    }

    /// Whether reads must sum contributions across groups. A single-group
    /// matrix is never overlapping in effect.
    pub fn is_overlapping(&self) -> bool {
        self.groups.len() != 1 && self.overlapping
    }

    pub fn set_overlapping(&mut self, overlapping: bool) {
        self.overlapping = overlapping;
    }

    pub fn is_empty(&self) -> bool {
        match self.nnz {
            Some(n) => n == 0,
            None => self
                .groups
                .iter()
                .all(|g| matches!(g, ColGroup::Empty(_))),
        }
    }

    /// Replace the group list with the single group `g`.
    pub fn allocate_col_group(&mut self, g: ColGroup) {
        self.groups = vec![g];
    }

    /// Replace the group list wholesale.
    pub fn allocate_col_group_list(&mut self, groups: Vec<ColGroup>) {
        self.groups = groups;
    }

    pub(crate) fn set_nnz(&mut self, nnz: Option<u64>) {
        self.nnz = nnz;
    }

    /// Refresh the non-zero count. An overlapping matrix reports the
    /// conservative `rows * cols`; an all-zero matrix compacts to a single
    /// `EMPTY` group.
    pub fn recompute_nnz(&mut self) -> u64 {
        let nnz = if self.is_overlapping() {
            (self.rows * self.cols) as u64
        } else {
            self.groups
                .iter()
                .map(|g| g.count_nonzeros(self.rows))
                .sum()
        };
        self.nnz = Some(nnz);
        if nnz == 0 {
            let cols_idx: Vec<u32> = (0..self.cols as u32).collect();
            self.allocate_col_group(ColGroup::Empty(ColGroupEmpty::new(
                cols_idx.into_boxed_slice(),
            )));
            self.overlapping = false;
        }
        nnz
    }

    /// Read a single cell; an overlapping matrix sums the contribution of
    /// every group covering the column.
    ///
    /// # Panics
    ///
    /// Panics if the indices are out of range.
    pub fn get(&self, r: usize, c: usize) -> f64 {
        assert!(
            r < self.rows && c < self.cols,
            "cell ({r}, {c}) is out of range for a {}x{} matrix",
            self.rows,
            self.cols
        );
        if self.is_overlapping() {
            self.groups.iter().map(|g| g.get(r, c)).sum()
        } else {
            self.groups
                .iter()
                .find_map(|g| g.contains_col(c).map(|local| g.get_local(r, local)))
                .unwrap_or(0.0)
        }
    }

    /// An upper bound on the heap bytes held by the matrix: the container
    /// overhead (header fields, group list, cache slot) plus each group's
    /// estimate.
    pub fn in_memory_size(&self) -> usize {
        let base = std::mem::size_of::<Self>();
        base + self
            .groups
            .iter()
            .map(ColGroup::in_memory_size)
            .sum::<usize>()
    }

    //////////////////////////
    // Decompression        //
    //////////////////////////

    /// Decompress into an uncompressed block, caching the result.
    pub fn decompress(&self, k: usize) -> Arc<MatrixBlock> {
        ops::decompress::decompress(self, k)
    }

    /// The cached decompressed form, when still alive. Never forces a
    /// decompression.
    pub fn cached_decompressed(&self) -> Option<Arc<MatrixBlock>> {
        self.cache.get()
    }

    pub fn clear_cached_decompressed(&self) {
        self.cache.clear();
    }

    /// Fetch the uncompressed form for a fallback path, logging the
    /// decompression notice when the cache cannot serve it.
    pub fn get_uncompressed(&self, operation: &'static str, k: usize) -> Arc<MatrixBlock> {
        if let Some(hit) = self.cache.get() {
            return hit;
        }
        debug!(operation, "decompressing compressed matrix");
        self.decompress(k)
    }

    //////////////////////////
    // Compressed kernels   //
    //////////////////////////

    /// Apply a scalar operator. Stays compressed except for overlapping
    /// matrices under a non-distributive operator.
    pub fn scalar_op(&self, op: ScalarOp, k: usize) -> AnyMatrix {
        ops::scalar::scalar_op(self, op, k)
    }

    /// Cell-wise `self op rhs` with the rhs broadcast ladder (scalar, row
    /// vector, column vector / full matrix).
    pub fn binary_op(&self, op: BinaryOp, rhs: &MatrixBlock, k: usize) -> CompressionResult<AnyMatrix> {
        ops::binary::binary_op(self, op, rhs, false, k)
    }

    /// Cell-wise `lhs op self`.
    pub fn binary_op_left(
        &self,
        op: BinaryOp,
        lhs: &MatrixBlock,
        k: usize,
    ) -> CompressionResult<AnyMatrix> {
        ops::binary::binary_op(self, op, lhs, true, k)
    }

    /// Column-wise concatenation with another compressed matrix; stays
    /// compressed by shifting the rhs group columns.
    pub fn append(&self, rhs: &CompressedMatrix) -> CompressionResult<CompressedMatrix> {
        ops::append::append_cbind(self, rhs)
    }

    /// Column-wise concatenation with an uncompressed block.
    pub fn append_block(&self, rhs: &MatrixBlock) -> CompressionResult<CompressedMatrix> {
        ops::append::append_cbind(self, &CompressedMatrix::from_uncompressed(rhs.clone()))
    }

    /// Row-wise (or multi-way) append always decompresses.
    pub fn append_dense(
        &self,
        others: &[&MatrixBlock],
        cbind: bool,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        let mut acc = (*self.get_uncompressed("append rbind or multi-append", k)).clone();
        for other in others {
            acc = acc.append(other, cbind)?;
        }
        Ok(acc)
    }

    /// `self * right`. With `allow_overlap` and a multi-column right the
    /// result stays compressed in overlapping form without materializing.
    pub fn right_mult(
        &self,
        right: &MatrixBlock,
        k: usize,
        allow_overlap: bool,
    ) -> CompressionResult<AnyMatrix> {
        ops::right_mult::right_mult(self, right, k, allow_overlap)
    }

    /// `left * self` into a dense block.
    pub fn left_mult(&self, left: &MatrixBlock, k: usize) -> CompressionResult<MatrixBlock> {
        ops::left_mult::left_mult(self, left, k)
    }

    /// `t(self) * self` (the LEFT transpose-self product).
    pub fn tsmm_left(&self, k: usize) -> MatrixBlock {
        ops::tsmm::tsmm_left(self, k)
    }

    /// Unary aggregate. Sum, sum-of-squares, mean, min, max and product
    /// (and their row/column variants) run compressed; aggregates that
    /// need collapsed cell values decompress first on an overlapping
    /// matrix.
    pub fn aggregate_unary(&self, op: AggOp, k: usize) -> MatrixBlock {
        ops::aggregate::aggregate_unary(self, op, k)
    }

    pub fn sum(&self, k: usize) -> f64 {
        self.aggregate_unary(AggOp::sum(), k).get(0, 0)
    }

    pub fn sum_sq(&self, k: usize) -> f64 {
        self.aggregate_unary(AggOp::sum_sq(), k).get(0, 0)
    }

    pub fn mean(&self, k: usize) -> f64 {
        self.aggregate_unary(AggOp::mean(), k).get(0, 0)
    }

    pub fn min(&self, k: usize) -> f64 {
        self.aggregate_unary(AggOp::min(), k).get(0, 0)
    }

    pub fn max(&self, k: usize) -> f64 {
        self.aggregate_unary(AggOp::max(), k).get(0, 0)
    }

    pub fn product(&self, k: usize) -> f64 {
        self.aggregate_unary(AggOp::new(AggKind::Product, AggDir::All), k)
            .get(0, 0)
    }

    /// Substitute `pattern` with `replacement` per group; an overlapping
    /// matrix decompresses first.
    pub fn replace(&self, pattern: f64, replacement: f64, k: usize) -> AnyMatrix {
        if self.is_overlapping() {
            let dense = self.get_uncompressed("replace on an overlapping matrix", k);
            return AnyMatrix::Dense(dense.replace(pattern, replacement));
        }
        let groups: Vec<ColGroup> = self
            .groups
            .iter()
            .map(|g| g.replace(pattern, replacement, self.rows))
            .collect();
        let mut out = Self {
            rows: self.rows,
            cols: self.cols,
            nnz: None,
            overlapping: false,
            groups,
            cache: DecompressCache::new(),
        };
        out.recompute_nnz();
        AnyMatrix::Compressed(out)
    }

    /// Whether any cell equals `pattern`. Overlapping matrices raise
    /// `Unsupported`: the per-group values no longer equal the cell
    /// values, and the summed semantics are deliberately left
    /// unspecified.
    pub fn contains_value(&self, pattern: f64) -> CompressionResult<bool> {
        if self.is_overlapping() {
            return Err(CompressionError::Unsupported(
                "containsValue on an overlapping matrix",
            ));
        }
        Ok(self
            .groups
            .iter()
            .any(|g| g.contains_value(pattern, self.rows)))
    }

    /// Apply an arbitrary cell function through decompression, with an
    /// optional early-abort probe: when `probe` is given, the matrix is
    /// non-overlapping and no cell matches it, the result is all zeros
    /// without decompressing (the `isnan`-style shortcut).
    pub fn unary_op(
        &self,
        f: impl Fn(f64) -> f64,
        probe: Option<f64>,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        if let Some(p) = probe {
            if !self.is_overlapping() && !self.contains_value(p)? {
                return Ok(MatrixBlock::zeros(self.rows, self.cols));
            }
        }
        let dense = self.get_uncompressed("unary op", k);
        Ok(dense.map_cells(&f, false))
    }

    /// Slice `rows [rl, ru) x cols [cl, cu)`. Column slicing stays
    /// compressed; any row slicing decompresses the selected rows.
    pub fn slice(
        &self,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
        k: usize,
    ) -> CompressionResult<AnyMatrix> {
        ops::slice::slice(self, rl, ru, cl, cu, k)
    }

    /// Column slice as a compressed matrix.
    pub fn slice_columns(&self, cl: usize, cu: usize) -> CompressionResult<CompressedMatrix> {
        ops::slice::slice_columns(self, cl, cu)
    }

    /// The matrix multiplication chain `t(self) * (self * v)` (XtXv), or
    /// `t(self) * (w ⊙ (self * v))` when `weights` is given (XtwXv).
    pub fn chain_mm(
        &self,
        v: &MatrixBlock,
        weights: Option<&MatrixBlock>,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        ops::chain::chain_mm(self, v, weights, k)
    }

    /// Matrix multiply with transpose flags, following the engine's
    /// rewrite rules for compressed operands.
    pub fn aggregate_binary(
        &self,
        rhs: &CompressedMatrix,
        transpose_left: bool,
        transpose_right: bool,
        k: usize,
    ) -> CompressionResult<AnyMatrix> {
        ops::chain::aggregate_binary(self, rhs, transpose_left, transpose_right, k)
    }

    /// Merge overlapping groups back into a disjoint-column encoding.
    pub fn squash(&self, k: usize) -> CompressedMatrix {
        ops::squash::squash(self, k)
    }

    /// One-hot re-expansion of a single-column matrix, staying compressed
    /// when possible.
    pub fn reexpand(
        &self,
        max: usize,
        cast: bool,
        ignore: bool,
        k: usize,
    ) -> CompressionResult<AnyMatrix> {
        ops::reexpand::reexpand(self, max, cast, ignore, k)
    }

    //////////////////////////
    // Decompress fallbacks //
    //////////////////////////

    /// Transpose (always dense; a compressed transposed form is not
    /// represented).
    pub fn transpose(&self, k: usize) -> MatrixBlock {
        self.get_uncompressed("transpose", k).transpose()
    }

    pub fn sort_with_weights(
        &self,
        weights: Option<&MatrixBlock>,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        Ok(self
            .get_uncompressed("sort", k)
            .sort_with_weights(weights)?)
    }

    pub fn pick_value(
        &self,
        weights: Option<&MatrixBlock>,
        quantile: f64,
        average: bool,
        k: usize,
    ) -> CompressionResult<f64> {
        Ok(self
            .get_uncompressed("pickValue", k)
            .pick_value(weights, quantile, average)?)
    }

    pub fn central_moment(
        &self,
        weights: Option<&MatrixBlock>,
        order: u32,
        k: usize,
    ) -> CompressionResult<f64> {
        Ok(self
            .get_uncompressed("centralMoment", k)
            .central_moment(weights, order)?)
    }

    pub fn covariance(
        &self,
        that: &MatrixBlock,
        weights: Option<&MatrixBlock>,
        k: usize,
    ) -> CompressionResult<f64> {
        Ok(self
            .get_uncompressed("covariance", k)
            .covariance(that, weights)?)
    }

    pub fn ctable(
        &self,
        that: &MatrixBlock,
        weight: f64,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        Ok(self.get_uncompressed("ctable", k).ctable(that, weight)?)
    }

    pub fn grouped_aggregate(
        &self,
        groups: &MatrixBlock,
        weights: Option<&MatrixBlock>,
        ngroups: usize,
        kind: AggKind,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        Ok(self
            .get_uncompressed("groupedAggregate", k)
            .grouped_aggregate(groups, weights, ngroups, kind)?)
    }

    pub fn remove_empty(
        &self,
        rows: bool,
        select: Option<&MatrixBlock>,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        Ok(self
            .get_uncompressed("removeEmpty", k)
            .remove_empty(rows, select)?)
    }

    pub fn zero_out(
        &self,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
        complement: bool,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        Ok(self
            .get_uncompressed("zeroOut", k)
            .zero_out(rl, ru, cl, cu, complement)?)
    }

    /// Distributed-aggregation merge: decompress and fold `delta` into the
    /// dense form with a per-cell correction, returning the merged block.
    pub fn incremental_aggregate(
        &self,
        correction: &mut MatrixBlock,
        delta: &MatrixBlock,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        let mut acc = (*self.get_uncompressed("incrementalAggregate", k)).clone();
        acc.incremental_aggregate(correction, delta)?;
        Ok(acc)
    }

    /// The quaternary weighted-square-loss `sum(w ⊙ (self - u * t(v))^2)`.
    pub fn weighted_square_loss(
        &self,
        u: &MatrixBlock,
        v: &MatrixBlock,
        w: Option<&MatrixBlock>,
        k: usize,
    ) -> CompressionResult<f64> {
        Ok(self
            .get_uncompressed("quaternary weighted square loss", k)
            .weighted_square_loss(u, v, w)?)
    }

    /// Overwrite the region starting at `(rl, cl)` with `rhs`, producing a
    /// dense result.
    pub fn left_indexing(
        &self,
        rhs: &MatrixBlock,
        rl: usize,
        cl: usize,
        k: usize,
    ) -> CompressionResult<MatrixBlock> {
        if rl + rhs.num_rows() > self.rows || cl + rhs.num_cols() > self.cols {
            return Err(CompressionError::DimensionMismatch {
                op: "leftIndexing",
                left: (self.rows, self.cols),
                right: (rhs.num_rows(), rhs.num_cols()),
            });
        }
        let mut dense = (*self.get_uncompressed("leftIndexing", k)).clone();
        for r in 0..rhs.num_rows() {
            for c in 0..rhs.num_cols() {
                dense.set(rl + r, cl + c, rhs.get(r, c));
            }
        }
        Ok(dense)
    }

    //////////////////////////
    // Misuse guards        //
    //////////////////////////

    /// Rejected: a compressed matrix cannot be reset in place.
    pub fn reset(&mut self, _rows: usize, _cols: usize) -> CompressionResult<()> {
        Err(CompressionError::Misuse("reset"))
    }

    /// Rejected: single-cell writes require the uncompressed form.
    pub fn set_value(&mut self, _r: usize, _c: usize, _v: f64) -> CompressionResult<()> {
        Err(CompressionError::Misuse("set_value"))
    }

    /// Rejected: appending cells requires the uncompressed form.
    pub fn append_value(&mut self, _r: usize, _c: usize, _v: f64) -> CompressionResult<()> {
        Err(CompressionError::Misuse("append_value"))
    }

    /// Rejected: a compressed matrix owns no dense block.
    pub fn allocate_dense_block(&mut self) -> CompressionResult<&mut [f64]> {
        Err(CompressionError::Misuse("allocate_dense_block"))
    }

    /// Rejected: bulk initialization requires the uncompressed form.
    pub fn init(&mut self, _values: &[f64]) -> CompressionResult<()> {
        Err(CompressionError::Misuse("init"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colgroup::encode;

    fn ddc_matrix() -> (CompressedMatrix, MatrixBlock) {
        let dense = MatrixBlock::from_rows(&[
            &[1.0, 5.0, 0.0],
            &[2.0, 5.0, 0.0],
            &[1.0, 5.0, 3.0],
            &[2.0, 5.0, 3.0],
        ]);
        let groups = vec![
            encode::encode_ddc(&dense, &[0]),
            encode::encode_ddc(&dense, &[1, 2]),
        ];
        let m = CompressedMatrix::from_groups(4, 3, groups, false).unwrap();
        (m, dense)
    }

    #[test]
    fn from_groups_validates_partition() {
        let dense = MatrixBlock::from_rows(&[&[1.0, 2.0]]);
        // missing column 1
        let g = vec![encode::encode_ddc(&dense, &[0])];
        assert!(matches!(
            CompressedMatrix::from_groups(1, 2, g, false),
            Err(CompressionError::InvalidState(_))
        ));
        // out-of-range column index
        let g = vec![encode::encode_ddc(&dense, &[0]), encode::encode_ddc(&dense, &[1])];
        assert!(CompressedMatrix::from_groups(1, 1, g, false).is_err());
    }

    #[test]
    fn get_reads_cells() {
        let (m, dense) = ddc_matrix();
        for r in 0..4 {
            for c in 0..3 {
                assert_eq!(m.get(r, c), dense.get(r, c), "({r},{c})");
            }
        }
    }

    #[test]
    fn nnz_matches_dense() {
        let (m, dense) = ddc_matrix();
        assert_eq!(m.nnz(), Some(dense.nnz()));
    }

    #[test]
    fn recompute_nnz_compacts_all_zero_to_empty() {
        let dense = MatrixBlock::zeros(3, 2);
        let m = CompressedMatrix::from_groups(
            3,
            2,
            vec![encode::encode_ddc(&dense, &[0]), encode::encode_ddc(&dense, &[1])],
            false,
        )
        .unwrap();
        assert_eq!(m.col_groups().len(), 1);
        assert!(matches!(m.col_groups()[0], ColGroup::Empty(_)));
        assert_eq!(m.nnz(), Some(0));
    }

    #[test]
    fn single_group_is_never_overlapping() {
        let dense = MatrixBlock::from_rows(&[&[1.0]]);
        let mut m = CompressedMatrix::from_groups(
            1,
            1,
            vec![encode::encode_ddc(&dense, &[0])],
            false,
        )
        .unwrap();
        m.set_overlapping(true);
        assert!(!m.is_overlapping());
    }

    #[test]
    fn misuse_guards_reject() {
        let (mut m, _) = ddc_matrix();
        assert!(matches!(
            m.reset(2, 2),
            Err(CompressionError::Misuse("reset"))
        ));
        assert!(matches!(
            m.set_value(0, 0, 1.0),
            Err(CompressionError::Misuse("set_value"))
        ));
        assert!(matches!(
            m.append_value(0, 0, 1.0),
            Err(CompressionError::Misuse(_))
        ));
        assert!(m.allocate_dense_block().is_err());
        assert!(m.init(&[]).is_err());
    }

    #[test]
    fn from_uncompressed_seeds_cache() {
        let dense = MatrixBlock::from_rows(&[&[1.0, 2.0]]);
        let m = CompressedMatrix::from_uncompressed(dense.clone());
        let cached = m.cached_decompressed().unwrap();
        assert_eq!(*cached, dense);
        m.clear_cached_decompressed();
        assert!(m.cached_decompressed().is_none());
    }

    #[test]
    fn contains_value_checks_groups() {
        let (m, _) = ddc_matrix();
        assert!(m.contains_value(5.0).unwrap());
        assert!(m.contains_value(0.0).unwrap());
        assert!(!m.contains_value(9.0).unwrap());
    }

    #[test]
    fn clone_drops_cache_but_keeps_groups() {
        let dense = MatrixBlock::from_rows(&[&[1.0, 2.0]]);
        let m = CompressedMatrix::from_uncompressed(dense);
        let cloned = m.clone();
        assert_eq!(m, cloned);
        assert!(cloned.cached_decompressed().is_none());
    }

    #[test]
    fn unary_probe_short_circuits() {
        let (m, _) = ddc_matrix();
        let out = m
            .unary_op(|v| f64::from(v.is_nan()), Some(f64::NAN), 1)
            .unwrap();
        assert_eq!(out.nnz(), 0);
    }
}
