/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! # cola-block
//!
//! The uncompressed matrix collaborator of the compressed engine: dense,
//! sparse and empty block storage, cell access, and the kernel surface the
//! compressed side delegates to (multiply, transpose, cell-wise ops,
//! aggregates, slicing, order statistics).
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

mod block;
mod dense;
mod error;
pub mod io;
pub mod kernels;
mod sparse;

pub use block::{BlockData, MatrixBlock, SPARSITY_TURN_POINT};
pub use dense::DenseBlock;
pub use error::{BlockError, BlockResult};
pub use sparse::{SparseBlock, SparseRow};

use cola_utils::{AggOp, BinaryOp, ScalarOp};

/// Method façade over the kernel modules, mirroring how call sites read.
impl MatrixBlock {
    /// `self * rhs` (see [`kernels::multiply::multiply`]).
    pub fn multiply(&self, rhs: &MatrixBlock, k: usize) -> BlockResult<MatrixBlock> {
        kernels::multiply::multiply(self, rhs, k)
    }

    /// `t(self) * (self * v)`, optionally weighted by `w`.
    pub fn chain_multiply(
        &self,
        v: &MatrixBlock,
        w: Option<&MatrixBlock>,
        k: usize,
    ) -> BlockResult<MatrixBlock> {
        kernels::multiply::chain_multiply(self, v, w, k)
    }

    pub fn transpose(&self) -> MatrixBlock {
        kernels::reorg::transpose(self)
    }

    pub fn transpose_in_place(&mut self) {
        kernels::reorg::transpose_in_place(self)
    }

    pub fn scalar_op(&self, op: ScalarOp) -> MatrixBlock {
        kernels::cell::scalar_op(self, op)
    }

    /// Apply an arbitrary cell function; `zero_preserving` must hold only
    /// if `f(0) == 0`.
    pub fn map_cells(&self, f: impl Fn(f64) -> f64, zero_preserving: bool) -> MatrixBlock {
        kernels::cell::map_cells(self, f, zero_preserving)
    }

    pub fn binary_op(&self, op: BinaryOp, rhs: &MatrixBlock) -> BlockResult<MatrixBlock> {
        kernels::cell::binary_op(self, op, rhs)
    }

    pub fn binary_op_in_place(&mut self, op: BinaryOp, rhs: &MatrixBlock) -> BlockResult<()> {
        kernels::cell::binary_op_in_place(self, op, rhs)
    }

    pub fn aggregate_unary(&self, op: AggOp) -> MatrixBlock {
        kernels::cell::aggregate_unary(self, op)
    }

    pub fn sum(&self) -> f64 {
        self.aggregate_unary(AggOp::sum()).get(0, 0)
    }

    pub fn min(&self) -> f64 {
        self.aggregate_unary(AggOp::min()).get(0, 0)
    }

    pub fn max(&self) -> f64 {
        self.aggregate_unary(AggOp::max()).get(0, 0)
    }

    pub fn mean(&self) -> f64 {
        self.aggregate_unary(AggOp::mean()).get(0, 0)
    }

    pub fn replace(&self, pattern: f64, replacement: f64) -> MatrixBlock {
        kernels::cell::replace(self, pattern, replacement)
    }

    /// Merge `delta` into `self`, carrying a per-cell Kahan correction.
    pub fn incremental_aggregate(
        &mut self,
        correction: &mut MatrixBlock,
        delta: &MatrixBlock,
    ) -> BlockResult<()> {
        kernels::cell::incremental_aggregate(self, correction, delta)
    }

    /// `sum(w ⊙ (self - u * t(v))^2)`.
    pub fn weighted_square_loss(
        &self,
        u: &MatrixBlock,
        v: &MatrixBlock,
        w: Option<&MatrixBlock>,
    ) -> BlockResult<f64> {
        kernels::cell::weighted_square_loss(self, u, v, w)
    }

    pub fn contains_value(&self, pattern: f64) -> bool {
        kernels::cell::contains_value(self, pattern)
    }

    /// Copy out `rows [rl, ru) x cols [cl, cu)`.
    pub fn slice(&self, rl: usize, ru: usize, cl: usize, cu: usize) -> BlockResult<MatrixBlock> {
        kernels::reorg::slice(self, rl, ru, cl, cu)
    }

    pub fn append(&self, rhs: &MatrixBlock, cbind: bool) -> BlockResult<MatrixBlock> {
        kernels::reorg::append(self, rhs, cbind)
    }

    pub fn remove_empty(
        &self,
        rows: bool,
        select: Option<&MatrixBlock>,
    ) -> BlockResult<MatrixBlock> {
        kernels::reorg::remove_empty(self, rows, select)
    }

    pub fn rexpand(&self, max: usize, cast: bool, ignore: bool) -> BlockResult<MatrixBlock> {
        kernels::reorg::rexpand(self, max, cast, ignore)
    }

    pub fn zero_out(
        &self,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
        complement: bool,
    ) -> BlockResult<MatrixBlock> {
        kernels::reorg::zero_out(self, rl, ru, cl, cu, complement)
    }

    pub fn sort_with_weights(&self, weights: Option<&MatrixBlock>) -> BlockResult<MatrixBlock> {
        kernels::stats::sort_with_weights(self, weights)
    }

    pub fn pick_value(
        &self,
        weights: Option<&MatrixBlock>,
        quantile: f64,
        average: bool,
    ) -> BlockResult<f64> {
        kernels::stats::pick_value(self, weights, quantile, average)
    }

    pub fn central_moment(
        &self,
        weights: Option<&MatrixBlock>,
        order: u32,
    ) -> BlockResult<f64> {
        kernels::stats::central_moment(self, weights, order)
    }

    pub fn covariance(
        &self,
        that: &MatrixBlock,
        weights: Option<&MatrixBlock>,
    ) -> BlockResult<f64> {
        kernels::stats::covariance(self, that, weights)
    }

    pub fn ctable(&self, that: &MatrixBlock, weight: f64) -> BlockResult<MatrixBlock> {
        kernels::stats::ctable(self, that, weight)
    }

    pub fn grouped_aggregate(
        &self,
        groups: &MatrixBlock,
        weights: Option<&MatrixBlock>,
        ngroups: usize,
        kind: cola_utils::AggKind,
    ) -> BlockResult<MatrixBlock> {
        kernels::stats::grouped_aggregate(self, groups, weights, ngroups, kind)
    }
}
