/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

/// Convenience alias for a `Result<T, BlockError>`.
pub type BlockResult<T> = Result<T, BlockError>;

/// Errors raised by the uncompressed block kernels.
#[derive(Debug, Error)]
pub enum BlockError {
    /// Operand shapes are incompatible for the named operation.
    #[error(
        "dimension mismatch for {op}: left is {}x{}, right is {}x{}",
        left.0, left.1, right.0, right.1
    )]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// A slice or cell access is out of range.
    #[error("{op}: range [{lo}, {hi}) is out of range for extent {extent}")]
    InvalidRange {
        op: &'static str,
        lo: usize,
        hi: usize,
        extent: usize,
    },

    /// The operation requires a column vector input.
    #[error("{op} requires a column vector, got a {rows}x{cols} block")]
    NotAColumnVector {
        op: &'static str,
        rows: usize,
        cols: usize,
    },

    /// A cell value is invalid for the named operation.
    #[error("{op}: invalid cell value {value}")]
    InvalidValue { op: &'static str, value: f64 },

    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
