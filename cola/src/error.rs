/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

/// Convenience alias for a `Result<T, CompressionError>`.
pub type CompressionResult<T> = Result<T, CompressionError>;

/// Errors raised at the compressed-matrix boundary.
///
/// Operations for which decompression is the documented fallback never
/// raise; they log a decompression notice at debug level and delegate to
/// the uncompressed kernels.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// The operation requires a different matrix state (for example a
    /// non-overlapping matrix).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Operand shapes are incompatible.
    #[error(
        "dimension mismatch for {op}: left is {}x{}, right is {}x{}",
        left.0, left.1, right.0, right.1
    )]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Neither a compressed nor a decompressed execution path exists.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The caller used a mutating or low-level API that is invalid for a
    /// compressed matrix.
    #[error("invalid use of a compressed matrix: {0}")]
    Misuse(&'static str),

    /// An argument is out of range.
    #[error("invalid argument for {op}: {detail}")]
    InvalidArgument {
        op: &'static str,
        detail: String,
    },

    /// Failure in a delegated uncompressed kernel.
    #[error(transparent)]
    Block(#[from] cola_block::BlockError),

    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
