/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! # cola
//!
//! Column-group compressed matrices for a numerical dataflow engine.
//!
//! A [`CompressedMatrix`] is an ordered list of [`colgroup::ColGroup`]s,
//! each covering a subset of the columns with a dictionary-backed encoding
//! (constant, dense dictionary codes, sparse exceptions, run lengths,
//! offset lists, or an embedded uncompressed block). The linear algebra
//! kernels — unary aggregates, scalar and cell-wise operators, right and
//! left matrix multiplication, and the transpose-self product — run
//! directly on the encoded form; operations without a compressed path
//! decompress once through a weakly-cached dense block and delegate to the
//! uncompressed kernels.
//!
//! ```
//! use cola::colgroup::encode;
//! use cola::CompressedMatrix;
//! use cola_block::MatrixBlock;
//!
//! let dense = MatrixBlock::from_rows(&[
//!     &[1.0, 1.0, 2.0],
//!     &[1.0, 1.0, 2.0],
//!     &[1.0, 1.0, 2.0],
//! ]);
//! let group = encode::encode_ddc(&dense, &[0, 1, 2]);
//! let m = CompressedMatrix::from_groups(3, 3, vec![group], false).unwrap();
//!
//! assert_eq!(m.sum(1), 12.0);
//! assert_eq!(m.max(1), 2.0);
//! assert_eq!(m.decompress(1).get(2, 2), 2.0);
//! ```
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

mod cache;
pub mod colgroup;
pub mod dictionary;
mod error;
pub mod io;
mod matrix;
pub mod ops;

pub use cache::DecompressCache;
pub use dictionary::Dictionary;
pub use error::{CompressionError, CompressionResult};
pub use matrix::{AnyMatrix, CompressedMatrix};

// The operator vocabulary is part of the public API surface.
pub use cola_utils::{AggDir, AggKind, AggOp, BinaryOp, ScalarOp};
