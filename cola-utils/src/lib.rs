/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! # cola-utils
//!
//! Leaf utilities shared between the dense block kernels and the compressed
//! column-group kernels: row-major views over `f64` buffers, deterministic
//! row-stripe partitioning for parallel kernels, compensated summation, and
//! the operator vocabulary (scalar / binary / aggregate ops).
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

pub mod kahan;
pub mod ops;
pub mod stripes;
pub mod views;

pub use kahan::KahanSum;
pub use ops::{AggDir, AggKind, AggOp, BinaryOp, ScalarOp};
pub use stripes::{row_stripes, stripe_height};
pub use views::{DenseView, DenseViewMut, ViewShapeError};
