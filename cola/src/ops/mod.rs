/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Cross-group kernels over whole compressed matrices, one module per
//! operation family.

pub mod aggregate;
pub mod append;
pub mod binary;
pub mod chain;
pub mod decompress;
pub mod left_mult;
pub mod reexpand;
pub mod right_mult;
pub mod scalar;
pub mod slice;
pub mod squash;
pub mod tsmm;
