/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Kernels over uncompressed blocks.

pub mod cell;
pub mod multiply;
pub mod reorg;
pub mod stats;
