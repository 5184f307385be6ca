/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Contiguous row-major storage for dense blocks.

use cola_utils::views::{DenseView, DenseViewMut};

/// Dense row-major `f64` storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBlock {
    values: Box<[f64]>,
    cols: usize,
}

impl DenseBlock {
    /// Allocate a zero-filled block.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            values: vec![0.0; rows * cols].into_boxed_slice(),
            cols,
        }
    }

    /// Take ownership of row-major values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != rows * cols`.
    pub fn from_values(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "dense block of {rows}x{cols} requires {} values, got {}",
            rows * cols,
            values.len()
        );
        Self {
            values: values.into_boxed_slice(),
            cols,
        }
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.values[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: f64) {
        self.values[r * self.cols + c] = v;
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[f64] {
        &self.values[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.values[r * self.cols..(r + 1) * self.cols]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_values(self) -> Box<[f64]> {
        self.values
    }

    pub fn view(&self, rows: usize) -> DenseView<'_> {
        #[allow(clippy::expect_used)]
        DenseView::new(&self.values, rows, self.cols).expect("dense block shape is consistent")
    }

    pub fn view_mut(&mut self, rows: usize) -> DenseViewMut<'_> {
        #[allow(clippy::expect_used)]
        DenseViewMut::new(&mut self.values, rows, self.cols)
            .expect("dense block shape is consistent")
    }

    /// Count the non-zero cells.
    pub fn count_nonzeros(&self) -> u64 {
        self.values.iter().filter(|&&v| v != 0.0).count() as u64
    }
}
