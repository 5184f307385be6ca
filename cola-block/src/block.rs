/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The uncompressed matrix block: `Empty | Dense | Sparse` storage with
//! cell access and sparsity management. Kernels live in [`crate::kernels`]
//! and are re-exported as methods here.

use crate::dense::DenseBlock;
use crate::sparse::SparseBlock;

/// The in-memory sparsity threshold below which a multi-column block
/// converts to the sparse layout.
pub const SPARSITY_TURN_POINT: f64 = 0.4;

/// Storage backing a [`MatrixBlock`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    /// No allocation; every cell reads as zero.
    Empty,
    Dense(DenseBlock),
    Sparse(SparseBlock),
}

/// An uncompressed matrix of `f64` cells.
///
/// The block tracks its non-zero count eagerly: constructors count, `set`
/// adjusts incrementally, and [`MatrixBlock::recompute_nnz`] rebuilds it
/// from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBlock {
    rows: usize,
    cols: usize,
    nnz: u64,
    data: BlockData,
}

impl MatrixBlock {
    /// An unallocated all-zero block.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            nnz: 0,
            data: BlockData::Empty,
        }
    }

    /// A zero block with the requested layout pre-allocated.
    pub fn new(rows: usize, cols: usize, sparse: bool) -> Self {
        let data = if sparse {
            BlockData::Sparse(SparseBlock::new(rows))
        } else {
            BlockData::Dense(DenseBlock::zeros(rows, cols))
        };
        Self {
            rows,
            cols,
            nnz: 0,
            data,
        }
    }

    /// Build a dense block from row-major values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != rows * cols`.
    pub fn from_dense(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        let dense = DenseBlock::from_values(rows, cols, values);
        let nnz = dense.count_nonzeros();
        Self {
            rows,
            cols,
            nnz,
            data: BlockData::Dense(dense),
        }
    }

    /// Build a dense block from explicit rows. Intended for tests.
    ///
    /// # Panics
    ///
    /// Panics if the rows have inconsistent lengths.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        let mut values = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), ncols, "row {i} has length {}", row.len());
            values.extend_from_slice(row);
        }
        Self::from_dense(nrows, ncols, values)
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        Self::from_dense(n, n, values)
    }

    /// A `len x 1` column vector.
    pub fn column_vector(values: Vec<f64>) -> Self {
        let rows = values.len();
        Self::from_dense(rows, 1, values)
    }

    /// A `1 x len` row vector.
    pub fn row_vector(values: Vec<f64>) -> Self {
        let cols = values.len();
        Self::from_dense(1, cols, values)
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    pub fn is_empty(&self) -> bool {
        self.nnz == 0
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.data, BlockData::Sparse(_))
    }

    pub fn is_vector(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    /// Read cell `(r, c)`.
    ///
    /// # Panics
    ///
    /// Panics if the indices are out of range.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        assert!(
            r < self.rows && c < self.cols,
            "cell ({r}, {c}) is out of range for a {}x{} block",
            self.rows,
            self.cols
        );
        match &self.data {
            BlockData::Empty => 0.0,
            BlockData::Dense(d) => d.get(r, c),
            BlockData::Sparse(s) => s.get(r, c),
        }
    }

    /// Write cell `(r, c)`, allocating dense storage on first write to an
    /// empty block.
    ///
    /// # Panics
    ///
    /// Panics if the indices are out of range.
    pub fn set(&mut self, r: usize, c: usize, v: f64) {
        assert!(
            r < self.rows && c < self.cols,
            "cell ({r}, {c}) is out of range for a {}x{} block",
            self.rows,
            self.cols
        );
        match &mut self.data {
            BlockData::Empty => {
                if v == 0.0 {
                    return;
                }
                let mut dense = DenseBlock::zeros(self.rows, self.cols);
                dense.set(r, c, v);
                self.data = BlockData::Dense(dense);
                self.nnz = 1;
            }
            BlockData::Dense(d) => {
                let old = d.get(r, c);
                d.set(r, c, v);
                self.nnz = self.nnz + u64::from(v != 0.0) - u64::from(old != 0.0);
            }
            BlockData::Sparse(s) => {
                let delta = s.set(r, c, v);
                self.nnz = self.nnz.wrapping_add_signed(delta);
            }
        }
    }

    /// Dense values if the block is in the dense layout.
    pub fn dense_values(&self) -> Option<&[f64]> {
        match &self.data {
            BlockData::Dense(d) => Some(d.values()),
            _ => None,
        }
    }

    /// Ensure dense layout and return the values mutably.
    pub fn allocate_dense(&mut self) -> &mut [f64] {
        self.to_dense();
        match &mut self.data {
            BlockData::Dense(d) => d.values_mut(),
            // to_dense just installed the dense layout
            _ => unreachable!(),
        }
    }

    /// Convert to the dense layout.
    pub fn to_dense(&mut self) {
        match &self.data {
            BlockData::Dense(_) => {}
            BlockData::Empty => {
                self.data = BlockData::Dense(DenseBlock::zeros(self.rows, self.cols));
            }
            BlockData::Sparse(s) => {
                let mut dense = DenseBlock::zeros(self.rows, self.cols);
                for r in 0..self.rows {
                    for (c, v) in s.row(r).iter() {
                        dense.set(r, c, v);
                    }
                }
                self.data = BlockData::Dense(dense);
            }
        }
    }

    /// Convert to the sparse layout.
    pub fn to_sparse(&mut self) {
        match &self.data {
            BlockData::Sparse(_) => {}
            BlockData::Empty => {
                self.data = BlockData::Sparse(SparseBlock::new(self.rows));
            }
            BlockData::Dense(d) => {
                let mut sparse = SparseBlock::new(self.rows);
                for r in 0..self.rows {
                    let row = d.row(r);
                    let target = sparse.row_mut(r);
                    for (c, &v) in row.iter().enumerate() {
                        if v != 0.0 {
                            target.append(c, v);
                        }
                    }
                }
                self.data = BlockData::Sparse(sparse);
            }
        }
    }

    /// The sparsity of the block (`nnz / (rows * cols)`), 1.0 for empty
    /// shapes.
    pub fn sparsity(&self) -> f64 {
        let cells = (self.rows * self.cols) as f64;
        if cells == 0.0 {
            1.0
        } else {
            self.nnz as f64 / cells
        }
    }

    /// Pick the cheaper layout for the current contents.
    ///
    /// Single-column blocks stay dense; otherwise the block converts to
    /// sparse below [`SPARSITY_TURN_POINT`] and back to dense above it.
    pub fn exam_sparsity(&mut self) {
        if self.nnz == 0 {
            self.data = BlockData::Empty;
            return;
        }
        let should_be_sparse = self.cols > 1 && self.sparsity() < SPARSITY_TURN_POINT;
        if should_be_sparse {
            self.to_sparse();
        } else {
            self.to_dense();
        }
    }

    /// Recount the non-zeros from storage.
    pub fn recompute_nnz(&mut self) -> u64 {
        self.nnz = match &self.data {
            BlockData::Empty => 0,
            BlockData::Dense(d) => d.count_nonzeros(),
            BlockData::Sparse(s) => s.count_nonzeros(),
        };
        self.nnz
    }

    /// Copy row `r` into `buf` (dense expansion for sparse rows).
    ///
    /// # Panics
    ///
    /// Panics if `buf.len() != self.num_cols()` or `r` is out of range.
    pub fn copy_row_into(&self, r: usize, buf: &mut [f64]) {
        assert_eq!(buf.len(), self.cols);
        assert!(r < self.rows, "row {r} out of range for {} rows", self.rows);
        match &self.data {
            BlockData::Empty => buf.fill(0.0),
            BlockData::Dense(d) => buf.copy_from_slice(d.row(r)),
            BlockData::Sparse(s) => {
                buf.fill(0.0);
                for (c, v) in s.row(r).iter() {
                    buf[c] = v;
                }
            }
        }
    }

    /// Invoke `f(col, value)` for every stored non-zero of row `r`, in
    /// column order.
    #[inline]
    pub fn for_each_in_row(&self, r: usize, mut f: impl FnMut(usize, f64)) {
        match &self.data {
            BlockData::Empty => {}
            BlockData::Dense(d) => {
                for (c, &v) in d.row(r).iter().enumerate() {
                    if v != 0.0 {
                        f(c, v);
                    }
                }
            }
            BlockData::Sparse(s) => {
                for (c, v) in s.row(r).iter() {
                    f(c, v);
                }
            }
        }
    }

    /// The number of stored non-zeros in row `r` (dense rows count their
    /// non-zero cells).
    pub fn row_nnz(&self, r: usize) -> usize {
        match &self.data {
            BlockData::Empty => 0,
            BlockData::Dense(d) => d.row(r).iter().filter(|&&v| v != 0.0).count(),
            BlockData::Sparse(s) => s.row(r).len(),
        }
    }
}
