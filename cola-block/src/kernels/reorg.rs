/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Reorganization kernels: transpose, slice, append, remove-empty,
//! re-expand and zero-out.

use crate::block::MatrixBlock;
use crate::error::{BlockError, BlockResult};

/// Out-of-place transpose.
pub fn transpose(m: &MatrixBlock) -> MatrixBlock {
    let (rows, cols) = (m.num_rows(), m.num_cols());
    if m.is_empty() {
        return MatrixBlock::zeros(cols, rows);
    }
    let mut out = MatrixBlock::new(cols, rows, false);
    {
        let values = out.allocate_dense();
        for r in 0..rows {
            m.for_each_in_row(r, |c, v| {
                values[c * rows + r] = v;
            });
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    out
}

/// Transpose without reallocating when the block is a vector (the
/// row-major payload of a `n x 1` and a `1 x n` block is identical);
/// otherwise falls back to the out-of-place kernel.
pub fn transpose_in_place(m: &mut MatrixBlock) {
    if m.is_vector() {
        let (rows, cols) = (m.num_rows(), m.num_cols());
        let mut swapped = std::mem::replace(m, MatrixBlock::zeros(0, 0));
        // Re-wrap the same cells under the swapped shape.
        swapped = match swapped.dense_values() {
            Some(values) => MatrixBlock::from_dense(cols, rows, values.to_vec()),
            None => transpose(&swapped),
        };
        *m = swapped;
    } else {
        *m = transpose(m);
    }
}

fn check_range(op: &'static str, lo: usize, hi: usize, extent: usize) -> BlockResult<()> {
    if lo >= hi || hi > extent {
        return Err(BlockError::InvalidRange {
            op,
            lo,
            hi,
            extent,
        });
    }
    Ok(())
}

/// Copy the sub-block `rows [rl, ru) x cols [cl, cu)`.
pub fn slice(
    m: &MatrixBlock,
    rl: usize,
    ru: usize,
    cl: usize,
    cu: usize,
) -> BlockResult<MatrixBlock> {
    check_range("slice rows", rl, ru, m.num_rows())?;
    check_range("slice cols", cl, cu, m.num_cols())?;
    let (rows, cols) = (ru - rl, cu - cl);
    let mut out = MatrixBlock::new(rows, cols, false);
    {
        let values = out.allocate_dense();
        for r in rl..ru {
            m.for_each_in_row(r, |c, v| {
                if c >= cl && c < cu {
                    values[(r - rl) * cols + (c - cl)] = v;
                }
            });
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}

/// Concatenate two blocks, column-wise (`cbind`) or row-wise.
pub fn append(l: &MatrixBlock, r: &MatrixBlock, cbind: bool) -> BlockResult<MatrixBlock> {
    if cbind && l.num_rows() != r.num_rows() || !cbind && l.num_cols() != r.num_cols() {
        return Err(BlockError::DimensionMismatch {
            op: if cbind { "append cbind" } else { "append rbind" },
            left: (l.num_rows(), l.num_cols()),
            right: (r.num_rows(), r.num_cols()),
        });
    }
    let (rows, cols) = if cbind {
        (l.num_rows(), l.num_cols() + r.num_cols())
    } else {
        (l.num_rows() + r.num_rows(), l.num_cols())
    };
    let mut out = MatrixBlock::new(rows, cols, false);
    {
        let values = out.allocate_dense();
        for row in 0..l.num_rows() {
            l.for_each_in_row(row, |c, v| values[row * cols + c] = v);
        }
        let (row_off, col_off) = if cbind { (0, l.num_cols()) } else { (l.num_rows(), 0) };
        for row in 0..r.num_rows() {
            r.for_each_in_row(row, |c, v| {
                values[(row + row_off) * cols + (c + col_off)] = v;
            });
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}

/// Remove all-zero rows (or columns). `select`, when present, is a 0/1
/// vector naming which rows (columns) to keep instead.
pub fn remove_empty(
    m: &MatrixBlock,
    rows: bool,
    select: Option<&MatrixBlock>,
) -> BlockResult<MatrixBlock> {
    let extent = if rows { m.num_rows() } else { m.num_cols() };
    if let Some(sel) = select {
        if sel.num_rows() * sel.num_cols() != extent {
            return Err(BlockError::DimensionMismatch {
                op: "remove_empty select",
                left: (m.num_rows(), m.num_cols()),
                right: (sel.num_rows(), sel.num_cols()),
            });
        }
    }
    let keep: Vec<usize> = (0..extent)
        .filter(|&i| match select {
            Some(sel) => {
                let v = if sel.num_rows() == 1 { sel.get(0, i) } else { sel.get(i, 0) };
                v != 0.0
            }
            None => {
                if rows {
                    m.row_nnz(i) > 0
                } else {
                    (0..m.num_rows()).any(|r| m.get(r, i) != 0.0)
                }
            }
        })
        .collect();

    // An entirely empty selection keeps a single zero row/column so the
    // result stays a valid matrix.
    let kept = keep.len().max(1);
    let (out_rows, out_cols) = if rows { (kept, m.num_cols()) } else { (m.num_rows(), kept) };
    let mut out = MatrixBlock::new(out_rows, out_cols, false);
    {
        let values = out.allocate_dense();
        for (new_i, &old_i) in keep.iter().enumerate() {
            if rows {
                m.for_each_in_row(old_i, |c, v| values[new_i * out_cols + c] = v);
            } else {
                for r in 0..m.num_rows() {
                    values[r * out_cols + new_i] = m.get(r, old_i);
                }
            }
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}

/// Expand a column vector of category codes into a one-hot matrix with
/// `max` columns.
///
/// Values are floored when `cast` is set and must land in `[1, max]`;
/// out-of-range or fractional values are skipped when `ignore` is set and
/// rejected otherwise.
pub fn rexpand(m: &MatrixBlock, max: usize, cast: bool, ignore: bool) -> BlockResult<MatrixBlock> {
    if m.num_cols() != 1 {
        return Err(BlockError::NotAColumnVector {
            op: "rexpand",
            rows: m.num_rows(),
            cols: m.num_cols(),
        });
    }
    let rows = m.num_rows();
    let mut out = MatrixBlock::new(rows, max, true);
    for r in 0..rows {
        let raw = m.get(r, 0);
        let v = if cast { raw.floor() } else { raw };
        if !v.is_finite() || v != v.trunc() || v < 1.0 || v > max as f64 {
            if ignore {
                continue;
            }
            return Err(BlockError::InvalidValue {
                op: "rexpand",
                value: raw,
            });
        }
        out.set(r, v as usize - 1, 1.0);
    }
    out.exam_sparsity();
    Ok(out)
}

/// Zero the cells inside `rows [rl, ru) x cols [cl, cu)` — or everything
/// outside it when `complement` is set.
pub fn zero_out(
    m: &MatrixBlock,
    rl: usize,
    ru: usize,
    cl: usize,
    cu: usize,
    complement: bool,
) -> BlockResult<MatrixBlock> {
    check_range("zero_out rows", rl, ru, m.num_rows())?;
    check_range("zero_out cols", cl, cu, m.num_cols())?;
    let (rows, cols) = (m.num_rows(), m.num_cols());
    let mut out = MatrixBlock::new(rows, cols, false);
    {
        let values = out.allocate_dense();
        for r in 0..rows {
            m.for_each_in_row(r, |c, v| {
                let inside = r >= rl && r < ru && c >= cl && c < cu;
                if inside == complement {
                    values[r * cols + c] = v;
                }
            });
        }
    }
    out.recompute_nnz();
    out.exam_sparsity();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatrixBlock {
        MatrixBlock::from_rows(&[&[1.0, 2.0, 0.0], &[0.0, 0.0, 0.0], &[3.0, 0.0, 4.0]])
    }

    #[test]
    fn transpose_round_trip() {
        let m = sample();
        let t = transpose(&m);
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.get(1, 0), 2.0);
        assert_eq!(t.get(2, 2), 4.0);
        let back = transpose(&t);
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(back.get(r, c), m.get(r, c));
            }
        }
    }

    #[test]
    fn transpose_in_place_vector_swaps_shape() {
        let mut v = MatrixBlock::column_vector(vec![1.0, 2.0, 3.0]);
        transpose_in_place(&mut v);
        assert_eq!((v.num_rows(), v.num_cols()), (1, 3));
        assert_eq!(v.get(0, 2), 3.0);
    }

    #[test]
    fn slice_extracts_sub_block() {
        let s = slice(&sample(), 0, 2, 1, 3).unwrap();
        assert_eq!((s.num_rows(), s.num_cols()), (2, 2));
        assert_eq!(s.get(0, 0), 2.0);
        assert_eq!(s.get(1, 1), 0.0);

        assert!(slice(&sample(), 0, 4, 0, 1).is_err());
        assert!(slice(&sample(), 2, 2, 0, 1).is_err());
    }

    #[test]
    fn append_cbind_and_rbind() {
        let l = MatrixBlock::from_rows(&[&[1.0], &[2.0]]);
        let r = MatrixBlock::from_rows(&[&[3.0], &[4.0]]);
        let c = append(&l, &r, true).unwrap();
        assert_eq!((c.num_rows(), c.num_cols()), (2, 2));
        assert_eq!(c.get(0, 1), 3.0);

        let v = append(&l, &r, false).unwrap();
        assert_eq!((v.num_rows(), v.num_cols()), (4, 1));
        assert_eq!(v.get(3, 0), 4.0);

        assert!(append(&l, &MatrixBlock::zeros(3, 1), true).is_err());
    }

    #[test]
    fn remove_empty_rows_drops_zero_rows() {
        let out = remove_empty(&sample(), true, None).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.get(1, 0), 3.0);
    }

    #[test]
    fn remove_empty_with_select() {
        let sel = MatrixBlock::column_vector(vec![0.0, 1.0, 1.0]);
        let out = remove_empty(&sample(), true, Some(&sel)).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.get(0, 0), 0.0);
        assert_eq!(out.get(1, 2), 4.0);
    }

    #[test]
    fn rexpand_one_hot() {
        let v = MatrixBlock::column_vector(vec![1.0, 3.0, 2.0]);
        let out = rexpand(&v, 3, false, false).unwrap();
        assert_eq!(out.get(0, 0), 1.0);
        assert_eq!(out.get(1, 2), 1.0);
        assert_eq!(out.get(2, 1), 1.0);
        assert_eq!(out.nnz(), 3);
    }

    #[test]
    fn rexpand_ignores_or_rejects_out_of_range() {
        let v = MatrixBlock::column_vector(vec![1.0, 5.0, 0.0, 2.5]);
        let out = rexpand(&v, 3, false, true).unwrap();
        assert_eq!(out.nnz(), 1);
        assert!(rexpand(&v, 3, false, false).is_err());

        // cast floors fractional codes into range
        let out = rexpand(&MatrixBlock::column_vector(vec![2.5]), 3, true, false).unwrap();
        assert_eq!(out.get(0, 1), 1.0);
    }

    #[test]
    fn zero_out_region_and_complement() {
        let out = zero_out(&sample(), 0, 1, 0, 3, false).unwrap();
        assert_eq!(out.get(0, 0), 0.0);
        assert_eq!(out.get(2, 0), 3.0);

        let out = zero_out(&sample(), 0, 1, 0, 3, true).unwrap();
        assert_eq!(out.get(0, 0), 1.0);
        assert_eq!(out.get(2, 0), 0.0);
    }
}
