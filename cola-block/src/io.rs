/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Binary serialization of uncompressed blocks.
//!
//! Layout (little endian):
//! - `u32 rows`, `u32 cols`, `i64 nnz`
//! - `u8 layout` (0 empty, 1 dense, 2 sparse)
//! - dense payload: `rows * cols` `f64` cells in row-major order
//! - sparse payload: per row, `u32 count` then `count` pairs of
//!   `(u32 col, f64 value)`

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::block::{BlockData, MatrixBlock};

const LAYOUT_EMPTY: u8 = 0;
const LAYOUT_DENSE: u8 = 1;
const LAYOUT_SPARSE: u8 = 2;

/// Fixed header bytes: rows, cols, nnz, layout tag.
pub const HEADER_BYTES: u64 = 4 + 4 + 8 + 1;

/// Write `m` in the binary block format. Returns the number of bytes
/// written.
pub fn write_block(m: &MatrixBlock, w: &mut impl Write) -> std::io::Result<u64> {
    w.write_u32::<LittleEndian>(m.num_rows() as u32)?;
    w.write_u32::<LittleEndian>(m.num_cols() as u32)?;
    w.write_i64::<LittleEndian>(m.nnz() as i64)?;
    let mut written = HEADER_BYTES;
    match m.data() {
        BlockData::Empty => {
            w.write_u8(LAYOUT_EMPTY)?;
        }
        BlockData::Dense(d) => {
            w.write_u8(LAYOUT_DENSE)?;
            for &v in d.values() {
                w.write_f64::<LittleEndian>(v)?;
            }
            written += 8 * d.values().len() as u64;
        }
        BlockData::Sparse(s) => {
            w.write_u8(LAYOUT_SPARSE)?;
            for r in 0..m.num_rows() {
                let row = s.row(r);
                w.write_u32::<LittleEndian>(row.len() as u32)?;
                written += 4;
                for (c, v) in row.iter() {
                    w.write_u32::<LittleEndian>(c as u32)?;
                    w.write_f64::<LittleEndian>(v)?;
                    written += 12;
                }
            }
        }
    }
    Ok(written)
}

/// Read a block previously written by [`write_block`].
pub fn read_block(r: &mut impl Read) -> std::io::Result<MatrixBlock> {
    let rows = r.read_u32::<LittleEndian>()? as usize;
    let cols = r.read_u32::<LittleEndian>()? as usize;
    let _nnz = r.read_i64::<LittleEndian>()?;
    let layout = r.read_u8()?;
    let mut out = match layout {
        LAYOUT_EMPTY => MatrixBlock::zeros(rows, cols),
        LAYOUT_DENSE => {
            let mut values = vec![0.0; rows * cols];
            for v in values.iter_mut() {
                *v = r.read_f64::<LittleEndian>()?;
            }
            MatrixBlock::from_dense(rows, cols, values)
        }
        LAYOUT_SPARSE => {
            let mut out = MatrixBlock::new(rows, cols, true);
            for row in 0..rows {
                let count = r.read_u32::<LittleEndian>()? as usize;
                for _ in 0..count {
                    let c = r.read_u32::<LittleEndian>()? as usize;
                    let v = r.read_f64::<LittleEndian>()?;
                    out.set(row, c, v);
                }
            }
            out
        }
        other => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown block layout tag {other}"),
            ));
        }
    };
    out.recompute_nnz();
    Ok(out)
}

/// The exact size [`write_block`] will produce for `m` in its current
/// layout.
pub fn block_disk_size(m: &MatrixBlock) -> u64 {
    match m.data() {
        BlockData::Empty => HEADER_BYTES,
        BlockData::Dense(_) => HEADER_BYTES + 8 * (m.num_rows() * m.num_cols()) as u64,
        BlockData::Sparse(_) => HEADER_BYTES + 4 * m.num_rows() as u64 + 12 * m.nnz(),
    }
}

/// An upper bound on the bytes an uncompressed block of the given shape
/// takes on disk: the cheaper of the dense and sparse layouts for `nnz`
/// stored cells (an unknown `nnz` assumes fully dense).
pub fn estimate_dense_disk_size(rows: usize, cols: usize, nnz: Option<u64>) -> u64 {
    let dense = 8 * (rows * cols) as u64;
    let sparse = nnz.map(|n| 4 * rows as u64 + 12 * n);
    HEADER_BYTES + sparse.map_or(dense, |s| s.min(dense))
}
