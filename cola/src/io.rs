/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Size-adaptive serialization of compressed matrices.
//!
//! Layout (little endian):
//! - `u32 rows`, `u32 cols`
//! - `i64 nnz` (−1 when unknown)
//! - `u8 overlapping`
//! - `u32 group_count`, then each group (see [`crate::colgroup`])
//!
//! When the compressed form would be larger on disk than the uncompressed
//! estimate, the writer decompresses once, swaps the group list for a
//! single uncompressed group, and writes that instead. The reader accepts
//! either layout.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cola_block::io::estimate_dense_disk_size;
use tracing::debug;

use crate::colgroup::{ColGroup, ColGroupUncompressed};
use crate::error::CompressionResult;
use crate::matrix::CompressedMatrix;

/// Fixed header bytes: rows, cols, nnz, overlapping flag, group count.
pub const HEADER_BYTES: u64 = 4 + 4 + 8 + 1 + 4;

/// The exact bytes [`write_matrix`] would emit for the current group list
/// (before any dense fallback).
pub fn compressed_disk_size(m: &CompressedMatrix) -> u64 {
    HEADER_BYTES + m.col_groups().iter().map(ColGroup::disk_size).sum::<u64>()
}

/// Write `m`, falling back to a single embedded uncompressed group when
/// that is smaller. Returns the number of bytes written.
pub fn write_matrix(m: &mut CompressedMatrix, w: &mut impl Write) -> CompressionResult<u64> {
    let compressed_size = compressed_disk_size(m);
    let dense_size =
        HEADER_BYTES + estimate_dense_disk_size(m.num_rows(), m.num_cols(), m.nnz());
    if compressed_size > dense_size {
        debug!(
            compressed_size,
            dense_size, "compressed form is larger on disk, storing uncompressed"
        );
        let mut uncompressed = (*m.get_uncompressed("smaller serialization", 1)).clone();
        uncompressed.exam_sparsity();
        let nnz = uncompressed.nnz();
        m.allocate_col_group(ColGroup::Uncompressed(ColGroupUncompressed::spanning(
            uncompressed,
        )));
        m.set_overlapping(false);
        m.set_nnz(Some(nnz));
        // the single group now is the decompressed version
        m.clear_cached_decompressed();
    }

    w.write_u32::<LittleEndian>(m.num_rows() as u32)?;
    w.write_u32::<LittleEndian>(m.num_cols() as u32)?;
    w.write_i64::<LittleEndian>(m.nnz().map_or(-1, |n| n as i64))?;
    w.write_u8(u8::from(m.is_overlapping()))?;
    w.write_u32::<LittleEndian>(m.col_groups().len() as u32)?;
    let mut written = HEADER_BYTES;
    for g in m.col_groups() {
        written += g.write(w)?;
    }
    Ok(written)
}

/// Read a matrix written by [`write_matrix`].
pub fn read_matrix(r: &mut impl Read) -> CompressionResult<CompressedMatrix> {
    let rows = r.read_u32::<LittleEndian>()? as usize;
    let cols = r.read_u32::<LittleEndian>()? as usize;
    let nnz = r.read_i64::<LittleEndian>()?;
    let overlapping = r.read_u8()? != 0;
    let count = r.read_u32::<LittleEndian>()? as usize;
    let mut groups = Vec::with_capacity(count);
    for _ in 0..count {
        groups.push(ColGroup::read(r)?);
    }
    let mut m = CompressedMatrix::from_parts(rows, cols, groups, overlapping);
    if nnz >= 0 {
        m.set_nnz(Some(nnz as u64));
    } else {
        m.set_nnz(None);
    }
    Ok(m)
}
