/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! One-hot re-expansion of a single-column matrix.
//!
//! A dictionary-coded input column re-expands without touching the row
//! assignment: each distinct value maps to a one-hot tuple over the `max`
//! output columns, stored as a sparse block dictionary. Other shapes
//! decompress and use the dense kernel.

use cola_block::MatrixBlock;
use tracing::debug;

use crate::colgroup::{ColGroup, ColGroupConst, ColGroupDdc, ColGroupEmpty};
use crate::dictionary::Dictionary;
use crate::error::{CompressionError, CompressionResult};
use crate::matrix::{AnyMatrix, CompressedMatrix};

/// Map a category value to its output column.
fn code_col(
    v: f64,
    max: usize,
    cast: bool,
    ignore: bool,
) -> CompressionResult<Option<usize>> {
    let v = if cast { v.floor() } else { v };
    if v.is_finite() && v == v.trunc() && v >= 1.0 && v <= max as f64 {
        Ok(Some(v as usize - 1))
    } else if ignore {
        Ok(None)
    } else {
        Err(CompressionError::InvalidArgument {
            op: "reexpand",
            detail: format!("category value {v} outside [1, {max}]"),
        })
    }
}

/// Build the one-hot dictionary for the distinct values of `dict`.
fn one_hot_dictionary(
    dict: &Dictionary,
    max: usize,
    cast: bool,
    ignore: bool,
) -> CompressionResult<Dictionary> {
    let nv = dict.num_values(1);
    let mut block = MatrixBlock::new(nv, max, true);
    for k in 0..nv {
        if let Some(col) = code_col(dict.tuple_cell(k, 0, 1), max, cast, ignore)? {
            block.set(k, col, 1.0);
        }
    }
    Ok(Dictionary::from_block(block))
}

pub fn reexpand(
    m: &CompressedMatrix,
    max: usize,
    cast: bool,
    ignore: bool,
    k: usize,
) -> CompressionResult<AnyMatrix> {
    if max == 0 {
        return Err(CompressionError::InvalidArgument {
            op: "reexpand",
            detail: "output width must be positive".into(),
        });
    }
    if m.num_cols() == 1 && !m.is_overlapping() {
        let cols: Vec<u32> = (0..max as u32).collect();
        match &m.col_groups()[0] {
            ColGroup::Ddc(g) => {
                let dict = one_hot_dictionary(&g.dict, max, cast, ignore)?;
                let out = ColGroup::Ddc(ColGroupDdc::new(
                    cols.into_boxed_slice(),
                    dict,
                    g.codes.clone(),
                ));
                return Ok(AnyMatrix::Compressed(CompressedMatrix::from_parts(
                    m.num_rows(),
                    max,
                    vec![out],
                    false,
                )));
            }
            ColGroup::Const(g) => {
                let dict = one_hot_dictionary(&g.dict, max, cast, ignore)?;
                let out = if dict.nnz_weighted(&[1], max) == 0 {
                    ColGroup::Empty(ColGroupEmpty::new(cols.into_boxed_slice()))
                } else {
                    ColGroup::Const(ColGroupConst::new(cols.into_boxed_slice(), dict))
                };
                return Ok(AnyMatrix::Compressed(CompressedMatrix::from_parts(
                    m.num_rows(),
                    max,
                    vec![out],
                    false,
                )));
            }
            ColGroup::Empty(_) => {
                // every category is zero, which is out of range
                return if ignore {
                    Ok(AnyMatrix::Compressed(CompressedMatrix::empty(
                        m.num_rows(),
                        max,
                    )))
                } else {
                    Err(CompressionError::InvalidArgument {
                        op: "reexpand",
                        detail: format!("category value 0 outside [1, {max}]"),
                    })
                };
            }
            _ => {}
        }
    }

    debug!("reexpand falling back to the dense kernel");
    let dense = m.get_uncompressed("reexpand", k);
    Ok(AnyMatrix::Dense(dense.rexpand(max, cast, ignore)?))
}
