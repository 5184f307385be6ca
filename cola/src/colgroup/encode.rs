/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Exact direct encoders: build a column group of a named variant from an
//! uncompressed block.
//!
//! There is no planning here — the caller picks the encoding, the encoder
//! interns the distinct tuples it finds and produces a lossless group.
//! Squash, re-expansion and the test suites are the main consumers.

use cola_block::MatrixBlock;
use hashbrown::HashMap;

use super::codes::CodeMap;
use super::{
    ColGroup, ColGroupConst, ColGroupDdc, ColGroupEmpty, ColGroupOle, ColGroupRle, ColGroupSdc,
    ColGroupUncompressed,
};
use crate::dictionary::Dictionary;

/// Tuple interner keyed on exact bit patterns (so `-0.0` and `0.0` stay
/// distinct values and NaNs compare equal to themselves).
struct TupleInterner {
    map: HashMap<Vec<u64>, usize>,
    values: Vec<f64>,
    width: usize,
}

impl TupleInterner {
    fn new(width: usize) -> Self {
        Self {
            map: HashMap::new(),
            values: Vec::new(),
            width,
        }
    }

    fn intern(&mut self, tuple: &[f64]) -> usize {
        debug_assert_eq!(tuple.len(), self.width);
        let key: Vec<u64> = tuple.iter().map(|v| v.to_bits()).collect();
        if let Some(&k) = self.map.get(&key) {
            return k;
        }
        let k = self.map.len();
        self.map.insert(key, k);
        self.values.extend_from_slice(tuple);
        k
    }

    fn num_values(&self) -> usize {
        self.map.len()
    }

    fn into_dictionary(self) -> Dictionary {
        Dictionary::dense(self.values)
    }
}

fn read_tuple(m: &MatrixBlock, r: usize, cols: &[u32], buf: &mut [f64]) {
    for (j, &c) in cols.iter().enumerate() {
        buf[j] = m.get(r, c as usize);
    }
}

/// Encode the named columns of `m` as a DDC group. Collapses to `CONST`
/// for a single distinct tuple and to `EMPTY` for all-zero columns.
pub fn encode_ddc(m: &MatrixBlock, cols: &[u32]) -> ColGroup {
    let nrows = m.num_rows();
    let mut interner = TupleInterner::new(cols.len());
    let mut buf = vec![0.0; cols.len()];
    let mut codes = Vec::with_capacity(nrows);
    for r in 0..nrows {
        read_tuple(m, r, cols, &mut buf);
        codes.push(interner.intern(&buf));
    }
    match interner.num_values() {
        0 => ColGroup::Empty(ColGroupEmpty::new(cols.to_vec().into_boxed_slice())),
        1 => {
            if interner.values.iter().all(|&v| v == 0.0) {
                ColGroup::Empty(ColGroupEmpty::new(cols.to_vec().into_boxed_slice()))
            } else {
                ColGroup::Const(ColGroupConst::new(
                    cols.to_vec().into_boxed_slice(),
                    interner.into_dictionary(),
                ))
            }
        }
        n => ColGroup::Ddc(ColGroupDdc::new(
            cols.to_vec().into_boxed_slice(),
            interner.into_dictionary(),
            CodeMap::from_codes(&codes, n),
        )),
    }
}

/// Encode the named columns as an SDC group with the most frequent tuple
/// as the default.
pub fn encode_sdc(m: &MatrixBlock, cols: &[u32]) -> ColGroup {
    let nrows = m.num_rows();
    let mut interner = TupleInterner::new(cols.len());
    let mut buf = vec![0.0; cols.len()];
    let mut raw_codes = Vec::with_capacity(nrows);
    for r in 0..nrows {
        read_tuple(m, r, cols, &mut buf);
        raw_codes.push(interner.intern(&buf));
    }
    if interner.num_values() <= 1 {
        return encode_ddc(m, cols);
    }

    let mut freq = vec![0u32; interner.num_values()];
    for &c in &raw_codes {
        freq[c] += 1;
    }
    let default_code = (0..freq.len()).max_by_key(|&k| freq[k]).unwrap_or(0);
    let width = cols.len();
    let default: Box<[f64]> =
        interner.values[default_code * width..(default_code + 1) * width].into();

    // re-index the dictionary without the default tuple
    let mut remap = vec![usize::MAX; interner.num_values()];
    let mut dict_values = Vec::new();
    let mut next = 0usize;
    for k in 0..interner.num_values() {
        if k != default_code {
            remap[k] = next;
            dict_values.extend_from_slice(&interner.values[k * width..(k + 1) * width]);
            next += 1;
        }
    }
    let mut rows = Vec::new();
    let mut codes = Vec::new();
    for (r, &c) in raw_codes.iter().enumerate() {
        if c != default_code {
            rows.push(r as u32);
            codes.push(remap[c]);
        }
    }
    ColGroup::Sdc(ColGroupSdc::new(
        cols.to_vec().into_boxed_slice(),
        Dictionary::dense(dict_values),
        default,
        rows.into_boxed_slice(),
        CodeMap::from_codes(&codes, next),
    ))
}

/// Encode the named columns as an RLE group; all-zero tuples become the
/// implicit zero rows.
pub fn encode_rle(m: &MatrixBlock, cols: &[u32]) -> ColGroup {
    let (raw_codes, interner) = nonzero_codes(m, cols);
    if interner.num_values() == 0 {
        return ColGroup::Empty(ColGroupEmpty::new(cols.to_vec().into_boxed_slice()));
    }
    let nv = interner.num_values();
    let mut runs_per_value: Vec<Vec<u32>> = vec![Vec::new(); nv];
    let mut r = 0usize;
    while r < raw_codes.len() {
        match raw_codes[r] {
            Some(k) => {
                let start = r;
                while r < raw_codes.len() && raw_codes[r] == Some(k) {
                    r += 1;
                }
                runs_per_value[k].push(start as u32);
                runs_per_value[k].push((r - start) as u32);
            }
            None => r += 1,
        }
    }
    let mut ptr = Vec::with_capacity(nv + 1);
    let mut runs = Vec::new();
    ptr.push(0u32);
    for value_runs in &runs_per_value {
        runs.extend_from_slice(value_runs);
        ptr.push((runs.len() / 2) as u32);
    }
    ColGroup::Rle(ColGroupRle::new(
        cols.to_vec().into_boxed_slice(),
        interner.into_dictionary(),
        ptr.into_boxed_slice(),
        runs.into_boxed_slice(),
    ))
}

/// Encode the named columns as an OLE group; all-zero tuples become the
/// implicit zero rows.
pub fn encode_ole(m: &MatrixBlock, cols: &[u32]) -> ColGroup {
    let (raw_codes, interner) = nonzero_codes(m, cols);
    if interner.num_values() == 0 {
        return ColGroup::Empty(ColGroupEmpty::new(cols.to_vec().into_boxed_slice()));
    }
    let nv = interner.num_values();
    let mut offsets_per_value: Vec<Vec<u32>> = vec![Vec::new(); nv];
    for (r, code) in raw_codes.iter().enumerate() {
        if let Some(k) = code {
            offsets_per_value[*k].push(r as u32);
        }
    }
    let mut ptr = Vec::with_capacity(nv + 1);
    let mut offsets = Vec::new();
    ptr.push(0u32);
    for value_offsets in &offsets_per_value {
        offsets.extend_from_slice(value_offsets);
        ptr.push(offsets.len() as u32);
    }
    ColGroup::Ole(ColGroupOle::new(
        cols.to_vec().into_boxed_slice(),
        interner.into_dictionary(),
        ptr.into_boxed_slice(),
        offsets.into_boxed_slice(),
    ))
}

/// Wrap the named columns as an uncompressed group.
pub fn encode_uncompressed(m: &MatrixBlock, cols: &[u32]) -> ColGroup {
    let nrows = m.num_rows();
    let mut values = vec![0.0; nrows * cols.len()];
    for r in 0..nrows {
        for (j, &c) in cols.iter().enumerate() {
            values[r * cols.len() + j] = m.get(r, c as usize);
        }
    }
    let mut data = MatrixBlock::from_dense(nrows, cols.len(), values);
    data.exam_sparsity();
    ColGroup::Uncompressed(ColGroupUncompressed::new(
        cols.to_vec().into_boxed_slice(),
        data,
    ))
}

/// Per-row codes over the non-zero tuples (`None` marks the all-zero
/// tuple).
fn nonzero_codes(m: &MatrixBlock, cols: &[u32]) -> (Vec<Option<usize>>, TupleInterner) {
    let nrows = m.num_rows();
    let mut interner = TupleInterner::new(cols.len());
    let mut buf = vec![0.0; cols.len()];
    let mut raw_codes = Vec::with_capacity(nrows);
    for r in 0..nrows {
        read_tuple(m, r, cols, &mut buf);
        if buf.iter().all(|&v| v == 0.0) {
            raw_codes.push(None);
        } else {
            raw_codes.push(Some(interner.intern(&buf)));
        }
    }
    (raw_codes, interner)
}
