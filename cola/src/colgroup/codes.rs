/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Per-row value-index storage.
//!
//! The map picks the narrowest whole-byte width that can hold the
//! dictionary size, so a group over a two-value dictionary pays one byte
//! per row rather than four.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const TAG_U8: u8 = 0;
const TAG_U16: u8 = 1;
const TAG_U32: u8 = 2;

/// Row-to-value-index assignments with width-adaptive backing storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeMap {
    U8(Box<[u8]>),
    U16(Box<[u16]>),
    U32(Box<[u32]>),
}

impl CodeMap {
    /// Build a map for `codes` into a dictionary of `num_values` tuples.
    ///
    /// # Panics
    ///
    /// Panics if any code is `>= num_values`.
    pub fn from_codes(codes: &[usize], num_values: usize) -> Self {
        if let Some(&bad) = codes.iter().find(|&&c| c >= num_values) {
            panic!("code {bad} out of range for a dictionary of {num_values} tuples");
        }
        if num_values <= usize::from(u8::MAX) + 1 {
            CodeMap::U8(codes.iter().map(|&c| c as u8).collect())
        } else if num_values <= usize::from(u16::MAX) + 1 {
            CodeMap::U16(codes.iter().map(|&c| c as u16).collect())
        } else {
            CodeMap::U32(codes.iter().map(|&c| c as u32).collect())
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> usize {
        match self {
            CodeMap::U8(c) => c[i] as usize,
            CodeMap::U16(c) => c[i] as usize,
            CodeMap::U32(c) => c[i] as usize,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CodeMap::U8(c) => c.len(),
            CodeMap::U16(c) => c.len(),
            CodeMap::U32(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Occurrences of each value index.
    pub fn counts(&self, num_values: usize) -> Box<[u32]> {
        let mut counts = vec![0u32; num_values];
        for c in self.iter() {
            counts[c] += 1;
        }
        counts.into_boxed_slice()
    }

    /// Bytes per stored code.
    pub fn width_bytes(&self) -> usize {
        match self {
            CodeMap::U8(_) => 1,
            CodeMap::U16(_) => 2,
            CodeMap::U32(_) => 4,
        }
    }

    pub fn write(&self, w: &mut impl Write) -> std::io::Result<u64> {
        let (tag, len) = match self {
            CodeMap::U8(c) => (TAG_U8, c.len()),
            CodeMap::U16(c) => (TAG_U16, c.len()),
            CodeMap::U32(c) => (TAG_U32, c.len()),
        };
        w.write_u8(tag)?;
        w.write_u32::<LittleEndian>(len as u32)?;
        match self {
            CodeMap::U8(c) => {
                w.write_all(c)?;
            }
            CodeMap::U16(c) => {
                for &v in c.iter() {
                    w.write_u16::<LittleEndian>(v)?;
                }
            }
            CodeMap::U32(c) => {
                for &v in c.iter() {
                    w.write_u32::<LittleEndian>(v)?;
                }
            }
        }
        Ok(self.disk_size())
    }

    pub fn read(r: &mut impl Read) -> std::io::Result<CodeMap> {
        let tag = r.read_u8()?;
        let len = r.read_u32::<LittleEndian>()? as usize;
        Ok(match tag {
            TAG_U8 => {
                let mut buf = vec![0u8; len];
                r.read_exact(&mut buf)?;
                CodeMap::U8(buf.into_boxed_slice())
            }
            TAG_U16 => {
                let mut buf = vec![0u16; len];
                for v in buf.iter_mut() {
                    *v = r.read_u16::<LittleEndian>()?;
                }
                CodeMap::U16(buf.into_boxed_slice())
            }
            TAG_U32 => {
                let mut buf = vec![0u32; len];
                for v in buf.iter_mut() {
                    *v = r.read_u32::<LittleEndian>()?;
                }
                CodeMap::U32(buf.into_boxed_slice())
            }
            other => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown code map tag {other}"),
                ));
            }
        })
    }

    pub fn disk_size(&self) -> u64 {
        1 + 4 + (self.len() * self.width_bytes()) as u64
    }

    pub fn in_memory_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.len() * self.width_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_narrowest_width() {
        assert_eq!(CodeMap::from_codes(&[0, 1, 0], 2).width_bytes(), 1);
        assert_eq!(CodeMap::from_codes(&[0, 255], 256).width_bytes(), 1);
        assert_eq!(CodeMap::from_codes(&[0, 256], 257).width_bytes(), 2);
        assert_eq!(CodeMap::from_codes(&[0, 70_000], 70_001).width_bytes(), 4);
    }

    #[test]
    fn get_iter_counts() {
        let m = CodeMap::from_codes(&[1, 0, 1, 1], 2);
        assert_eq!(m.len(), 4);
        assert_eq!(m.get(2), 1);
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![1, 0, 1, 1]);
        assert_eq!(&*m.counts(2), &[1, 3]);
    }

    #[test]
    #[should_panic(expected = "code 2 out of range")]
    fn rejects_out_of_range_codes() {
        CodeMap::from_codes(&[0, 2], 2);
    }

    #[test]
    fn round_trips_all_widths() {
        for (codes, nv) in [
            (vec![0usize, 1, 1, 0], 2usize),
            (vec![300, 0, 299], 301),
            (vec![70_000, 1], 70_001),
        ] {
            let m = CodeMap::from_codes(&codes, nv);
            let mut buf = Vec::new();
            let written = m.write(&mut buf).unwrap();
            assert_eq!(written, buf.len() as u64);
            let loaded = CodeMap::read(&mut std::io::Cursor::new(&buf)).unwrap();
            assert_eq!(loaded, m);
        }
    }
}
