/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Index lists
//!
//! An index list maps a pair of many-body states `(row, col)` onto the operator
//! number `magnitude` whose matrix element couples them, together with the
//! phase picked up from reordering fermion operators.
//!
//! Two file forms exist:
//!
//! * text, one `"%d %d %c%d"` line per triple, e.g. `3 0 -12`
//! * binary, verbatim `{i32 i; i32 j; i32 k}` records in native byte order with
//!   the phase packed into the most significant bit of `k`
//!
//! In memory the phase is always an explicit [`Sign`].

use super::{
    create_writer, finish_writer, open_reader, read_exact, try_zeroed, write_all, Result,
    StorageError,
};
use bytemuck::{Pod, Zeroable};
use std::io::BufRead;
use std::path::Path;

const SIGN_BIT: u32 = 1 << 31;

/// Phase of an index triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Pos,
    Neg,
}

impl Sign {
    /// `+1.0` or `-1.0`
    #[inline]
    pub fn factor(self) -> f64 {
        match self {
            Sign::Pos => 1.0,
            Sign::Neg => -1.0,
        }
    }

    /// Combined phase of two triples
    #[inline]
    pub fn combine(self, other: Sign) -> Sign {
        if self == other {
            Sign::Pos
        } else {
            Sign::Neg
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Sign::Pos => '+',
            Sign::Neg => '-',
        }
    }
}

/// One `(row, col, ±magnitude)` entry of an index list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexTriple {
    pub row: u32,
    pub col: u32,
    pub magnitude: u32,
    pub sign: Sign,
}

impl IndexTriple {
    pub fn new(row: u32, col: u32, magnitude: u32, sign: Sign) -> Self {
        Self {
            row,
            col,
            magnitude,
            sign,
        }
    }

    fn pack(&self, path: &Path) -> Result<PackedTriple> {
        let limit = i32::MAX as u32;
        if self.row > limit || self.col > limit || self.magnitude > limit {
            return Err(StorageError::malformed(
                path,
                format!("triple {:?} does not fit the packed 32-bit layout", self),
            ));
        }
        let k = match self.sign {
            Sign::Pos => self.magnitude,
            Sign::Neg => self.magnitude | SIGN_BIT,
        };
        Ok(PackedTriple {
            i: self.row as i32,
            j: self.col as i32,
            k: k as i32,
        })
    }
}

/// Binary record as it appears on disk
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PackedTriple {
    i: i32,
    j: i32,
    k: i32,
}

impl PackedTriple {
    fn unpack(self, position: usize, path: &Path) -> Result<IndexTriple> {
        if self.i < 0 || self.j < 0 {
            return Err(StorageError::malformed(
                path,
                format!("record {} has negative state index ({}, {})", position, self.i, self.j),
            ));
        }
        let k = self.k as u32;
        let sign = if k & SIGN_BIT != 0 { Sign::Neg } else { Sign::Pos };
        Ok(IndexTriple {
            row: self.i as u32,
            col: self.j as u32,
            magnitude: k & !SIGN_BIT,
            sign,
        })
    }
}

/// Ordered, immutable list of index triples
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexList {
    triples: Vec<IndexTriple>,
}

impl IndexList {
    pub fn new(triples: Vec<IndexTriple>) -> Self {
        Self { triples }
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn as_slice(&self) -> &[IndexTriple] {
        &self.triples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexTriple> {
        self.triples.iter()
    }

    /// Resident size of a list with `len` triples
    pub fn payload_bytes(len: usize) -> usize {
        len * std::mem::size_of::<IndexTriple>()
    }

    pub fn byte_size(&self) -> usize {
        Self::payload_bytes(self.triples.len())
    }

    /// Number of triples stored in a binary list file, without loading it
    pub fn binary_len(path: &Path) -> Result<usize> {
        let metadata = std::fs::metadata(path).map_err(|source| StorageError::MissingFile {
            operation: "stat index list",
            path: path.to_path_buf(),
            source,
        })?;
        let record = std::mem::size_of::<PackedTriple>() as u64;
        if metadata.len() % record != 0 {
            return Err(StorageError::malformed(
                path,
                format!("size {} is not a multiple of {}", metadata.len(), record),
            ));
        }
        Ok((metadata.len() / record) as usize)
    }

    /// Read a binary index list
    pub fn read_binary(path: &Path) -> Result<Self> {
        const OP: &str = "read index list";
        let len = Self::binary_len(path)?;
        let mut reader = open_reader(path, OP)?;
        let mut packed = try_zeroed::<PackedTriple>(len, path)?;
        read_exact(&mut reader, bytemuck::cast_slice_mut(&mut packed), path, OP)?;

        let mut builder = IndexListBuilder::with_capacity(len);
        for (position, record) in packed.into_iter().enumerate() {
            builder.push(record.unpack(position, path)?);
        }
        Ok(builder.finish())
    }

    /// Write the list in the packed binary form
    pub fn write_binary(&self, path: &Path) -> Result<()> {
        const OP: &str = "write index list";
        let packed = self
            .triples
            .iter()
            .map(|triple| triple.pack(path))
            .collect::<Result<Vec<_>>>()?;
        let mut writer = create_writer(path, OP)?;
        write_all(&mut writer, bytemuck::cast_slice(&packed), path, OP)?;
        finish_writer(writer, path, OP)
    }

    /// Read a human-readable index list
    pub fn read_text(path: &Path) -> Result<Self> {
        const OP: &str = "read index list text";
        let reader = open_reader(path, OP)?;
        let mut builder = IndexListBuilder::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| StorageError::MissingFile {
                operation: OP,
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            builder.push(parse_text_line(&line, number + 1, path)?);
        }
        Ok(builder.finish())
    }

    /// Parse the text form from a string; `origin` names the source in errors
    pub fn parse_text(text: &str, origin: &Path) -> Result<Self> {
        let mut builder = IndexListBuilder::new();
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            builder.push(parse_text_line(line, number + 1, origin)?);
        }
        Ok(builder.finish())
    }

    /// Render the text form
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.triples.len() * 12);
        for triple in &self.triples {
            text.push_str(&format!(
                "{} {} {}{}\n",
                triple.row,
                triple.col,
                triple.sign.as_char(),
                triple.magnitude
            ));
        }
        text
    }

    /// Write the text form
    pub fn write_text(&self, path: &Path) -> Result<()> {
        const OP: &str = "write index list text";
        let mut writer = create_writer(path, OP)?;
        write_all(&mut writer, self.to_text().as_bytes(), path, OP)?;
        finish_writer(writer, path, OP)
    }
}

impl<'a> IntoIterator for &'a IndexList {
    type Item = &'a IndexTriple;
    type IntoIter = std::slice::Iter<'a, IndexTriple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

fn parse_text_line(line: &str, number: usize, path: &Path) -> Result<IndexTriple> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(StorageError::malformed(
            path,
            format!("line {}: expected 3 fields, found {}", number, fields.len()),
        ));
    }

    let parse_index = |field: &str| -> Result<u32> {
        field
            .parse::<u32>()
            .ok()
            .filter(|value| *value <= i32::MAX as u32)
            .ok_or_else(|| {
                StorageError::malformed(path, format!("line {}: bad state index '{}'", number, field))
            })
    };

    let row = parse_index(fields[0])?;
    let col = parse_index(fields[1])?;

    let (sign, digits) = match fields[2].as_bytes().first() {
        Some(b'+') => (Sign::Pos, &fields[2][1..]),
        Some(b'-') => (Sign::Neg, &fields[2][1..]),
        _ => (Sign::Pos, fields[2]),
    };
    let magnitude = parse_index(digits)?;

    Ok(IndexTriple::new(row, col, magnitude, sign))
}

/// Growable list used while parsing; `finish` trims it to its final size
#[derive(Debug, Default)]
pub struct IndexListBuilder {
    triples: Vec<IndexTriple>,
}

impl IndexListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, triple: IndexTriple) {
        self.triples.push(triple);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn finish(mut self) -> IndexList {
        self.triples.shrink_to_fit();
        IndexList {
            triples: self.triples,
        }
    }
}

/// Convert a text index list into the binary form
///
/// # Returns
///
/// The number of triples written
pub fn convert_text_to_binary(input: &Path, output: &Path) -> Result<usize> {
    let list = IndexList::read_text(input)?;
    list.write_binary(output)?;
    Ok(list.len())
}

/// Convert a binary index list into the text form
pub fn convert_binary_to_text(input: &Path, output: &Path) -> Result<usize> {
    let list = IndexList::read_binary(input)?;
    list.write_text(output)?;
    Ok(list.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sign_bit_is_packed_into_k() {
        let path = Path::new("memory");
        let packed = IndexTriple::new(1, 2, 5, Sign::Neg).pack(path).unwrap();
        assert_eq!(packed.k as u32, 5 | SIGN_BIT);

        let unpacked = packed.unpack(0, path).unwrap();
        assert_eq!(unpacked.magnitude, 5);
        assert_eq!(unpacked.sign, Sign::Neg);
    }

    #[test]
    fn test_negative_zero_keeps_its_sign() {
        let path = Path::new("memory");
        let triple = IndexTriple::new(0, 0, 0, Sign::Neg);
        let back = triple.pack(path).unwrap().unpack(0, path).unwrap();
        assert_eq!(back, triple);
    }

    #[test]
    fn test_parse_text_accepts_explicit_and_implicit_signs() {
        let list = IndexList::parse_text("0 1 +3\n2 0 -4\n\n5 5 7\n", Path::new("inline")).unwrap();
        assert_eq!(
            list.as_slice(),
            &[
                IndexTriple::new(0, 1, 3, Sign::Pos),
                IndexTriple::new(2, 0, 4, Sign::Neg),
                IndexTriple::new(5, 5, 7, Sign::Pos),
            ]
        );
    }

    #[test]
    fn test_parse_text_rejects_field_count_mismatch() {
        let err = IndexList::parse_text("0 1 +3\n4 5\n", Path::new("inline")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 2"));
        assert!(message.contains("expected 3 fields"));
    }

    #[test]
    fn test_parse_text_rejects_negative_state_index() {
        assert!(IndexList::parse_text("-1 0 +0\n", Path::new("inline")).is_err());
    }

    #[test]
    fn test_binary_length_must_be_whole_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.bin");
        std::fs::write(&path, [0u8; 13]).unwrap();
        assert!(IndexList::read_binary(&path).is_err());
    }

    #[test]
    fn test_builder_preserves_order_and_count() {
        let mut builder = IndexListBuilder::with_capacity(1);
        for i in 0..10 {
            builder.push(IndexTriple::new(i, i + 1, i * 2, Sign::Pos));
        }
        assert_eq!(builder.len(), 10);
        let list = builder.finish();
        assert_eq!(list.len(), 10);
        assert!(list.iter().enumerate().all(|(i, t)| t.row == i as u32));
    }

    #[test]
    fn test_text_output_format() {
        let list = IndexList::new(vec![
            IndexTriple::new(3, 0, 12, Sign::Neg),
            IndexTriple::new(1, 1, 0, Sign::Pos),
        ]);
        assert_eq!(list.to_text(), "3 0 -12\n1 1 +0\n");
    }
}
