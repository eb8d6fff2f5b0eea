/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! NumPy `.npy` (format version 1.0) reader and writer for `float64` matrices
//!
//! The header is laid out exactly as `numpy.save` produces it so that the
//! files are byte-compatible with downstream Python tooling: magic, version
//! `1.0`, a little-endian `u16` header length, then the header dictionary
//! padded with spaces and terminated by `\n` so that the data starts at a
//! multiple of 64 bytes.

use super::{
    create_writer, finish_writer, open_reader, read_exact, try_zeroed, write_all, Result,
    StorageError,
};
use std::io::Read;
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const VERSION: [u8; 2] = [1, 0];
const ALIGNMENT: usize = 64;
const PREAMBLE_LEN: usize = MAGIC.len() + VERSION.len() + 2;

/// A dense array read back from a `.npy` file
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// Build the full header (preamble, dictionary and padding) for a `rows x cols` array
pub fn npy_header(rows: usize, cols: usize) -> Vec<u8> {
    let dictionary = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    let unpadded = PREAMBLE_LEN + dictionary.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;

    let mut text = dictionary.into_bytes();
    text.extend(std::iter::repeat(b' ').take(padding));
    text.push(b'\n');

    let mut header = Vec::with_capacity(PREAMBLE_LEN + text.len());
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&VERSION);
    header.extend_from_slice(&(text.len() as u16).to_le_bytes());
    header.extend_from_slice(&text);
    header
}

/// Write a row-major `rows x cols` matrix of `f64`
///
/// # Arguments
///
/// * `path` - Destination file
/// * `rows` - Number of rows
/// * `cols` - Number of columns
/// * `data` - Row-major values, `rows * cols` of them
pub fn write_npy(path: &Path, rows: usize, cols: usize, data: &[f64]) -> Result<()> {
    const OP: &str = "write npy matrix";
    if data.len() != rows * cols {
        return Err(StorageError::malformed(
            path,
            format!("{}x{} matrix given {} values", rows, cols, data.len()),
        ));
    }

    let mut writer = create_writer(path, OP)?;
    write_all(&mut writer, &npy_header(rows, cols), path, OP)?;
    let mut bytes = Vec::with_capacity(data.len() * 8);
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    write_all(&mut writer, &bytes, path, OP)?;
    finish_writer(writer, path, OP)
}

/// Read a little-endian `float64` array in C order
pub fn read_npy(path: &Path) -> Result<NpyArray> {
    const OP: &str = "read npy matrix";
    let mut reader = open_reader(path, OP)?;

    let mut preamble = [0u8; PREAMBLE_LEN];
    read_exact(&mut reader, &mut preamble, path, OP)?;
    if &preamble[..6] != MAGIC {
        return Err(StorageError::malformed(path, "missing \\x93NUMPY magic"));
    }
    if preamble[6..8] != VERSION {
        return Err(StorageError::malformed(
            path,
            format!("unsupported format version {}.{}", preamble[6], preamble[7]),
        ));
    }
    let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;

    let mut header = vec![0u8; header_len];
    read_exact(&mut reader, &mut header, path, OP)?;
    let header = String::from_utf8(header)
        .map_err(|_| StorageError::malformed(path, "header is not valid text"))?;

    if !header.contains("'descr': '<f8'") {
        return Err(StorageError::malformed(path, "only '<f8' arrays are supported"));
    }
    if !header.contains("'fortran_order': False") {
        return Err(StorageError::malformed(path, "only C-ordered arrays are supported"));
    }
    let shape = parse_shape(&header).ok_or_else(|| StorageError::malformed(path, "bad shape"))?;

    let count: usize = shape.iter().product();
    let mut raw = try_zeroed::<u8>(count * 8, path)?;
    read_exact(&mut reader, &mut raw, path, OP)?;
    let mut probe = [0u8; 1];
    if reader.read(&mut probe).unwrap_or(0) != 0 {
        return Err(StorageError::malformed(path, "trailing bytes after array data"));
    }

    let data = raw
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect();
    Ok(NpyArray { shape, data })
}

fn parse_shape(header: &str) -> Option<Vec<usize>> {
    let start = header.find("'shape':")? + "'shape':".len();
    let rest = &header[start..];
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| field.parse().ok())
        .collect()
}
