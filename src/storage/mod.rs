/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! On-disk block formats
//!
//! The Hamiltonian and every Lanczos vector live on disk as many small files:
//! dense matrix blocks, dense vector blocks (one per basis block) and index
//! lists that map compressed operator indices onto basis positions. This
//! module owns their layouts and the low-level I/O shared by all of them.
//!
//! All block files are written in native byte order. The NumPy writer is the
//! one exception: it always emits little-endian `<f8` so that the files can be
//! read by standard tooling on any machine.

mod errors;
pub mod index_list;
pub mod matrix_block;
pub mod numpy;
pub mod vector_block;

pub use errors::{Result, StorageError};
pub use index_list::{IndexList, IndexListBuilder, IndexTriple, Sign};
pub use matrix_block::{MatrixBlock, MatrixHeader};
pub use numpy::{npy_header, read_npy, write_npy, NpyArray};
pub use vector_block::VectorBlock;

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Path of the matrix block file with the given id inside `directory`
pub fn matrix_block_path(directory: &Path, matrix_id: usize) -> PathBuf {
    directory.join(format!("matrix_{:06}.bin", matrix_id))
}

/// Path of the binary index list file with the given id inside `directory`
pub fn index_list_path(directory: &Path, list_id: usize) -> PathBuf {
    directory.join(format!("index_{:06}.bin", list_id))
}

pub(crate) fn open_reader(path: &Path, operation: &'static str) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| StorageError::MissingFile {
            operation,
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn create_writer(path: &Path, operation: &'static str) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| StorageError::WriteFailure {
            operation,
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn read_exact(
    reader: &mut impl Read,
    buffer: &mut [u8],
    path: &Path,
    operation: &'static str,
) -> Result<()> {
    reader.read_exact(buffer).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            StorageError::malformed(path, format!("{}: file is truncated", operation))
        } else {
            StorageError::MissingFile {
                operation,
                path: path.to_path_buf(),
                source: err,
            }
        }
    })
}

pub(crate) fn write_all(
    writer: &mut impl Write,
    bytes: &[u8],
    path: &Path,
    operation: &'static str,
) -> Result<()> {
    writer
        .write_all(bytes)
        .map_err(|source| StorageError::WriteFailure {
            operation,
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn finish_writer(
    mut writer: BufWriter<File>,
    path: &Path,
    operation: &'static str,
) -> Result<()> {
    writer.flush().map_err(|source| StorageError::WriteFailure {
        operation,
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_u64(reader: &mut impl Read, path: &Path, operation: &'static str) -> Result<u64> {
    let mut bytes = [0u8; 8];
    read_exact(reader, &mut bytes, path, operation)?;
    Ok(u64::from_ne_bytes(bytes))
}

pub(crate) fn read_magic(
    reader: &mut impl Read,
    expected: &[u8; 4],
    path: &Path,
    operation: &'static str,
) -> Result<()> {
    let mut magic = [0u8; 4];
    read_exact(reader, &mut magic, path, operation)?;
    if &magic != expected {
        return Err(StorageError::malformed(
            path,
            format!(
                "bad magic {:?}, expected {:?}",
                String::from_utf8_lossy(&magic),
                String::from_utf8_lossy(expected)
            ),
        ));
    }
    Ok(())
}

/// Allocate a zeroed buffer of `len` elements, reporting failure instead of aborting
pub(crate) fn try_zeroed<T: bytemuck::Zeroable + Clone>(len: usize, path: &Path) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| StorageError::AllocationFailure {
            path: path.to_path_buf(),
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    buffer.resize(len, T::zeroed());
    Ok(buffer)
}

pub(crate) fn read_f64s(
    reader: &mut impl Read,
    len: usize,
    path: &Path,
    operation: &'static str,
) -> Result<Vec<f64>> {
    let mut data = try_zeroed::<f64>(len, path)?;
    read_exact(reader, bytemuck::cast_slice_mut(&mut data), path, operation)?;
    Ok(data)
}

pub(crate) fn expect_end_of_file(
    reader: &mut impl Read,
    path: &Path,
    operation: &'static str,
) -> Result<()> {
    let mut probe = [0u8; 1];
    match reader.read(&mut probe) {
        Ok(0) => Ok(()),
        Ok(_) => Err(StorageError::malformed(
            path,
            format!("{}: trailing bytes after payload", operation),
        )),
        Err(source) => Err(StorageError::MissingFile {
            operation,
            path: path.to_path_buf(),
            source,
        }),
    }
}
