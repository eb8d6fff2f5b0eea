/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Dense vector blocks
//!
//! A vector block holds the amplitudes of one basis block. The file layout is
//! a 4-byte magic `MSVB`, the block id and the element count as `u64`, then the
//! amplitudes as `f64`.

use super::{
    create_writer, expect_end_of_file, finish_writer, open_reader, read_f64s, read_magic,
    read_u64, write_all, Result, StorageError,
};
use crate::basis::BlockId;
use std::path::Path;

const MAGIC: [u8; 4] = *b"MSVB";

/// Amplitudes of a single basis block
#[derive(Debug, Clone, PartialEq)]
pub struct VectorBlock {
    block_id: BlockId,
    data: Vec<f64>,
}

impl VectorBlock {
    /// Create a block of `len` zero amplitudes
    pub fn zeros(block_id: BlockId, len: usize) -> Self {
        Self {
            block_id,
            data: vec![0.0; len],
        }
    }

    /// Wrap existing amplitudes
    pub fn from_vec(block_id: BlockId, data: Vec<f64>) -> Self {
        Self { block_id, data }
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Resident size of a block with `len` amplitudes
    pub fn payload_bytes(len: usize) -> usize {
        len * std::mem::size_of::<f64>()
    }

    /// Resident size of this block
    pub fn byte_size(&self) -> usize {
        Self::payload_bytes(self.data.len())
    }

    /// Read a block and check it against the id and length the basis expects
    ///
    /// # Arguments
    ///
    /// * `path` - File to read
    /// * `block_id` - Id the file must carry
    /// * `expected_len` - Dimension of the basis block
    pub fn read(path: &Path, block_id: BlockId, expected_len: usize) -> Result<Self> {
        const OP: &str = "read vector block";
        let mut reader = open_reader(path, OP)?;
        read_magic(&mut reader, &MAGIC, path, OP)?;

        let stored_id = read_u64(&mut reader, path, OP)? as usize;
        if stored_id != block_id {
            return Err(StorageError::malformed(
                path,
                format!("holds block {} but block {} was requested", stored_id, block_id),
            ));
        }

        let len = read_u64(&mut reader, path, OP)? as usize;
        if len != expected_len {
            return Err(StorageError::malformed(
                path,
                format!(
                    "block {} has {} amplitudes, basis dimension is {}",
                    block_id, len, expected_len
                ),
            ));
        }

        let data = read_f64s(&mut reader, len, path, OP)?;
        expect_end_of_file(&mut reader, path, OP)?;
        Ok(Self { block_id, data })
    }

    /// Write the block, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        const OP: &str = "write vector block";
        let mut writer = create_writer(path, OP)?;
        write_all(&mut writer, &MAGIC, path, OP)?;
        write_all(&mut writer, &(self.block_id as u64).to_ne_bytes(), path, OP)?;
        write_all(&mut writer, &(self.data.len() as u64).to_ne_bytes(), path, OP)?;
        write_all(&mut writer, bytemuck::cast_slice(&self.data), path, OP)?;
        finish_writer(writer, path, OP)
    }
}
