/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Dense matrix element blocks
//!
//! A matrix block stores the reduced matrix elements used by one coupling
//! between basis blocks. Neutron-only and proton-only blocks are single
//! columns indexed by the operator number of an index triple; neutron-proton
//! blocks are `neutron_ops x proton_ops`, row-major.

use super::{
    create_writer, expect_end_of_file, finish_writer, open_reader, read_f64s, read_magic,
    read_u64, write_all, Result, StorageError,
};
use std::path::Path;

const MAGIC: [u8; 4] = *b"MSMB";

/// Shape information stored at the head of a matrix block file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixHeader {
    pub matrix_id: usize,
    pub rows: usize,
    pub cols: usize,
}

impl MatrixHeader {
    /// Bytes the payload will occupy once loaded
    pub fn payload_bytes(&self) -> usize {
        self.rows * self.cols * std::mem::size_of::<f64>()
    }
}

/// Row-major block of matrix elements
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBlock {
    matrix_id: usize,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl MatrixBlock {
    /// Create a matrix block from row-major data
    pub fn new(matrix_id: usize, rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(StorageError::malformed(
                format!("matrix {}", matrix_id),
                format!("{}x{} block given {} elements", rows, cols, data.len()),
            ));
        }
        Ok(Self {
            matrix_id,
            rows,
            cols,
            data,
        })
    }

    /// Single-column block used by neutron-only and proton-only couplings
    pub fn column(matrix_id: usize, data: Vec<f64>) -> Self {
        let rows = data.len();
        Self {
            matrix_id,
            rows,
            cols: 1,
            data,
        }
    }

    pub fn matrix_id(&self) -> usize {
        self.matrix_id
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
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

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }

    /// Read only the header, used to size a load before it happens
    pub fn read_header(path: &Path) -> Result<MatrixHeader> {
        const OP: &str = "read matrix header";
        let mut reader = open_reader(path, OP)?;
        Self::parse_header(&mut reader, path, OP)
    }

    fn parse_header(
        reader: &mut impl std::io::Read,
        path: &Path,
        op: &'static str,
    ) -> Result<MatrixHeader> {
        read_magic(reader, &MAGIC, path, op)?;
        let matrix_id = read_u64(reader, path, op)? as usize;
        let rows = read_u64(reader, path, op)? as usize;
        let cols = read_u64(reader, path, op)? as usize;
        if rows.checked_mul(cols).is_none() {
            return Err(StorageError::malformed(
                path,
                format!("shape {}x{} overflows", rows, cols),
            ));
        }
        Ok(MatrixHeader {
            matrix_id,
            rows,
            cols,
        })
    }

    /// Read a matrix block and check that it carries the requested id
    pub fn read(path: &Path, matrix_id: usize) -> Result<Self> {
        const OP: &str = "read matrix block";
        let mut reader = open_reader(path, OP)?;
        let header = Self::parse_header(&mut reader, path, OP)?;
        if header.matrix_id != matrix_id {
            return Err(StorageError::malformed(
                path,
                format!(
                    "holds matrix {} but matrix {} was requested",
                    header.matrix_id, matrix_id
                ),
            ));
        }
        let data = read_f64s(&mut reader, header.rows * header.cols, path, OP)?;
        expect_end_of_file(&mut reader, path, OP)?;
        Ok(Self {
            matrix_id,
            rows: header.rows,
            cols: header.cols,
            data,
        })
    }

    /// Write the block, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        const OP: &str = "write matrix block";
        let mut writer = create_writer(path, OP)?;
        write_all(&mut writer, &MAGIC, path, OP)?;
        for field in [self.matrix_id, self.rows, self.cols] {
            write_all(&mut writer, &(field as u64).to_ne_bytes(), path, OP)?;
        }
        write_all(&mut writer, bytemuck::cast_slice(&self.data), path, OP)?;
        finish_writer(writer, path, OP)
    }
}
