/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for the block storage module

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised while reading or writing block files
#[derive(Error, Debug)]
pub enum StorageError {
    /// A block file could not be opened for reading
    #[error("{operation}: cannot open {path} for reading: {source}")]
    MissingFile {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A block file could not be created or fully written
    #[error("{operation}: failed writing {path}: {source}")]
    WriteFailure {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but its content does not follow the expected layout
    #[error("malformed {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// The payload of a block could not be allocated
    #[error("cannot allocate {bytes} bytes for {path}")]
    AllocationFailure { path: PathBuf, bytes: usize },
}

impl StorageError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StorageError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
