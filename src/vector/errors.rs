/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for block vectors

use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for block vector operations
pub type Result<T> = std::result::Result<T, VectorError>;

/// Errors raised by disk-backed vector arithmetic
#[derive(Error, Debug)]
pub enum VectorError {
    /// A block file could not be read or written
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The vector directory could not be created or removed
    #[error("cannot manage vector directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two vectors over different bases were combined
    #[error("vector dimension mismatch: {0}")]
    DimensionMismatch(String),
}
