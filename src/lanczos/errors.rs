/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for the eigensolver
//!
//! Running out of iterations is not an error; it is reported through
//! [`super::LanczosStatus`].

use crate::operator::OperatorError;
use crate::storage::StorageError;
use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for the eigensolver
pub type Result<T> = std::result::Result<T, LanczosError>;

#[derive(Error, Debug)]
pub enum LanczosError {
    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid Lanczos settings: {0}")]
    InvalidSettings(String),

    /// The starting vector has zero or non-finite norm
    #[error("starting vector has norm {0}")]
    DegenerateStart(f64),

    /// faer's `EvdError` does not implement `std::error::Error`, so it is kept as text
    #[error("tridiagonal eigendecomposition failed: {0}")]
    EigenDecomposition(String),

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
