/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for the basis module

use std::path::PathBuf;
use thiserror::Error;

/// Result type for basis operations
pub type Result<T> = std::result::Result<T, BasisError>;

/// Errors raised while building or loading a basis description
#[derive(Error, Debug)]
pub enum BasisError {
    /// Block ids must equal their position in the basis
    #[error("basis block at position {position} has id {found}")]
    NonSequentialId { position: usize, found: usize },

    /// A basis block must hold at least one state
    #[error("basis block {0} has zero dimension")]
    EmptyBlock(usize),

    /// A coupling of the combination table is inconsistent with the basis
    #[error("coupling {index}: {reason}")]
    InvalidCoupling { index: usize, reason: String },

    /// Invalid input to the M-scheme enumeration
    #[error("invalid M-scheme space: {0}")]
    InvalidSpace(String),

    /// The table file could not be read or written
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table file is not valid JSON for a combination table
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
