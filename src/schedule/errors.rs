/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for execution orders and the scheduler

use crate::memory::{CacheKey, MemoryError};
use crate::multiply::MultiplyError;
use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for scheduling operations
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Errors raised while planning or replaying an execution order
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Multiply(#[from] MultiplyError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    /// An instruction does not fit the combination table
    #[error("instruction {position}: {reason}")]
    InvalidInstruction { position: usize, reason: String },

    /// The cache did not hand out a payload the instruction needs
    #[error("instruction {position} is missing its {key}")]
    MissingPayload { position: usize, key: CacheKey },

    /// Input and output vectors do not live on the scheduled basis
    #[error("vector does not match the scheduled basis: {0}")]
    DimensionMismatch(String),

    /// The order file could not be read or written
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The order file is not valid JSON for an execution order
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A worker panicked while holding the cursor or an output block
    #[error("lock poisoned")]
    Poisoned,
}
