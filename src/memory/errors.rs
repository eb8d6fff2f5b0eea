/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for the memory manager

use super::CacheKey;
use crate::storage::StorageError;
use crate::vector::VectorError;
use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised while loading, evicting or writing back cached blocks
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A matrix block or index list could not be read
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A vector block could not be read or written
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// One instruction needs more memory than the whole budget
    #[error("instruction needs {needed} bytes but maximum_loaded_memory is {budget} bytes")]
    BudgetExceeded { needed: usize, budget: usize },

    /// A vector key refers to a block the basis does not have
    #[error("basis has no block {0}")]
    UnknownBlock(usize),

    /// Release of an entry that is not loaded
    #[error("{0} is not resident")]
    NotResident(CacheKey),

    /// Release of an entry nobody holds
    #[error("{0} is released more often than requested")]
    NotPinned(CacheKey),

    /// Vector requests outside `begin_pass` / `finish_pass`
    #[error("no multiplication pass is active")]
    NoActivePass,

    /// `begin_pass` while vector blocks are still held
    #[error("vector blocks of the previous pass are still in use")]
    PassInProgress,

    /// The cache returned a payload of another kind
    #[error("unexpected payload for {0}")]
    UnexpectedPayload(CacheKey),

    /// A thread panicked while holding the cache state
    #[error("cache state lock poisoned")]
    Poisoned,
}
