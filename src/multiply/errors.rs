/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for the block kernels

use thiserror::Error;

/// Result type for kernel calls
pub type Result<T> = std::result::Result<T, MultiplyError>;

/// Errors raised when a kernel's operands do not fit together
#[derive(Error, Debug)]
pub enum MultiplyError {
    /// Vector block lengths or shared sub-dimensions disagree
    #[error("operand shapes do not match: {0}")]
    ShapeMismatch(String),

    /// A triple points outside a vector block or the matrix block
    #[error("{list} index list entry {position}: {reason}")]
    IndexOutOfRange {
        list: &'static str,
        position: usize,
        reason: String,
    },

    /// The kernel needs an index list the instruction does not provide
    #[error("{0} index list required")]
    MissingIndexList(&'static str),
}
