/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Error types for operators

use crate::basis::BasisError;
use crate::schedule::ScheduleError;
use crate::vector::VectorError;
use thiserror::Error;

/// Result type for operator application
pub type Result<T> = std::result::Result<T, OperatorError>;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Basis(#[from] BasisError),

    /// Matrix and basis sizes disagree
    #[error("operator dimension mismatch: {0}")]
    DimensionMismatch(String),
}
