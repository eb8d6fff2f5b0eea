/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Lanczos eigensolver for the lowest eigenpairs of a [`LinearOperator`]
//!
//! [`LinearOperator`]: crate::operator::LinearOperator

mod errors;
pub mod settings;
pub mod solver;
pub mod tridiagonal;

pub use errors::{LanczosError, Result};
pub use settings::{ConvergenceCriterion, LanczosSettings, StartVector};
pub use solver::{
    eigenvector_path, krylov_vector_path, Eigensystem, LanczosEnvironment, LanczosStatus,
};
pub use tridiagonal::{solve_tridiagonal, TridiagonalEigen};
