/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Operators the eigensolver can multiply with
//!
//! The Lanczos iteration only needs `w = H v` on disk-backed vectors. The
//! out-of-core scheduler and the in-memory [`DenseOperator`] both provide it.

mod dense;
mod errors;

pub use dense::DenseOperator;
pub use errors::{OperatorError, Result};

use crate::basis::Basis;
use crate::vector::BlockVector;
use std::sync::Arc;

/// A real symmetric operator acting on block vectors
pub trait LinearOperator: Send + Sync {
    /// Basis the operator acts on
    fn basis(&self) -> &Arc<Basis>;

    fn dimension(&self) -> usize {
        self.basis().dimension()
    }

    /// Overwrite `output` with `H * input`
    fn apply(&self, input: &BlockVector, output: &BlockVector) -> Result<()>;
}
