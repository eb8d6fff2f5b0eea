/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Sparse block matrix-vector products
//!
//! Only the upper triangle `bra <= ket` of the Hamiltonian is stored. A stored
//! block contributes `out_bra += M in_ket` through a [`Variant::Pos`] kernel
//! and, for off-diagonal blocks, `out_ket += M^T in_bra` through the matching
//! [`Variant::Neg`] kernel.

mod errors;
pub mod kernels;

pub use errors::{MultiplyError, Result};
pub use kernels::{Accumulator, BlockShape, Kernel, Operand};

use serde::{Deserialize, Serialize};

/// Direction in which a stored block is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Stored orientation, ket in and bra out
    Pos,
    /// Transposed, bra in and ket out
    Neg,
}
