/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Many-body basis description
//!
//! The M-scheme basis is partitioned into blocks of fixed proton and neutron
//! excitation energy and projection. Every vector and every matrix block in
//! the crate is addressed through this partition.

mod block;
mod combination;
mod errors;
pub mod mscheme;

pub use block::{Basis, BasisBlock, BlockId};
pub use combination::{CombinationTable, Coupling, CouplingKind};
pub use errors::{BasisError, Result};
pub use mscheme::{mscheme_basis, shell_orbitals, Orbital, Shell, SpeciesSpace};
