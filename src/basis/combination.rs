/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Combination table
//!
//! The combination table lists the basis blocks and every pair of blocks the
//! Hamiltonian couples, together with the matrix block and index lists that
//! hold the coupling. Only the upper triangle (`bra <= ket`) is stored; the
//! lower triangle is reproduced by applying the stored block transposed.

use super::block::{Basis, BasisBlock, BlockId};
use super::errors::{BasisError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Which part of the Hamiltonian a coupling carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouplingKind {
    /// Neutron-neutron interaction; the proton part of both blocks is shared
    Neutron,
    /// Proton-proton interaction; the neutron part of both blocks is shared
    Proton,
    /// Proton-neutron interaction, one index list per species
    NeutronProton,
}

/// One stored block of the Hamiltonian between basis blocks `bra` and `ket`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupling {
    pub kind: CouplingKind,
    pub bra: BlockId,
    pub ket: BlockId,
    pub matrix_id: usize,
    #[serde(default)]
    pub neutron_list: Option<usize>,
    #[serde(default)]
    pub proton_list: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct TableFile {
    blocks: Vec<BasisBlock>,
    couplings: Vec<Coupling>,
}

/// Validated description of how the basis blocks are coupled
#[derive(Debug, Clone)]
pub struct CombinationTable {
    basis: Arc<Basis>,
    couplings: Vec<Coupling>,
}

impl CombinationTable {
    /// Build and validate a table
    pub fn new(basis: Basis, couplings: Vec<Coupling>) -> Result<Self> {
        for (index, coupling) in couplings.iter().enumerate() {
            validate_coupling(&basis, index, coupling)?;
        }
        Ok(Self {
            basis: Arc::new(basis),
            couplings,
        })
    }

    /// Load a table from its JSON form
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BasisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: TableFile = serde_json::from_str(&text).map_err(|source| BasisError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(Basis::new(file.blocks)?, file.couplings)
    }

    /// Save the table as JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = TableFile {
            blocks: self.basis.blocks().to_vec(),
            couplings: self.couplings.clone(),
        };
        let text = serde_json::to_string_pretty(&file).map_err(|source| BasisError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| BasisError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }

    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }
}

fn validate_coupling(basis: &Basis, index: usize, coupling: &Coupling) -> Result<()> {
    let invalid = |reason: String| BasisError::InvalidCoupling { index, reason };

    let bra = basis
        .block(coupling.bra)
        .ok_or_else(|| invalid(format!("bra block {} does not exist", coupling.bra)))?;
    let ket = basis
        .block(coupling.ket)
        .ok_or_else(|| invalid(format!("ket block {} does not exist", coupling.ket)))?;

    if coupling.bra > coupling.ket {
        return Err(invalid(format!(
            "only the upper triangle is stored, got bra {} > ket {}",
            coupling.bra, coupling.ket
        )));
    }

    match coupling.kind {
        CouplingKind::Neutron => {
            if coupling.neutron_list.is_none() {
                return Err(invalid("neutron coupling without neutron index list".into()));
            }
            if bra.proton_dimension != ket.proton_dimension {
                return Err(invalid(format!(
                    "neutron coupling between proton dimensions {} and {}",
                    bra.proton_dimension, ket.proton_dimension
                )));
            }
        }
        CouplingKind::Proton => {
            if coupling.proton_list.is_none() {
                return Err(invalid("proton coupling without proton index list".into()));
            }
            if bra.neutron_dimension != ket.neutron_dimension {
                return Err(invalid(format!(
                    "proton coupling between neutron dimensions {} and {}",
                    bra.neutron_dimension, ket.neutron_dimension
                )));
            }
        }
        CouplingKind::NeutronProton => {
            if coupling.neutron_list.is_none() || coupling.proton_list.is_none() {
                return Err(invalid(
                    "neutron-proton coupling needs both index lists".into(),
                ));
            }
        }
    }
    Ok(())
}
