/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Execution instructions

use crate::basis::{BlockId, Coupling, CouplingKind};
use crate::memory::CacheKey;
use crate::multiply::Variant;
use serde::{Deserialize, Serialize};

/// What an instruction does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    NeutronBlock,
    ProtonBlock,
    NeutronProtonBlock,
    /// Flush a finished output block to disk
    Unload,
}

impl InstructionKind {
    pub fn coupling_kind(self) -> Option<CouplingKind> {
        match self {
            InstructionKind::NeutronBlock => Some(CouplingKind::Neutron),
            InstructionKind::ProtonBlock => Some(CouplingKind::Proton),
            InstructionKind::NeutronProtonBlock => Some(CouplingKind::NeutronProton),
            InstructionKind::Unload => None,
        }
    }
}

impl From<CouplingKind> for InstructionKind {
    fn from(kind: CouplingKind) -> Self {
        match kind {
            CouplingKind::Neutron => InstructionKind::NeutronBlock,
            CouplingKind::Proton => InstructionKind::ProtonBlock,
            CouplingKind::NeutronProton => InstructionKind::NeutronProtonBlock,
        }
    }
}

/// One step of a matrix-vector multiplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub variant: Variant,
    pub input_block: BlockId,
    pub output_block: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neutron_list: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proton_list: Option<usize>,
}

impl Instruction {
    /// Apply a stored coupling; `Neg` swaps its bra and ket blocks
    pub fn multiply(coupling: &Coupling, variant: Variant) -> Self {
        let (input_block, output_block) = match variant {
            Variant::Pos => (coupling.ket, coupling.bra),
            Variant::Neg => (coupling.bra, coupling.ket),
        };
        Self {
            kind: coupling.kind.into(),
            variant,
            input_block,
            output_block,
            matrix_id: Some(coupling.matrix_id),
            neutron_list: coupling.neutron_list,
            proton_list: coupling.proton_list,
        }
    }

    pub fn unload(block_id: BlockId) -> Self {
        Self {
            kind: InstructionKind::Unload,
            variant: Variant::Pos,
            input_block: block_id,
            output_block: block_id,
            matrix_id: None,
            neutron_list: None,
            proton_list: None,
        }
    }

    pub fn is_unload(&self) -> bool {
        self.kind == InstructionKind::Unload
    }

    /// Cache entries the instruction holds while it runs, without duplicates
    pub fn cache_keys(&self) -> Vec<CacheKey> {
        if self.is_unload() {
            return vec![CacheKey::output_vector(self.output_block)];
        }
        let mut keys = vec![
            CacheKey::input_vector(self.input_block),
            CacheKey::output_vector(self.output_block),
        ];
        keys.extend(self.matrix_id.map(CacheKey::matrix_block));
        keys.extend(self.neutron_list.map(CacheKey::index_list));
        if let Some(list) = self.proton_list {
            if self.neutron_list != Some(list) {
                keys.push(CacheKey::index_list(list));
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neg_instruction_swaps_blocks() {
        let coupling = Coupling {
            kind: CouplingKind::NeutronProton,
            bra: 1,
            ket: 3,
            matrix_id: 7,
            neutron_list: Some(2),
            proton_list: Some(2),
        };
        let pos = Instruction::multiply(&coupling, Variant::Pos);
        let neg = Instruction::multiply(&coupling, Variant::Neg);
        assert_eq!((pos.input_block, pos.output_block), (3, 1));
        assert_eq!((neg.input_block, neg.output_block), (1, 3));
        assert_eq!(pos.kind, InstructionKind::NeutronProtonBlock);
        // shared list id is requested once
        assert_eq!(pos.cache_keys().len(), 4);
    }

    #[test]
    fn test_unload_only_touches_output_block() {
        let unload = Instruction::unload(4);
        assert!(unload.is_unload());
        assert_eq!(unload.cache_keys(), vec![CacheKey::output_vector(4)]);
        let json = serde_json::to_string(&unload).unwrap();
        assert!(!json.contains("matrix_id"));
        assert_eq!(serde_json::from_str::<Instruction>(&json).unwrap(), unload);
    }
}
