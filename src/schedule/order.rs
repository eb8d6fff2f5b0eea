/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Execution order
//!
//! The execution order is built once from the combination table and replayed
//! for every multiplication. Instructions are grouped by the output block they
//! accumulate into; each group ends with an `Unload` of that block, so every
//! block of the product is flushed exactly once, after its last contribution.

use super::errors::{Result, ScheduleError};
use super::instruction::{Instruction, InstructionKind};
use crate::basis::{CombinationTable, CouplingKind};
use crate::memory::UsageIndex;
use crate::multiply::Variant;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where the cursor of an execution order stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    #[default]
    NotStarted,
    Running,
    Exhausted,
}

/// Fixed sequence of instructions for one matrix-vector product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOrder {
    instructions: Vec<Instruction>,
    #[serde(skip)]
    position: usize,
    #[serde(skip)]
    state: CursorState,
}

impl ExecutionOrder {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            position: 0,
            state: CursorState::NotStarted,
        }
    }

    /// Plan the multiplication described by a combination table
    ///
    /// Every coupling yields a `Pos` instruction into its bra block and, when
    /// bra and ket differ, a `Neg` instruction into its ket block.
    pub fn build(table: &CombinationTable) -> Self {
        let mut groups: Vec<Vec<Instruction>> = vec![Vec::new(); table.basis().len()];
        for coupling in table.couplings() {
            if let Some(group) = groups.get_mut(coupling.bra) {
                group.push(Instruction::multiply(coupling, Variant::Pos));
            }
            if coupling.bra != coupling.ket {
                if let Some(group) = groups.get_mut(coupling.ket) {
                    group.push(Instruction::multiply(coupling, Variant::Neg));
                }
            }
        }

        let mut instructions = Vec::with_capacity(2 * table.couplings().len() + groups.len());
        for (block_id, mut group) in groups.into_iter().enumerate() {
            // consecutive instructions reading the same input block share its load
            group.sort_by_key(|instruction| (instruction.input_block, instruction.matrix_id));
            instructions.extend(group);
            instructions.push(Instruction::unload(block_id));
        }

        let order = Self::new(instructions);
        info!(
            "execution order: {} instructions for {} couplings over {} blocks",
            order.len(),
            table.couplings().len(),
            table.basis().len()
        );
        order
    }

    /// Load an order saved with [`ExecutionOrder::write`]
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ScheduleError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|source| ScheduleError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check that every instruction refers to existing blocks and carries the
    /// index lists its kernel needs
    pub fn validate(&self, table: &CombinationTable) -> Result<()> {
        let blocks = table.basis().len();
        for (position, instruction) in self.instructions.iter().enumerate() {
            let invalid = |reason: String| ScheduleError::InvalidInstruction { position, reason };
            if instruction.input_block >= blocks || instruction.output_block >= blocks {
                return Err(invalid(format!(
                    "blocks {} -> {} outside basis of {} blocks",
                    instruction.input_block, instruction.output_block, blocks
                )));
            }
            let Some(kind) = instruction.kind.coupling_kind() else {
                continue;
            };
            if instruction.matrix_id.is_none() {
                return Err(invalid("no matrix block".to_string()));
            }
            let needs_neutrons = matches!(kind, CouplingKind::Neutron | CouplingKind::NeutronProton);
            let needs_protons = matches!(kind, CouplingKind::Proton | CouplingKind::NeutronProton);
            if needs_neutrons && instruction.neutron_list.is_none() {
                return Err(invalid("no neutron index list".to_string()));
            }
            if needs_protons && instruction.proton_list.is_none() {
                return Err(invalid("no proton index list".to_string()));
            }
        }
        Ok(())
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Position of the next instruction to be handed out
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn has_next_instruction(&self) -> bool {
        self.position < self.instructions.len()
    }

    /// Hand out the next instruction with its position
    pub fn next_instruction(&mut self) -> Option<(usize, Instruction)> {
        let Some(instruction) = self.instructions.get(self.position).copied() else {
            self.state = CursorState::Exhausted;
            return None;
        };
        let position = self.position;
        self.position += 1;
        self.state = if self.has_next_instruction() {
            CursorState::Running
        } else {
            CursorState::Exhausted
        };
        Some((position, instruction))
    }

    /// Rewind for the next multiplication
    pub fn reset_execution_order(&mut self) {
        self.position = 0;
        self.state = CursorState::NotStarted;
    }

    /// Positions at which every cache key is used
    pub fn usage_index(&self) -> UsageIndex {
        UsageIndex::from_uses(
            self.instructions.len(),
            self.instructions
                .iter()
                .enumerate()
                .map(|(position, instruction)| (position, instruction.cache_keys())),
        )
    }

    pub fn count(&self, kind: InstructionKind) -> usize {
        self.instructions
            .iter()
            .filter(|instruction| instruction.kind == kind)
            .count()
    }
}
