/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Basis blocks and the partitioned many-body basis

use super::errors::{BasisError, Result};
use serde::{Deserialize, Serialize};

/// Identifier of a basis block; equal to its position in the [`Basis`]
pub type BlockId = usize;

/// One `(Ep, Mp, En, Mn)` partition of the many-body basis
///
/// The block is the tensor product of `proton_dimension` proton states and
/// `neutron_dimension` neutron states. The amplitude of proton state `ip` and
/// neutron state `in` sits at offset `ip * neutron_dimension + in`.
/// Projections are stored doubled so odd particle numbers stay integral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisBlock {
    pub block_id: BlockId,
    pub proton_energy: u32,
    pub neutron_energy: u32,
    pub proton_m2: i32,
    pub neutron_m2: i32,
    pub num_protons: u32,
    pub num_neutrons: u32,
    pub proton_dimension: usize,
    pub neutron_dimension: usize,
}

impl BasisBlock {
    /// Number of amplitudes in the block
    pub fn dimension(&self) -> usize {
        self.proton_dimension * self.neutron_dimension
    }

    /// Total excitation energy `Ep + En`
    pub fn energy(&self) -> u32 {
        self.proton_energy + self.neutron_energy
    }

    /// Twice the total projection `Mp + Mn`
    pub fn total_m2(&self) -> i32 {
        self.proton_m2 + self.neutron_m2
    }
}

/// Ordered collection of basis blocks with their offsets in the full vector
#[derive(Debug, Clone, PartialEq)]
pub struct Basis {
    blocks: Vec<BasisBlock>,
    offsets: Vec<usize>,
    dimension: usize,
}

impl Basis {
    /// Create a basis; block ids must run `0..n` in order
    pub fn new(blocks: Vec<BasisBlock>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut dimension = 0;
        for (position, block) in blocks.iter().enumerate() {
            if block.block_id != position {
                return Err(BasisError::NonSequentialId {
                    position,
                    found: block.block_id,
                });
            }
            if block.dimension() == 0 {
                return Err(BasisError::EmptyBlock(block.block_id));
            }
            offsets.push(dimension);
            dimension += block.dimension();
        }
        Ok(Self {
            blocks,
            offsets,
            dimension,
        })
    }

    /// A basis made of one block of `dimension` states
    ///
    /// Used for small dense problems that do not need a partition.
    pub fn single_block(dimension: usize) -> Result<Self> {
        Self::new(vec![BasisBlock {
            block_id: 0,
            proton_energy: 0,
            neutron_energy: 0,
            proton_m2: 0,
            neutron_m2: 0,
            num_protons: 0,
            num_neutrons: 0,
            proton_dimension: 1,
            neutron_dimension: dimension,
        }])
    }

    pub fn blocks(&self) -> &[BasisBlock] {
        &self.blocks
    }

    pub fn block(&self, block_id: BlockId) -> Option<&BasisBlock> {
        self.blocks.get(block_id)
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total number of many-body states
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Position of the first amplitude of `block_id` in the full vector
    pub fn offset(&self, block_id: BlockId) -> Option<usize> {
        self.offsets.get(block_id).copied()
    }
}
