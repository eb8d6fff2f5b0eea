/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! M-scheme partition counting
//!
//! Counts the Slater determinants of one particle species by excitation
//! energy and total projection, and combines proton and neutron counts into
//! the block partition of the full basis. Energies are oscillator quanta
//! measured from the lowest configuration.

use super::block::{Basis, BasisBlock};
use super::errors::{BasisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single-particle m-substate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orbital {
    /// Oscillator quanta of the shell the state belongs to
    pub energy: u32,
    /// Twice the projection `m`
    pub m2: i32,
}

/// A `j` shell with its oscillator energy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shell {
    pub energy: u32,
    /// Twice the angular momentum `j`; must be odd
    pub j2: u32,
}

/// Expand shells into their `2j + 1` m-substates
pub fn shell_orbitals(shells: &[Shell]) -> Result<Vec<Orbital>> {
    let mut orbitals = Vec::new();
    for shell in shells {
        if shell.j2 % 2 == 0 {
            return Err(BasisError::InvalidSpace(format!(
                "shell with 2j = {} is not a half-integer shell",
                shell.j2
            )));
        }
        let j2 = shell.j2 as i32;
        orbitals.extend((-j2..=j2).step_by(2).map(|m2| Orbital {
            energy: shell.energy,
            m2,
        }));
    }
    Ok(orbitals)
}

/// Single-particle space and particle number of one species
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesSpace {
    pub orbitals: Vec<Orbital>,
    pub particles: u32,
}

impl SpeciesSpace {
    /// Number of determinants per `(excitation energy, 2M)`
    pub fn partition_counts(&self) -> Result<BTreeMap<(u32, i32), usize>> {
        let particles = self.particles as usize;
        if particles > self.orbitals.len() {
            return Err(BasisError::InvalidSpace(format!(
                "{} particles do not fit into {} orbitals",
                particles,
                self.orbitals.len()
            )));
        }

        // counts[k] maps (energy sum, 2M) of k-particle determinants to their number
        let mut counts: Vec<BTreeMap<(u32, i32), usize>> = vec![BTreeMap::new(); particles + 1];
        counts[0].insert((0, 0), 1);
        for orbital in &self.orbitals {
            for k in (1..=particles).rev() {
                let (lower, upper) = counts.split_at_mut(k);
                for (&(energy, m2), &count) in &lower[k - 1] {
                    *upper[0]
                        .entry((energy + orbital.energy, m2 + orbital.m2))
                        .or_insert(0) += count;
                }
            }
        }

        let mut energies: Vec<u32> = self.orbitals.iter().map(|o| o.energy).collect();
        energies.sort_unstable();
        let ground: u32 = energies.iter().take(particles).sum();

        Ok(counts[particles]
            .iter()
            .map(|(&(energy, m2), &count)| ((energy - ground, m2), count))
            .collect())
    }
}

/// Partition the M-scheme basis of fixed `2M` truncated at `max_excitation` quanta
///
/// # Arguments
///
/// * `protons` - Proton single-particle space and particle number
/// * `neutrons` - Neutron single-particle space and particle number
/// * `total_m2` - Twice the total projection of the basis
/// * `max_excitation` - Largest allowed `Ep + En`
pub fn mscheme_basis(
    protons: &SpeciesSpace,
    neutrons: &SpeciesSpace,
    total_m2: i32,
    max_excitation: u32,
) -> Result<Basis> {
    let proton_counts = protons.partition_counts()?;
    let neutron_counts = neutrons.partition_counts()?;

    let mut blocks = Vec::new();
    for (&(proton_energy, proton_m2), &proton_dimension) in &proton_counts {
        if proton_energy > max_excitation {
            continue;
        }
        let neutron_m2 = total_m2 - proton_m2;
        for (&(neutron_energy, m2), &neutron_dimension) in &neutron_counts {
            if m2 != neutron_m2 || proton_energy + neutron_energy > max_excitation {
                continue;
            }
            blocks.push(BasisBlock {
                block_id: blocks.len(),
                proton_energy,
                neutron_energy,
                proton_m2,
                neutron_m2,
                num_protons: protons.particles,
                num_neutrons: neutrons.particles,
                proton_dimension,
                neutron_dimension,
            });
        }
    }
    Basis::new(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(space: &SpeciesSpace) -> BTreeMap<(u32, i32), usize> {
        let n = space.orbitals.len();
        let mut raw: BTreeMap<(u32, i32), usize> = BTreeMap::new();
        for mask in 0u32..(1 << n) {
            if mask.count_ones() != space.particles {
                continue;
            }
            let (mut energy, mut m2) = (0u32, 0i32);
            for (i, orbital) in space.orbitals.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    energy += orbital.energy;
                    m2 += orbital.m2;
                }
            }
            *raw.entry((energy, m2)).or_insert(0) += 1;
        }
        let ground = raw.keys().map(|(e, _)| *e).min().unwrap_or(0);
        raw.into_iter().map(|((e, m), c)| ((e - ground, m), c)).collect()
    }

    fn p_and_sd_shells() -> Vec<Orbital> {
        shell_orbitals(&[
            Shell { energy: 1, j2: 3 },
            Shell { energy: 1, j2: 1 },
            Shell { energy: 2, j2: 5 },
        ])
        .unwrap()
    }

    #[test]
    fn test_shell_expansion_counts_substates() {
        assert_eq!(p_and_sd_shells().len(), 12);
        assert!(shell_orbitals(&[Shell { energy: 0, j2: 2 }]).is_err());
    }

    #[test]
    fn test_partition_counts_match_brute_force() {
        for particles in 0..=4 {
            let space = SpeciesSpace {
                orbitals: p_and_sd_shells(),
                particles,
            };
            assert_eq!(space.partition_counts().unwrap(), brute_force(&space));
        }
    }

    #[test]
    fn test_mscheme_basis_respects_projection_and_truncation() {
        let protons = SpeciesSpace {
            orbitals: p_and_sd_shells(),
            particles: 2,
        };
        let neutrons = SpeciesSpace {
            orbitals: p_and_sd_shells(),
            particles: 1,
        };
        let basis = mscheme_basis(&protons, &neutrons, 1, 2).unwrap();
        assert!(!basis.is_empty());
        for block in basis.blocks() {
            assert_eq!(block.total_m2(), 1);
            assert!(block.energy() <= 2);
        }

        let full = brute_force(&protons);
        let expected: usize = full
            .iter()
            .flat_map(|(&(ep, mp), &cp)| {
                brute_force(&neutrons)
                    .into_iter()
                    .filter(move |&((en, mn), _)| mp + mn == 1 && ep + en <= 2)
                    .map(move |(_, cn)| cp * cn)
            })
            .sum();
        assert_eq!(basis.dimension(), expected);
    }

    #[test]
    fn test_too_many_particles_is_rejected() {
        let space = SpeciesSpace {
            orbitals: shell_orbitals(&[Shell { energy: 0, j2: 1 }]).unwrap(),
            particles: 3,
        };
        assert!(space.partition_counts().is_err());
    }
}
