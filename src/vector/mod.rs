/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Disk-backed block vectors
//!
//! A [`BlockVector`] is a full many-body vector stored as one file per basis
//! block inside its own directory. The arithmetic needed by the Lanczos
//! iteration streams the blocks from disk, works on them in parallel, and
//! reduces per-block partial results in block order so that every result is
//! independent of the number of threads.

mod errors;

pub use errors::{Result, VectorError};

use crate::basis::{Basis, BlockId};
use crate::storage::VectorBlock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Path of the file holding `block_id` inside a vector directory
pub fn vector_block_path(directory: &Path, block_id: BlockId) -> PathBuf {
    directory.join(format!("block_{:06}.vec", block_id))
}

/// A vector over a partitioned basis whose blocks live on disk
#[derive(Debug, Clone)]
pub struct BlockVector {
    directory: PathBuf,
    basis: Arc<Basis>,
}

impl BlockVector {
    /// Create the directory of a new vector; existing block files are kept
    pub fn create(directory: impl Into<PathBuf>, basis: Arc<Basis>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|source| VectorError::Directory {
            path: directory.clone(),
            source,
        })?;
        Ok(Self { directory, basis })
    }

    /// Refer to a vector that already exists on disk
    pub fn open(directory: impl Into<PathBuf>, basis: Arc<Basis>) -> Self {
        Self {
            directory: directory.into(),
            basis,
        }
    }

    /// Create a vector from a dense array of amplitudes
    pub fn from_dense(
        directory: impl Into<PathBuf>,
        basis: Arc<Basis>,
        values: &[f64],
    ) -> Result<Self> {
        let vector = Self::create(directory, basis)?;
        vector.write_dense(values)?;
        Ok(vector)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }

    /// Total number of amplitudes
    pub fn dimension(&self) -> usize {
        self.basis.dimension()
    }

    pub fn block_path(&self, block_id: BlockId) -> PathBuf {
        vector_block_path(&self.directory, block_id)
    }

    /// Load one block, checking its length against the basis
    pub fn read_block(&self, block_id: BlockId) -> Result<VectorBlock> {
        let len = self.block_dimension(block_id)?;
        Ok(VectorBlock::read(&self.block_path(block_id), block_id, len)?)
    }

    /// Store one block
    pub fn write_block(&self, block: &VectorBlock) -> Result<()> {
        let len = self.block_dimension(block.block_id())?;
        if block.len() != len {
            return Err(VectorError::DimensionMismatch(format!(
                "block {} has {} amplitudes, basis block has {}",
                block.block_id(),
                block.len(),
                len
            )));
        }
        Ok(block.write(&self.block_path(block.block_id()))?)
    }

    fn block_dimension(&self, block_id: BlockId) -> Result<usize> {
        self.basis
            .block(block_id)
            .map(|block| block.dimension())
            .ok_or_else(|| {
                VectorError::DimensionMismatch(format!("basis has no block {}", block_id))
            })
    }

    fn check_compatible(&self, other: &BlockVector) -> Result<()> {
        if Arc::ptr_eq(&self.basis, &other.basis) || *self.basis == *other.basis {
            Ok(())
        } else {
            Err(VectorError::DimensionMismatch(format!(
                "{} and {} live on different bases",
                self.directory.display(),
                other.directory.display()
            )))
        }
    }

    fn block_ids(&self) -> impl ParallelIterator<Item = BlockId> {
        (0..self.basis.len()).into_par_iter()
    }

    /// Write every block from a function of `(block id, index within block)`
    pub fn fill_with<F>(&self, value: F) -> Result<()>
    where
        F: Fn(BlockId, usize) -> f64 + Sync,
    {
        self.block_ids().try_for_each(|block_id| {
            let len = self.block_dimension(block_id)?;
            let data = (0..len).map(|index| value(block_id, index)).collect();
            self.write_block(&VectorBlock::from_vec(block_id, data))
        })
    }

    /// Set every amplitude to zero
    pub fn fill_zero(&self) -> Result<()> {
        self.fill_with(|_, _| 0.0)
    }

    /// Fill with uniform values in `[-1, 1)`
    ///
    /// Each block draws from its own generator seeded by `seed` and the block
    /// id, so the vector does not depend on the order blocks are written in.
    pub fn fill_random(&self, seed: u64) -> Result<()> {
        self.block_ids().try_for_each(|block_id| {
            let len = self.block_dimension(block_id)?;
            let mut rng = StdRng::seed_from_u64(seed ^ (block_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let data = (0..len).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect();
            self.write_block(&VectorBlock::from_vec(block_id, data))
        })
    }

    /// Inner product `<self, other>`
    pub fn dot(&self, other: &BlockVector) -> Result<f64> {
        self.check_compatible(other)?;
        let partial = self
            .block_ids()
            .map(|block_id| {
                let a = self.read_block(block_id)?;
                let b = other.read_block(block_id)?;
                Ok(dot_slices(a.as_slice(), b.as_slice()))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(partial.into_iter().sum())
    }

    /// Inner products of `self` with each of `others`, reading `self` once per block
    pub fn dot_many(&self, others: &[&BlockVector]) -> Result<Vec<f64>> {
        for other in others {
            self.check_compatible(other)?;
        }
        let partial = self
            .block_ids()
            .map(|block_id| {
                let a = self.read_block(block_id)?;
                others
                    .iter()
                    .map(|other| {
                        let b = other.read_block(block_id)?;
                        Ok(dot_slices(a.as_slice(), b.as_slice()))
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let mut totals = vec![0.0; others.len()];
        for block in partial {
            for (total, value) in totals.iter_mut().zip(block) {
                *total += value;
            }
        }
        Ok(totals)
    }

    /// Euclidean norm
    pub fn norm(&self) -> Result<f64> {
        Ok(self.dot(self)?.sqrt())
    }

    /// `self *= factor`
    pub fn scale(&self, factor: f64) -> Result<()> {
        self.block_ids().try_for_each(|block_id| {
            let mut block = self.read_block(block_id)?;
            block.as_mut_slice().iter_mut().for_each(|x| *x *= factor);
            self.write_block(&block)
        })
    }

    /// `self += alpha * x`
    pub fn axpy(&self, alpha: f64, x: &BlockVector) -> Result<()> {
        self.add_combination(&[(alpha, x)])
    }

    /// `self += sum_i c_i * v_i`, streaming every block once
    pub fn add_combination(&self, terms: &[(f64, &BlockVector)]) -> Result<()> {
        for (_, vector) in terms {
            self.check_compatible(vector)?;
        }
        self.block_ids().try_for_each(|block_id| {
            let mut block = self.read_block(block_id)?;
            for (coefficient, vector) in terms {
                if *coefficient == 0.0 {
                    continue;
                }
                let other = vector.read_block(block_id)?;
                for (y, x) in block.as_mut_slice().iter_mut().zip(other.as_slice()) {
                    *y += coefficient * x;
                }
            }
            self.write_block(&block)
        })
    }

    /// Overwrite `self` with the amplitudes of `other`
    pub fn copy_from(&self, other: &BlockVector) -> Result<()> {
        self.check_compatible(other)?;
        self.block_ids()
            .try_for_each(|block_id| self.write_block(&other.read_block(block_id)?))
    }

    /// Overwrite every block from a dense array ordered by basis offset
    pub fn write_dense(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.basis.dimension() {
            return Err(VectorError::DimensionMismatch(format!(
                "{} values for basis dimension {}",
                values.len(),
                self.basis.dimension()
            )));
        }
        self.fill_with(|block_id, index| {
            let offset = self.basis.offset(block_id).unwrap_or(0);
            values[offset + index]
        })
    }

    /// Gather all blocks into one dense array ordered by basis offset
    pub fn to_dense(&self) -> Result<Vec<f64>> {
        let mut dense = Vec::with_capacity(self.basis.dimension());
        for block_id in 0..self.basis.len() {
            dense.extend_from_slice(self.read_block(block_id)?.as_slice());
        }
        Ok(dense)
    }

    /// Delete the vector directory and its blocks
    pub fn remove(self) -> Result<()> {
        std::fs::remove_dir_all(&self.directory).map_err(|source| VectorError::Directory {
            path: self.directory.clone(),
            source,
        })
    }
}

#[inline]
fn dot_slices(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BasisBlock;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn basis() -> Arc<Basis> {
        let block = |block_id, proton_dimension, neutron_dimension| BasisBlock {
            block_id,
            proton_energy: 0,
            neutron_energy: 0,
            proton_m2: 0,
            neutron_m2: 0,
            num_protons: 1,
            num_neutrons: 1,
            proton_dimension,
            neutron_dimension,
        };
        Arc::new(Basis::new(vec![block(0, 1, 2), block(1, 2, 2), block(2, 1, 1)]).unwrap())
    }

    #[test]
    fn test_dense_roundtrip_follows_basis_offsets() {
        let dir = tempdir().unwrap();
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let v = BlockVector::from_dense(dir.path().join("v"), basis(), &values).unwrap();
        assert_eq!(v.read_block(1).unwrap().as_slice(), &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(v.to_dense().unwrap(), values.to_vec());
    }

    #[test]
    fn test_arithmetic_matches_dense_reference() {
        let dir = tempdir().unwrap();
        let a = [1.0, -2.0, 0.5, 3.0, 1.0, -1.0, 2.0];
        let b = [0.0, 1.0, 2.0, -1.0, 4.0, 0.5, 1.0];
        let va = BlockVector::from_dense(dir.path().join("a"), basis(), &a).unwrap();
        let vb = BlockVector::from_dense(dir.path().join("b"), basis(), &b).unwrap();

        let expected: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert_relative_eq!(va.dot(&vb).unwrap(), expected, epsilon = 1e-12);
        assert_eq!(va.dot_many(&[&va, &vb]).unwrap()[1], va.dot(&vb).unwrap());

        va.axpy(2.0, &vb).unwrap();
        let updated = va.to_dense().unwrap();
        for i in 0..a.len() {
            assert_relative_eq!(updated[i], a[i] + 2.0 * b[i], epsilon = 1e-12);
        }

        vb.scale(-0.5).unwrap();
        assert_relative_eq!(vb.to_dense().unwrap()[4], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_random_fill_is_reproducible() {
        let dir = tempdir().unwrap();
        let v1 = BlockVector::create(dir.path().join("v1"), basis()).unwrap();
        let v2 = BlockVector::create(dir.path().join("v2"), basis()).unwrap();
        v1.fill_random(7).unwrap();
        v2.fill_random(7).unwrap();
        assert_eq!(v1.to_dense().unwrap(), v2.to_dense().unwrap());
        assert!(v1.norm().unwrap() > 0.0);
    }

    #[test]
    fn test_missing_block_is_an_error() {
        let dir = tempdir().unwrap();
        let v = BlockVector::open(dir.path().join("nothing"), basis());
        assert!(matches!(v.read_block(0), Err(VectorError::Storage(_))));
    }
}
