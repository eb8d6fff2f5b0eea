/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Replays an execution order once per matrix-vector product
//!
//! Instructions are split by the output block they accumulate into. Each
//! partition runs sequentially in execution order on one rayon worker, and
//! partitions run concurrently. Accumulation into a block therefore always
//! happens in the same order, and the product is bit-identical for any number
//! of threads.

use super::errors::{Result, ScheduleError};
use super::instruction::Instruction;
use super::order::ExecutionOrder;
use crate::basis::{Basis, BlockId, CombinationTable};
use crate::memory::{BlockCache, CacheKey, MemoryManager, Payload};
use crate::multiply::{Accumulator, BlockShape, Kernel, Operand};
use crate::operator::{self, LinearOperator};
use crate::vector::BlockVector;
use log::info;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Out-of-core Hamiltonian: an execution order served by a block cache
pub struct Scheduler<C: BlockCache> {
    basis: Arc<Basis>,
    order: Mutex<ExecutionOrder>,
    cache: Arc<C>,
    pool: Option<ThreadPool>,
}

impl Scheduler<MemoryManager> {
    /// Scheduler over a [`MemoryManager`] reading blocks from `matrix_directory`
    pub fn with_memory_manager(
        table: &CombinationTable,
        order: ExecutionOrder,
        matrix_directory: impl Into<PathBuf>,
        maximum_loaded_memory: usize,
        num_threads: Option<usize>,
    ) -> Result<Self> {
        let cache = MemoryManager::new(
            table.basis().clone(),
            matrix_directory,
            maximum_loaded_memory,
            order.usage_index(),
        );
        Self::new(table, order, Arc::new(cache), num_threads)
    }
}

impl<C: BlockCache> Scheduler<C> {
    /// `num_threads` of `None` uses the global rayon pool
    pub fn new(
        table: &CombinationTable,
        order: ExecutionOrder,
        cache: Arc<C>,
        num_threads: Option<usize>,
    ) -> Result<Self> {
        order.validate(table)?;
        let pool = num_threads
            .map(|threads| ThreadPoolBuilder::new().num_threads(threads).build())
            .transpose()?;
        Ok(Self {
            basis: table.basis().clone(),
            order: Mutex::new(order),
            cache,
            pool,
        })
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// `output = H * input`
    pub fn multiply(&self, input: &BlockVector, output: &BlockVector) -> Result<()> {
        for vector in [input, output] {
            if **vector.basis() != *self.basis {
                return Err(ScheduleError::DimensionMismatch(format!(
                    "{} has dimension {}, scheduled basis has {}",
                    vector.directory().display(),
                    vector.dimension(),
                    self.basis.dimension()
                )));
            }
        }

        let started = Instant::now();
        let partitions = self.partitions()?;
        self.cache.begin_pass(input, output)?;
        let run = || {
            partitions.par_iter().try_for_each(|partition| {
                partition
                    .iter()
                    .try_for_each(|(position, instruction)| self.execute(*position, instruction))
            })
        };
        match &self.pool {
            Some(pool) => pool.install(run)?,
            None => run()?,
        }
        self.cache.finish_pass()?;

        info!(
            "multiplied {} output blocks in {:.3?}",
            partitions.len(),
            started.elapsed()
        );
        Ok(())
    }

    /// Walk the order once, grouping instructions by output block
    fn partitions(&self) -> Result<Vec<Vec<(usize, Instruction)>>> {
        let mut order = self.order.lock().map_err(|_| ScheduleError::Poisoned)?;
        order.reset_execution_order();
        let mut groups: BTreeMap<BlockId, Vec<(usize, Instruction)>> = BTreeMap::new();
        while let Some((position, instruction)) = order.next_instruction() {
            groups
                .entry(instruction.output_block)
                .or_default()
                .push((position, instruction));
        }
        Ok(groups.into_values().collect())
    }

    fn execute(&self, position: usize, instruction: &Instruction) -> Result<()> {
        if instruction.is_unload() {
            self.cache.unload_output_vector(instruction.output_block)?;
            return Ok(());
        }

        let keys = instruction.cache_keys();
        let payloads = self.cache.request(&keys, position)?;
        let outcome = self.run_kernel(position, instruction, &keys, payloads);
        let released = self.cache.release_all(&keys, position);
        outcome?;
        released?;
        Ok(())
    }

    fn shape(&self, position: usize, block_id: BlockId) -> Result<BlockShape> {
        self.basis
            .block(block_id)
            .map(BlockShape::from)
            .ok_or_else(|| ScheduleError::InvalidInstruction {
                position,
                reason: format!("basis has no block {}", block_id),
            })
    }

    fn run_kernel(
        &self,
        position: usize,
        instruction: &Instruction,
        keys: &[CacheKey],
        payloads: Vec<Payload>,
    ) -> Result<()> {
        let mut input = None;
        let mut output = None;
        let mut matrix = None;
        let mut neutrons = None;
        let mut protons = None;
        for (key, payload) in keys.iter().zip(payloads) {
            match payload {
                Payload::InputVector(block) => input = Some(block),
                Payload::OutputVector(block) => output = Some(block),
                Payload::MatrixBlock(block) => matrix = Some(block),
                Payload::IndexList(list) => {
                    if instruction.neutron_list == Some(key.id) {
                        neutrons = Some(Arc::clone(&list));
                    }
                    if instruction.proton_list == Some(key.id) {
                        protons = Some(list);
                    }
                }
            }
        }

        let missing = |key: CacheKey| ScheduleError::MissingPayload { position, key };
        let input = input.ok_or_else(|| missing(CacheKey::input_vector(instruction.input_block)))?;
        let output =
            output.ok_or_else(|| missing(CacheKey::output_vector(instruction.output_block)))?;
        let matrix = matrix.ok_or_else(|| {
            missing(CacheKey::matrix_block(instruction.matrix_id.unwrap_or_default()))
        })?;
        let kind = instruction
            .kind
            .coupling_kind()
            .ok_or_else(|| ScheduleError::InvalidInstruction {
                position,
                reason: "unload has no kernel".to_string(),
            })?;

        let input_shape = self.shape(position, instruction.input_block)?;
        let output_shape = self.shape(position, instruction.output_block)?;
        let mut target = output.lock().map_err(|_| ScheduleError::Poisoned)?;
        Kernel::select(kind, instruction.variant).run(
            &matrix,
            neutrons.as_deref(),
            protons.as_deref(),
            Operand {
                data: input.as_slice(),
                shape: input_shape,
            },
            Accumulator {
                data: target.as_mut_slice(),
                shape: output_shape,
            },
        )?;
        Ok(())
    }
}

impl<C: BlockCache> LinearOperator for Scheduler<C> {
    fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }

    fn apply(&self, input: &BlockVector, output: &BlockVector) -> operator::Result<()> {
        Ok(self.multiply(input, output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BasisBlock, Coupling, CouplingKind};
    use crate::storage::{
        index_list_path, matrix_block_path, IndexList, IndexTriple, MatrixBlock, Sign,
    };
    use tempfile::tempdir;

    /// Two blocks of two states coupled by neutron blocks:
    /// H = [[1, 2, 0, 5], [2, 1, 0, 0], [0, 0, 3, 0], [5, 0, 0, 3]]
    fn fixture(dir: &std::path::Path) -> CombinationTable {
        let block = |block_id| BasisBlock {
            block_id,
            proton_energy: 0,
            neutron_energy: 0,
            proton_m2: 0,
            neutron_m2: 0,
            num_protons: 0,
            num_neutrons: 2,
            proton_dimension: 1,
            neutron_dimension: 2,
        };
        let basis = Basis::new(vec![block(0), block(1)]).unwrap();

        MatrixBlock::column(0, vec![1.0, 2.0])
            .write(&matrix_block_path(dir, 0))
            .unwrap();
        MatrixBlock::column(1, vec![3.0]).write(&matrix_block_path(dir, 1)).unwrap();
        MatrixBlock::column(2, vec![5.0]).write(&matrix_block_path(dir, 2)).unwrap();
        let list = |triples: Vec<IndexTriple>| IndexList::new(triples);
        list(vec![
            IndexTriple::new(0, 0, 0, Sign::Pos),
            IndexTriple::new(1, 1, 0, Sign::Pos),
            IndexTriple::new(0, 1, 1, Sign::Pos),
            IndexTriple::new(1, 0, 1, Sign::Pos),
        ])
        .write_binary(&index_list_path(dir, 0))
        .unwrap();
        list(vec![
            IndexTriple::new(0, 0, 0, Sign::Pos),
            IndexTriple::new(1, 1, 0, Sign::Pos),
        ])
        .write_binary(&index_list_path(dir, 1))
        .unwrap();
        list(vec![IndexTriple::new(0, 1, 0, Sign::Pos)])
            .write_binary(&index_list_path(dir, 2))
            .unwrap();

        let coupling = |bra, ket, id| Coupling {
            kind: CouplingKind::Neutron,
            bra,
            ket,
            matrix_id: id,
            neutron_list: Some(id),
            proton_list: None,
        };
        CombinationTable::new(basis, vec![coupling(0, 0, 0), coupling(1, 1, 1), coupling(0, 1, 2)])
            .unwrap()
    }

    #[test]
    fn test_product_uses_both_triangles() {
        let dir = tempdir().unwrap();
        let table = fixture(dir.path());
        let order = ExecutionOrder::build(&table);
        let scheduler =
            Scheduler::with_memory_manager(&table, order, dir.path(), 1 << 20, Some(2)).unwrap();

        let basis = table.basis().clone();
        let x = BlockVector::from_dense(dir.path().join("x"), basis.clone(), &[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        let y = BlockVector::create(dir.path().join("y"), basis).unwrap();
        scheduler.multiply(&x, &y).unwrap();
        assert_eq!(y.to_dense().unwrap(), vec![25.0, 4.0, 9.0, 17.0]);

        // second pass reuses the cached matrix blocks
        scheduler.multiply(&x, &y).unwrap();
        assert_eq!(y.to_dense().unwrap(), vec![25.0, 4.0, 9.0, 17.0]);
        assert!(scheduler.cache().statistics().unwrap().hits > 0);
    }

    #[test]
    fn test_vector_on_other_basis_is_rejected() {
        let dir = tempdir().unwrap();
        let table = fixture(dir.path());
        let order = ExecutionOrder::build(&table);
        let scheduler =
            Scheduler::with_memory_manager(&table, order, dir.path(), 1 << 20, None).unwrap();
        let other = Arc::new(Basis::single_block(4).unwrap());
        let x = BlockVector::create(dir.path().join("x"), other.clone()).unwrap();
        let y = BlockVector::create(dir.path().join("y"), other).unwrap();
        assert!(matches!(
            scheduler.multiply(&x, &y),
            Err(ScheduleError::DimensionMismatch(_))
        ));
    }
}
