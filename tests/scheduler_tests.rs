/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

mod common;

use approx::assert_relative_eq;
use common::random_fixture;
use mscheme_rs::memory::{BlockCache, CacheKey, MemoryError, MemoryManager};
use mscheme_rs::schedule::{ExecutionOrder, InstructionKind, Scheduler};
use mscheme_rs::storage::{index_list_path, matrix_block_path, IndexList, MatrixBlock, VectorBlock};
use mscheme_rs::vector::BlockVector;
use rstest::rstest;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn input_values(dimension: usize) -> Vec<f64> {
    (0..dimension).map(|i| ((i * 7 + 3) % 11) as f64 - 5.0).collect()
}

fn product(dir: &Path, seed: u64, threads: usize, budget: usize) -> (Vec<f64>, Vec<f64>) {
    let fixture = random_fixture(dir, seed);
    let basis = fixture.table.basis().clone();
    let order = ExecutionOrder::build(&fixture.table);
    let scheduler =
        Scheduler::with_memory_manager(&fixture.table, order, dir, budget, Some(threads)).unwrap();

    let x = input_values(fixture.dimension());
    let input = BlockVector::from_dense(dir.join("x"), basis.clone(), &x).unwrap();
    let output = BlockVector::create(dir.join(format!("y_{}", threads)), basis).unwrap();
    scheduler.multiply(&input, &output).unwrap();
    (output.to_dense().unwrap(), fixture.apply(&x))
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(42)]
#[case(2024)]
fn test_product_matches_dense_reference(#[case] seed: u64) {
    let dir = tempdir().unwrap();
    let (result, expected) = product(dir.path(), seed, 3, 1 << 20);
    assert_eq!(result.len(), expected.len());
    for (a, b) in result.iter().zip(&expected) {
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }
}

#[rstest]
#[case(5)]
#[case(99)]
fn test_product_is_bit_identical_across_thread_counts(#[case] seed: u64) {
    let dir = tempdir().unwrap();
    let (single, _) = product(dir.path(), seed, 1, 1 << 20);
    for threads in [2, 4, 8] {
        let (parallel, _) = product(dir.path(), seed, threads, 1 << 20);
        assert_eq!(single, parallel, "{} threads", threads);
    }
}

/// Bytes needed by the largest instruction of an order
fn largest_instruction(dir: &Path, order: &ExecutionOrder, basis: &mscheme_rs::basis::Basis) -> usize {
    order
        .instructions()
        .iter()
        .filter(|instruction| !instruction.is_unload())
        .map(|instruction| {
            let vector = |id: usize| VectorBlock::payload_bytes(basis.block(id).unwrap().dimension());
            let mut bytes = vector(instruction.input_block) + vector(instruction.output_block);
            if let Some(id) = instruction.matrix_id {
                bytes += MatrixBlock::read(&matrix_block_path(dir, id), id)
                    .unwrap()
                    .byte_size();
            }
            for id in [instruction.neutron_list, instruction.proton_list]
                .into_iter()
                .flatten()
            {
                bytes += IndexList::read_binary(&index_list_path(dir, id))
                    .unwrap()
                    .byte_size();
            }
            bytes
        })
        .max()
        .unwrap()
}

#[test]
fn test_tight_budget_gives_same_product() {
    let dir = tempdir().unwrap();
    let fixture = random_fixture(dir.path(), 11);
    let basis = fixture.table.basis().clone();
    let order = ExecutionOrder::build(&fixture.table);
    let budget = largest_instruction(dir.path(), &order, &basis);

    let cache = Arc::new(MemoryManager::new(
        basis.clone(),
        dir.path(),
        budget,
        order.usage_index(),
    ));
    let scheduler = Scheduler::new(&fixture.table, order, cache.clone(), Some(2)).unwrap();

    let x = input_values(fixture.dimension());
    let input = BlockVector::from_dense(dir.path().join("x"), basis.clone(), &x).unwrap();
    let output = BlockVector::create(dir.path().join("y"), basis).unwrap();
    for _ in 0..2 {
        scheduler.multiply(&input, &output).unwrap();
        let result = output.to_dense().unwrap();
        for (a, b) in result.iter().zip(fixture.apply(&x)) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
    }

    let statistics = cache.statistics().unwrap();
    assert!(statistics.peak_resident_bytes <= budget);
    assert!(statistics.evictions > 0);
}

#[test]
fn test_budget_smaller_than_one_instruction_fails() {
    let dir = tempdir().unwrap();
    let fixture = random_fixture(dir.path(), 3);
    let basis = fixture.table.basis().clone();
    let order = ExecutionOrder::build(&fixture.table);
    let scheduler = Scheduler::with_memory_manager(&fixture.table, order, dir.path(), 64, None).unwrap();
    let input = BlockVector::from_dense(
        dir.path().join("x"),
        basis.clone(),
        &input_values(basis.dimension()),
    )
    .unwrap();
    let output = BlockVector::create(dir.path().join("y"), basis).unwrap();
    assert!(scheduler.multiply(&input, &output).is_err());
}

#[test]
fn test_missing_matrix_block_is_fatal() {
    let dir = tempdir().unwrap();
    let fixture = random_fixture(dir.path(), 8);
    std::fs::remove_file(matrix_block_path(dir.path(), 4)).unwrap();
    let basis = fixture.table.basis().clone();
    let order = ExecutionOrder::build(&fixture.table);
    let scheduler =
        Scheduler::with_memory_manager(&fixture.table, order, dir.path(), 1 << 20, Some(2)).unwrap();
    let input = BlockVector::from_dense(
        dir.path().join("x"),
        basis.clone(),
        &input_values(basis.dimension()),
    )
    .unwrap();
    let output = BlockVector::create(dir.path().join("y"), basis).unwrap();
    let error = scheduler.multiply(&input, &output).unwrap_err();
    assert!(error.to_string().contains("matrix_000004"), "{}", error);
}

#[test]
fn test_order_structure() {
    let dir = tempdir().unwrap();
    let fixture = random_fixture(dir.path(), 1);
    let order = ExecutionOrder::build(&fixture.table);
    let couplings = fixture.table.couplings();
    let off_diagonal = couplings.iter().filter(|c| c.bra != c.ket).count();
    let multiplies = order.len() - order.count(InstructionKind::Unload);
    assert_eq!(multiplies, couplings.len() + off_diagonal);
    assert_eq!(order.count(InstructionKind::Unload), fixture.table.basis().len());

    // every block is unloaded once, after the last instruction writing it
    for block in 0..fixture.table.basis().len() {
        let positions: Vec<usize> = order
            .instructions()
            .iter()
            .enumerate()
            .filter(|(_, instruction)| instruction.output_block == block)
            .map(|(position, _)| position)
            .collect();
        let last = *positions.last().unwrap();
        assert!(order.instructions()[last].is_unload());
        assert_eq!(
            positions
                .iter()
                .filter(|&&p| order.instructions()[p].is_unload())
                .count(),
            1
        );
    }

    let usage = order.usage_index();
    let first_matrix = CacheKey::matrix_block(0);
    assert!(usage.first_use(&first_matrix).is_some());
}

#[test]
fn test_saved_order_replays_identically() {
    let dir = tempdir().unwrap();
    let fixture = random_fixture(dir.path(), 17);
    let order = ExecutionOrder::build(&fixture.table);
    let path = dir.path().join("order.json");
    order.write(&path).unwrap();
    let loaded = ExecutionOrder::from_file(&path).unwrap();
    assert_eq!(loaded.instructions(), order.instructions());
    loaded.validate(&fixture.table).unwrap();
}

#[test]
fn test_cache_trait_object() {
    let dir = tempdir().unwrap();
    let fixture = random_fixture(dir.path(), 2);
    let order = ExecutionOrder::build(&fixture.table);
    let cache: Arc<dyn BlockCache> = Arc::new(MemoryManager::new(
        fixture.table.basis().clone(),
        dir.path(),
        1 << 20,
        order.usage_index(),
    ));
    // index lists and matrix blocks live outside any pass, vector blocks do not
    let matrix = cache.request_matrix_block(0, 0).unwrap();
    assert_eq!(matrix.matrix_id(), 0);
    cache.release(CacheKey::matrix_block(0), 0).unwrap();
    assert!(matches!(
        cache.request_input_vector(0, 0),
        Err(MemoryError::NoActivePass)
    ));
}
