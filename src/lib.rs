/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! # mscheme-rs
//!
//! Out-of-core Lanczos diagonalization of M-scheme nuclear shell-model
//! Hamiltonians whose matrix is stored as block files on disk.
//!
//! A precomputed [`schedule::ExecutionOrder`] lists every block product of
//! one matrix-vector multiplication. The [`schedule::Scheduler`] replays it
//! while the [`memory::MemoryManager`] keeps matrix blocks, index lists and
//! vector blocks under a fixed byte budget, and the [`lanczos`] solver builds
//! its Krylov space from the products.

pub mod basis;
pub mod cli;
pub mod config;
pub mod lanczos;
pub mod memory;
pub mod multiply;
pub mod operator;
pub mod schedule;
pub mod storage;
pub mod vector;

use anyhow::Context;
use basis::CombinationTable;
use config::RunConfig;
use lanczos::{Eigensystem, LanczosEnvironment};
use log::info;
use schedule::{ExecutionOrder, Scheduler};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// One diagonalization described by a [`RunConfig`]
pub struct Pipeline<'a> {
    config: &'a RunConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Load the table and order, diagonalize, and write the requested outputs
    pub fn run(&self) -> anyhow::Result<Eigensystem> {
        let config = self.config;
        config.validate()?;

        let table = CombinationTable::from_file(&config.combination_table)?;
        let order = match &config.execution_order {
            Some(path) => ExecutionOrder::from_file(path)?,
            None => ExecutionOrder::build(&table),
        };
        info!(
            "basis of {} blocks, dimension {}, {} instructions",
            table.basis().len(),
            table.basis().dimension(),
            order.len()
        );

        let scheduler = Scheduler::with_memory_manager(
            &table,
            order,
            &config.matrix_directory,
            config.maximum_loaded_memory,
            config.num_threads,
        )?;

        let mut settings = config.lanczos.clone();
        settings.krylov_directory = config.krylov_directory();
        let eigensystem = LanczosEnvironment::new(&scheduler, settings)?.diagonalize()?;

        let statistics = scheduler
            .cache()
            .statistics()
            .context("reading cache statistics")?;
        info!(
            "peak resident memory {} of {} bytes, {} bytes loaded",
            statistics.peak_resident_bytes, config.maximum_loaded_memory, statistics.bytes_loaded
        );

        if let Some(path) = &config.eigenvalues_output {
            eigensystem.write_eigenvalues_json(path)?;
        }
        if let Some(path) = &config.eigenvectors_output {
            eigensystem.write_eigenvectors_npy(path)?;
        }
        Ok(eigensystem)
    }
}
