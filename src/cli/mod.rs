/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Command line interface of the `mscheme-rs` binary

use crate::basis::CombinationTable;
use crate::config::RunConfig;
use crate::schedule::{ExecutionOrder, InstructionKind};
use crate::storage::index_list::{convert_binary_to_text, convert_text_to_binary};
use crate::Pipeline;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mscheme-rs", version, about = "Out-of-core M-scheme Lanczos diagonalization")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an execution order from a combination table and save it
    Plan {
        #[arg(long)]
        table: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Run the full diagonalization described by a configuration file
    Diagonalize {
        #[arg(long)]
        config: PathBuf,
    },
    /// Convert an index list between its text and binary forms
    IndexList {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Write text instead of binary
        #[arg(long)]
        to_text: bool,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Plan { table, output } => plan(&table, &output),
        Command::Diagonalize { config } => diagonalize(&config),
        Command::IndexList {
            input,
            output,
            to_text,
        } => {
            let written = if to_text {
                convert_binary_to_text(&input, &output)?
            } else {
                convert_text_to_binary(&input, &output)?
            };
            info!("wrote {} triples to {}", written, output.display());
            Ok(())
        }
    }
}

fn plan(table: &Path, output: &Path) -> Result<()> {
    let table = CombinationTable::from_file(table)?;
    let order = ExecutionOrder::build(&table);
    order
        .write(output)
        .with_context(|| format!("saving execution order to {}", output.display()))?;
    println!(
        "{} instructions ({} neutron, {} proton, {} neutron-proton, {} unload)",
        order.len(),
        order.count(InstructionKind::NeutronBlock),
        order.count(InstructionKind::ProtonBlock),
        order.count(InstructionKind::NeutronProtonBlock),
        order.count(InstructionKind::Unload)
    );
    Ok(())
}

fn diagonalize(path: &Path) -> Result<()> {
    let config = RunConfig::from_file(path)?;
    let eigensystem = Pipeline::new(&config).run()?;
    println!(
        "status: {:?} after {} iterations",
        eigensystem.status, eigensystem.iterations
    );
    for (index, residual) in eigensystem.residuals.iter().enumerate() {
        println!(
            "E[{}] = {:.10}  residual {:.3e}",
            index, eigensystem.eigenvalues[index], residual
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_index_list() {
        let cli = Cli::try_parse_from([
            "mscheme-rs",
            "index-list",
            "--input",
            "a.txt",
            "--output",
            "a.bin",
        ])
        .unwrap();
        match cli.command {
            Command::IndexList { to_text, .. } => assert!(!to_text),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
