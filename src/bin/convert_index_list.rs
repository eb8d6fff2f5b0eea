/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Convert a text index list into the binary form read by the multiply kernels

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use mscheme_rs::storage::index_list::convert_text_to_binary;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "convert_index_list")]
struct Args {
    /// Text index list, one `row col [+-]k` triple per line
    input_list: PathBuf,
    /// Binary index list to write
    output_list: PathBuf,
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            error.exit()
        }
        Err(_) => {
            println!("{}", Args::command().render_usage());
            return Ok(ExitCode::from(1));
        }
    };

    let written = convert_text_to_binary(&args.input_list, &args.output_list)?;
    log::info!(
        "wrote {} triples to {}",
        written,
        args.output_list.display()
    );
    Ok(ExitCode::SUCCESS)
}
