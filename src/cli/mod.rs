//! The regression command-line interface.
//!
//! This module is the single place where the process environment is read
//! and where errors turn into an exit status.

use std::{path::PathBuf, process};

use clap::Parser;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::{
    cli::args::{Command, CsrTestArgs, RegressArgs, RunArgs},
    config::{Environment, PipelineContext},
    csr,
    errors::{RegressError, Result},
    pipeline::Pipeline,
    process::SystemRunner,
};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = RegressArgs::parse();
    output::init_logging(args.command.verbose());

    let result = match args.command {
        Command::Run(run) => handle_run(run),
        Command::CsrTest(csr_test) => handle_csr_test(csr_test),
    };

    if let Err(e) = result {
        output::print_error(e);
        process::exit(1);
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => current_dir()?,
    };
    let plan = args.plan(&root)?;
    let ctx = PipelineContext::new(&args.output, &root)
        .isa(&args.isa)
        .abi(&args.mabi)
        .verbose(args.verbose);
    let env = Environment::from_process();

    let mut pipeline = Pipeline::new(&ctx, &env, SystemRunner);
    let outcome = pipeline.execute(&plan)?;
    if let Some(summary) = outcome.summary {
        output::print_summary(&summary, &pipeline.layout().report());
    }
    Ok(())
}

fn handle_csr_test(args: CsrTestArgs) -> Result<()> {
    let descriptions = csr::load_descriptions(&args.csr_file)?;
    let mut rng = match args.seed {
        Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
        None => Xoshiro256StarStar::from_entropy(),
    };
    csr::generate_tests(&descriptions, args.rv, args.num_test, &args.out, &mut rng)?;
    Ok(())
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| RegressError::io("failed to determine current directory", e))
}
