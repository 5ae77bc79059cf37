mod channels;
mod cli;
mod commands;
mod evaluation;
mod gold;
mod index;
mod model;
mod rerank;
mod retrieval;
mod semantic;
mod tuning;
mod util;
mod weights;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => commands::query::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Evaluate(args) => commands::evaluate::run(args),
        Commands::Tune(args) => commands::tune::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Apply(args) => commands::apply::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Status(args) => commands::status::run(args).map(|()| ExitCode::SUCCESS),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
