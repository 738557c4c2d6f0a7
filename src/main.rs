mod cli;
mod commands;
mod config;
mod error;
mod harness;
mod history;
mod latest;
mod manifest;
mod model;
mod regression;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::error::ExitStatus;

fn main() -> ExitCode {
    init_tracing();

    // clap exits with 2 on usage errors, which is reserved for regressions here.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(ExitStatus::ConfigError.code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::from(ExitStatus::for_error(&err).code())
        }
    }
}

fn run(cli: Cli) -> Result<ExitStatus> {
    match cli.command {
        Commands::Gate(args) => commands::gate::run(args),
        Commands::Manifest(args) => commands::manifest::run(args).map(|()| ExitStatus::Success),
        Commands::Latest(args) => commands::latest::run(args).map(|()| ExitStatus::Success),
        Commands::Trend(args) => commands::trend::run(args).map(|()| ExitStatus::Success),
        Commands::Summarize(args) => commands::summarize::run(args).map(|()| ExitStatus::Success),
        Commands::Status(args) => commands::status::run(args).map(|()| ExitStatus::Success),
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
