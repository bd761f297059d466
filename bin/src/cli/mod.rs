use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplelog::{CombinedLogger, Config, LevelFilter, SharedLogger, SimpleLogger, WriteLogger};

mod concat;
mod extract;
mod justifications;

/// Standardises country-by-country reporting tables into tidy CSV data.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging level.
    #[arg(long, default_value = "Warn")]
    log_level: LevelFilter,

    /// Also write debug logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    Extract(extract::Command),
    Concat(concat::Command),
    Justifications(justifications::Command),
}

fn init_logging(args: &Args) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![SimpleLogger::new(args.log_level, Config::default())];
    if let Some(path) = &args.log_file {
        let file = File::create(path).with_context(|| format!("creating log file {:?}", path))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }
    CombinedLogger::init(loggers).with_context(|| "configuring logging")
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    use Command::*;
    match &args.command {
        Extract(cmd) => extract::run(cmd),
        Concat(cmd) => concat::run(cmd),
        Justifications(cmd) => justifications::run(cmd),
    }
}
