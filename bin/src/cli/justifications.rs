use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use standardize::{RuleStore, csvio::write_atomically};

/// Exports the justifications of the entity-level rules as CSV.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to the rules document.
    #[arg(long, default_value = "inputs/rules.json")]
    rules: PathBuf,

    /// Path of the CSV file to write.
    output: PathBuf,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let rules = RuleStore::load(&cmd.rules)?;
    write_atomically(&cmd.output, |file| rules.export_justifications(file))
}
