use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use standardize::{
    RuleStore, aggregate::aggregate, csvio::write_atomically,
    jurisdiction::JurisdictionResolver, report::load_reports_from_path,
};

/// Concatenates the standardised tables of every report into one database.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to the rules applied to the jurisdictions of every table. They
    /// may be stricter than those used while extracting.
    #[arg(long, default_value = "inputs/concat_rules.json")]
    rules: PathBuf,

    /// Path to the metadata document describing the reports.
    #[arg(long, default_value = "inputs/metadata.json")]
    metadata: PathBuf,

    /// Directory holding the standardised tables.
    #[arg(long, default_value = "outputs/individual_reports")]
    outputs_dir: PathBuf,

    /// CSV file of alternative jurisdiction names and their ISO code.
    #[arg(long, default_value = "configuration/countryish_names_to_code.csv")]
    aliases: PathBuf,

    /// Path of the concatenated table.
    #[arg(long, default_value = "outputs/database.csv")]
    output: PathBuf,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let rules = RuleStore::load(&cmd.rules)?;
    let reports = load_reports_from_path(&cmd.metadata)?;
    let resolver = JurisdictionResolver::load(&cmd.aliases)?;

    let table = aggregate(&reports.reports, &cmd.outputs_dir, &rules, &resolver)
        .with_context(|| format!("aggregating tables of {:?}", cmd.outputs_dir))?;
    write_atomically(&cmd.output, |file| table.write_csv(file))?;

    eprintln!("{} row(s) written to {:?}.", table.rows.len(), cmd.output);
    Ok(())
}
