use std::{
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Args;
use standardize::{
    RuleStore,
    batch::{Batch, BatchEvent, BatchEvents, BatchSpec},
    csvio::{CsvGridSource, write_atomically},
    exchange::ExchangeRates,
    jurisdiction::JurisdictionResolver,
    labels::TerminalDecisions,
    report::load_reports_from_path,
};

/// Standardises the extracted tables of every report of the metadata
/// document, asking the operator about unknown labels.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to the rules document. Rules learnt during the run are written
    /// back to it.
    #[arg(long, default_value = "inputs/rules.json")]
    rules: PathBuf,

    /// Path to the metadata document describing the reports.
    #[arg(long, default_value = "inputs/metadata.json")]
    metadata: PathBuf,

    /// Directory of manually edited tables, one `<group>_<period>.csv` per
    /// report. These take precedence over the extracted tables.
    #[arg(long, default_value = "inputs/files_after_human_intervention")]
    after_intervention_dir: PathBuf,

    /// Directory where the extraction backends wrote their tables.
    #[arg(long, default_value = "intermediate_files")]
    intermediate_dir: PathBuf,

    /// Directory to output the standardised tables into.
    #[arg(long, default_value = "outputs/individual_reports")]
    outputs_dir: PathBuf,

    /// CSV file of exchange rates to euro, by currency and end of year.
    #[arg(long, default_value = "configuration/rolling_avg_rate.csv")]
    exchange_rates: PathBuf,

    /// CSV file of alternative jurisdiction names and their ISO code.
    #[arg(long, default_value = "configuration/countryish_names_to_code.csv")]
    aliases: PathBuf,

    /// Process reports that already have an output. This clears the outputs
    /// directory first.
    #[arg(long)]
    force_rewrite: bool,

    /// Process at most this many reports.
    #[arg(long)]
    max_reports: Option<usize>,

    /// Never ask the operator, leaving unknown labels marked for checking.
    #[arg(long)]
    operator_wont_intervene: bool,

    /// Write the justifications of the entity-level rules to this CSV file
    /// once done.
    #[arg(long)]
    write_justifications_to: Option<PathBuf>,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let start = Instant::now();

    let mut rules = RuleStore::load(&cmd.rules)?;
    let reports = load_reports_from_path(&cmd.metadata)?;
    for rejected in &reports.rejected {
        log::warn!("{rejected}");
    }
    let rates = ExchangeRates::load(&cmd.exchange_rates)?;
    let resolver = JurisdictionResolver::load(&cmd.aliases)?;
    let grids = CsvGridSource::new(&cmd.after_intervention_dir, &cmd.intermediate_dir);
    let mut decisions = TerminalDecisions::new(std::io::stdin().lock(), std::io::stdout());

    let spec = BatchSpec {
        outputs_dir: &cmd.outputs_dir,
        force_rewrite: cmd.force_rewrite,
        max_reports: cmd.max_reports,
        operator_wont_intervene: cmd.operator_wont_intervene,
    };

    let continue_intent = Arc::new(AtomicBool::new(true));
    let mut events = EventDisplayer::new(continue_intent.clone());
    ctrlc::set_handler(move || continue_intent.store(false, std::sync::atomic::Ordering::SeqCst))?;

    let mut batch = Batch {
        rules: &mut rules,
        resolver: &resolver,
        rates: &rates,
        grids: &grids,
        decisions: &mut decisions,
    };
    let result = batch.run(&reports, &spec, &mut events);

    rules
        .save(&cmd.rules)
        .with_context(|| format!("saving rules to {:?}", cmd.rules))?;
    let summary = result?;

    if let Some(path) = &cmd.write_justifications_to {
        write_atomically(path, |file| rules.export_justifications(file))?;
    }

    if !summary.not_extracted.is_empty() {
        eprintln!("Not extracted:");
        for report in &summary.not_extracted {
            eprintln!("  {report}");
        }
    }
    eprintln!(
        "{} report(s) extracted in {:.1}s.",
        summary.extracted.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

struct EventDisplayer {
    continue_intent: Arc<AtomicBool>,
}

impl EventDisplayer {
    fn new(continue_intent: Arc<AtomicBool>) -> Self {
        EventDisplayer { continue_intent }
    }
}

impl BatchEvents for EventDisplayer {
    fn on_event(&mut self, event: BatchEvent) {
        match event {
            BatchEvent::Extracted {
                report,
                path,
                completed,
                total,
            } => {
                eprintln!("[{completed}/{total}] {report} written to {:?}.", path);
            }
            BatchEvent::AlreadyExtracted { report } => {
                log::info!("{report} already extracted");
            }
            BatchEvent::Failed { report, err } => {
                eprintln!("Error (continuing) on {report}: {:?}.", err);
            }
            BatchEvent::OperatorQuit => {
                eprintln!("No more questions, unknown labels are left to check.");
            }
            BatchEvent::Completed => {
                eprintln!("Extraction complete.");
            }
            BatchEvent::Cancelled => {
                eprintln!("Extraction cancelled.");
            }
        }
    }

    fn do_continue(&self) -> bool {
        self.continue_intent
            .load(std::sync::atomic::Ordering::Relaxed)
    }
}
