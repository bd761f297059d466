//! Sequential standardisation of every report of a metadata document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::csvio::{GridSource, write_atomically};
use crate::exchange::ExchangeRates;
use crate::jurisdiction::JurisdictionResolver;
use crate::labels::{DecisionProvider, standardize};
use crate::report::{Report, ReportSet};
use crate::rules::Rules;
use crate::tidy::tidy;
use crate::unify::unify;

/// Options of a batch run.
#[derive(Clone, Debug)]
pub struct BatchSpec<'a> {
    /// Directory receiving one `<group>_<period>.csv` per report.
    pub outputs_dir: &'a Path,
    /// Clears `outputs_dir` first, so that every report is processed again.
    pub force_rewrite: bool,
    /// Maximum number of reports to process.
    pub max_reports: Option<usize>,
    /// Never ask the operator.
    pub operator_wont_intervene: bool,
}

/// Batch event emitted to track progress.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// The report has been standardised and written to `path`.
    Extracted {
        report: &'a Report,
        path: PathBuf,
        completed: usize,
        total: usize,
    },
    /// An output already exists for the report, it is kept.
    AlreadyExtracted { report: &'a Report },
    /// The report could not be standardised. The batch goes on.
    Failed {
        report: &'a Report,
        err: anyhow::Error,
    },
    /// The operator does not want to be asked anymore.
    OperatorQuit,
    /// Every report has been processed, no more events will follow.
    Completed,
    /// The batch has been cancelled, no more events will follow.
    Cancelled,
}

/// Trait to implement to receive notifications about batch events, or to
/// cancel the batch between reports.
pub trait BatchEvents {
    fn on_event(&mut self, event: BatchEvent);
    fn do_continue(&self) -> bool;
}

/// Outcome of a batch run.
#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    pub extracted: Vec<String>,
    /// Reports with no output, whatever the reason.
    pub not_extracted: Vec<String>,
    pub operator_wont_intervene: bool,
}

/// Encapsulates the collaborators required to standardise reports.
pub struct Batch<'a> {
    pub rules: &'a mut dyn Rules,
    pub resolver: &'a JurisdictionResolver,
    pub rates: &'a ExchangeRates,
    pub grids: &'a dyn GridSource,
    pub decisions: &'a mut dyn DecisionProvider,
}

impl Batch<'_> {
    /// Standardises one report and writes its tidy table to `path`. Returns
    /// the updated operator flag.
    fn extract_one(&mut self, report: &Report, path: &Path, operator_wont_intervene: bool) -> Result<bool> {
        let grids = self
            .grids
            .grids(report)
            .with_context(|| format!("reading grids of {report}"))?;
        let mut table = unify(grids, report, self.resolver)
            .with_context(|| format!("unifying tables of {report}"))?;
        let operator_wont_intervene = standardize(
            &mut table,
            report,
            &mut *self.rules,
            self.resolver,
            &mut *self.decisions,
            operator_wont_intervene,
        )
        .with_context(|| format!("standardising {report}"))?;
        let tidied =
            tidy(&table, report, self.rates).with_context(|| format!("tidying {report}"))?;
        write_atomically(path, |file| tidied.write_csv(file))?;
        Ok(operator_wont_intervene)
    }

    /// Processes the reports to extract, in document order.
    ///
    /// Failures of single reports are reported through `events` and never stop
    /// the batch. Once the operator quits, they are not asked again.
    pub fn run(
        &mut self,
        reports: &ReportSet,
        spec: &BatchSpec,
        events: &mut dyn BatchEvents,
    ) -> Result<BatchSummary> {
        if spec.force_rewrite && spec.outputs_dir.exists() {
            std::fs::remove_dir_all(spec.outputs_dir)
                .with_context(|| format!("clearing {:?}", spec.outputs_dir))?;
        }
        std::fs::create_dir_all(spec.outputs_dir)
            .with_context(|| format!("creating {:?}", spec.outputs_dir))?;

        let mut summary = BatchSummary {
            operator_wont_intervene: spec.operator_wont_intervene,
            ..BatchSummary::default()
        };
        summary
            .not_extracted
            .extend(reports.rejected.iter().map(ToString::to_string));

        let mut to_extract: Vec<&Report> = Vec::new();
        for report in &reports.reports {
            if report.to_extract {
                to_extract.push(report);
            } else {
                summary.not_extracted.push(report.to_string());
            }
        }
        let total = spec.max_reports.unwrap_or(usize::MAX).min(to_extract.len());
        summary
            .not_extracted
            .extend(to_extract.split_off(total).iter().map(ToString::to_string));

        for (i, &report) in to_extract.iter().enumerate() {
            let path = spec.outputs_dir.join(format!("{}.csv", report.id()));
            if path.exists() {
                events.on_event(BatchEvent::AlreadyExtracted { report });
                summary.extracted.push(report.to_string());
            } else {
                let was_quit = summary.operator_wont_intervene;
                match self.extract_one(report, &path, was_quit) {
                    Ok(operator_wont_intervene) => {
                        summary.operator_wont_intervene = operator_wont_intervene;
                        if operator_wont_intervene && !was_quit {
                            events.on_event(BatchEvent::OperatorQuit);
                        }
                        summary.extracted.push(report.to_string());
                        events.on_event(BatchEvent::Extracted {
                            report,
                            path,
                            completed: i + 1,
                            total,
                        });
                    }
                    Err(err) => {
                        log::error!("{report} failed: {err:#}");
                        summary.not_extracted.push(report.to_string());
                        events.on_event(BatchEvent::Failed { report, err });
                    }
                }
            }

            if !events.do_continue() {
                summary
                    .not_extracted
                    .extend(to_extract[i + 1..].iter().map(ToString::to_string));
                events.on_event(BatchEvent::Cancelled);
                return Ok(summary);
            }
        }

        events.on_event(BatchEvent::Completed);
        Ok(summary)
    }
}
