//! Mapping of observed column and jurisdiction labels onto their canonical
//! form, with operator intervention for whatever the rules leave unresolved.

pub mod decide;

use anyhow::Result;
use hashbrown::HashSet;

use crate::classify::has_enough_countries;
use crate::error::StandardizationError;
use crate::jurisdiction::JurisdictionResolver;
use crate::report::Report;
use crate::rules::{Domain, Rules, TO_DROP};
use crate::table::LabelledTable;
use crate::text::neatify;

pub use decide::{
    Decision, DecisionProvider, DecliningDecisions, Question, ScriptedDecisions,
    TerminalDecisions,
};

pub const JURISDICTION: &str = "jurisdiction";
pub const DELETE_ROW: &str = "delete_row";
/// Default sink for jurisdictions grouped as "other".
pub const OTHER: &str = "other";
pub const TO_CHECK_SUFFIX: &str = "_tocheck";
/// Stands for a blank jurisdiction cell.
const EMPTY_JURISDICTION: &str = "<empty>";

/// Canonical label of the column observed as `observed` at `position`.
///
/// Strict rules come first, then labels already in the vocabulary, then
/// regex rules. Unresolved labels get a `_tocheck` marker that keeps them
/// distinct.
fn assign_column(
    rules: &dyn Rules,
    report: &Report,
    vocabulary: &[String],
    observed: &str,
    position: usize,
) -> String {
    let lower = observed.to_lowercase();
    let sink = rules
        .resolve_strict(report, observed, Domain::Column)
        .or_else(|| vocabulary.contains(&lower).then_some(lower))
        .or_else(|| rules.resolve_regex(report, observed, Domain::Column));
    match sink {
        Some(sink) if sink == TO_DROP => format!("{TO_DROP}_{position}"),
        Some(sink) => sink,
        None => format!("{observed}_{position}{TO_CHECK_SUFFIX}"),
    }
}

/// Canonical labels of the columns of `table`.
///
/// When no label maps to `jurisdiction`, the one column holding enough
/// jurisdiction names gets it.
pub fn resolve_columns(
    table: &LabelledTable,
    observed: &[String],
    report: &Report,
    rules: &dyn Rules,
    resolver: &JurisdictionResolver,
) -> Result<Vec<String>, StandardizationError> {
    let vocabulary = rules.standard_vocabulary();
    let mut labels: Vec<String> = observed
        .iter()
        .enumerate()
        .map(|(position, label)| assign_column(rules, report, &vocabulary, label, position))
        .collect();

    if !labels.iter().any(|l| l == JURISDICTION) {
        let needed = report.thresholds.min_nb_jurs_per_table;
        let candidates: Vec<usize> = (0..labels.len())
            .filter(|&col| has_enough_countries(resolver, table.rows.column(col), needed))
            .collect();
        match candidates.as_slice() {
            [] => return Err(StandardizationError::NoJurisdictionColumn),
            [col] => labels[*col] = JURISDICTION.to_string(),
            _ => {
                return Err(StandardizationError::MultipleJurisdictionColumns {
                    columns: candidates,
                });
            }
        }
    }

    check_unique(&labels)?;
    Ok(labels)
}

/// Fails on the first non-blank label assigned to more than one column.
fn check_unique(labels: &[String]) -> Result<(), StandardizationError> {
    let mut seen = HashSet::new();
    for label in labels.iter().filter(|l| !l.is_empty()) {
        if !seen.insert(label.as_str()) {
            return Err(StandardizationError::DuplicateColumn {
                label: label.clone(),
            });
        }
    }
    Ok(())
}

/// Name under which a jurisdiction cell is looked up: normalised, with any
/// previous `_tocheck` marker removed.
pub fn jurisdiction_key(cell: &str) -> String {
    let name = neatify(cell.strip_suffix(TO_CHECK_SUFFIX).unwrap_or(cell));
    if name.is_empty() {
        EMPTY_JURISDICTION.to_string()
    } else {
        name
    }
}

/// Canonical form of a jurisdiction cell: the sink of a rule, else the ISO
/// alpha-3 code, else the key marked `_tocheck`.
pub fn resolve_jurisdiction(
    cell: &str,
    report: &Report,
    rules: &dyn Rules,
    resolver: &JurisdictionResolver,
) -> String {
    let key = jurisdiction_key(cell);
    rules
        .resolve(report, &key, Domain::Jurisdiction)
        .or_else(|| resolver.to_iso3166(&key))
        .unwrap_or_else(|| format!("{key}{TO_CHECK_SUFFIX}"))
}

fn is_unresolved(label: &str) -> bool {
    label.ends_with(TO_CHECK_SUFFIX)
}

/// Maps labels of `table` in place and removes what was marked for deletion.
///
/// Unless `operator_wont_intervene` is set, every distinct unresolved label
/// is submitted to `decisions`, and the rules it provides are recorded in
/// `rules` then applied. Returns whether the operator may still be asked for
/// the following reports: once they quit, never again.
pub fn standardize(
    table: &mut LabelledTable,
    report: &Report,
    rules: &mut dyn Rules,
    resolver: &JurisdictionResolver,
    decisions: &mut dyn DecisionProvider,
    operator_wont_intervene: bool,
) -> Result<bool> {
    let mut operator_wont_intervene = operator_wont_intervene;

    let observed = std::mem::take(&mut table.labels);
    let mut labels = resolve_columns(table, &observed, report, rules, resolver)?;
    if !operator_wont_intervene {
        let mut asked: HashSet<&str> = HashSet::new();
        for position in 0..observed.len() {
            let source = observed[position].as_str();
            if !is_unresolved(&labels[position]) || !asked.insert(source) {
                continue;
            }
            let mut options = vec![TO_DROP.to_string(), source.to_string()];
            options.extend(rules.standard_vocabulary());
            let question = Question {
                domain: Domain::Column,
                report,
                observed: source,
                options,
            };
            match decisions.decide(&question)? {
                Decision::Quit => {
                    operator_wont_intervene = true;
                    break;
                }
                Decision::Decline => {}
                Decision::Rule(rule) => {
                    rules.write_rule(report, Domain::Column, &rule)?;
                    labels = resolve_columns(table, &observed, report, rules, resolver)?;
                }
            }
        }
    }
    table.labels = labels;

    let col = table
        .position(JURISDICTION)
        .ok_or(StandardizationError::NoJurisdictionColumn)?;
    let cells: Vec<String> = table
        .rows
        .iter()
        .map(|row| row.get(col).cloned().unwrap_or_default())
        .collect();
    let mut resolved: Vec<String> = cells
        .iter()
        .map(|cell| resolve_jurisdiction(cell, report, rules, resolver))
        .collect();

    if !operator_wont_intervene {
        let mut asked: HashSet<String> = HashSet::new();
        for row in 0..cells.len() {
            if !is_unresolved(&resolved[row]) {
                continue;
            }
            let key = jurisdiction_key(&cells[row]);
            if !asked.insert(key.clone()) {
                continue;
            }
            let question = Question {
                domain: Domain::Jurisdiction,
                report,
                observed: &key,
                options: vec![key.clone(), DELETE_ROW.to_string(), OTHER.to_string()],
            };
            match decisions.decide(&question)? {
                Decision::Quit => {
                    operator_wont_intervene = true;
                    break;
                }
                Decision::Decline => {}
                Decision::Rule(rule) => {
                    rules.write_rule(report, Domain::Jurisdiction, &rule)?;
                    for (cell, value) in cells.iter().zip(resolved.iter_mut()) {
                        if is_unresolved(value) {
                            *value = resolve_jurisdiction(cell, report, rules, resolver);
                        }
                    }
                }
            }
        }
    }

    for (row, value) in table.rows.iter_mut().zip(resolved) {
        if let Some(cell) = row.get_mut(col) {
            *cell = value;
        }
    }

    trim(table);
    Ok(operator_wont_intervene)
}

/// Re-resolves the jurisdiction column of an already standardised table,
/// with possibly different rules.
///
/// A rule matching a cell always applies. Cells without a matching rule keep
/// their value unless they are still marked `_tocheck`.
pub fn reresolve_jurisdictions(
    table: &mut LabelledTable,
    report: &Report,
    rules: &dyn Rules,
    resolver: &JurisdictionResolver,
) -> Result<(), StandardizationError> {
    let col = table
        .position(JURISDICTION)
        .ok_or(StandardizationError::NoJurisdictionColumn)?;
    for row in table.rows.iter_mut() {
        let Some(cell) = row.get_mut(col) else {
            continue;
        };
        if let Some(sink) = rules.resolve(report, &jurisdiction_key(cell), Domain::Jurisdiction) {
            *cell = sink;
        } else if is_unresolved(cell) {
            *cell = resolve_jurisdiction(cell, report, rules, resolver);
        }
    }
    Ok(())
}

/// Removes rows of deleted jurisdictions and dropped columns.
pub fn trim(table: &mut LabelledTable) {
    if let Some(col) = table.position(JURISDICTION) {
        table
            .rows
            .retain(|row| row.get(col).is_none_or(|cell| cell != DELETE_ROW));
    }
    table.retain_columns(|label| !label.contains(TO_DROP));
}
