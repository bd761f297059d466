//! Conversion of a standardised working table into tidy data: typed cells in
//! reference units, with the report metadata on every row.

pub mod cells;
#[cfg(test)]
mod tests;

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};

use crate::error::StandardizationError;
use crate::exchange::ExchangeRates;
use crate::report::Report;
use crate::table::LabelledTable;

use cells::{clean_cell, number, percentage, rate};

/// Columns holding free text, never cleaned.
const TEXT_COLUMNS: &[&str] = &["jurisdiction", "commentary", "main_activities"];
/// Cleaned but kept as text.
const UNCOERCED_COLUMNS: &[&str] = &["statutory_tax_rate", "tax_reconciliation"];
/// Not expressed in the reporting unit.
const UNSCALED_COLUMNS: &[&str] = &["employees", "effective_tax_rate"];
/// Only needed while tidying.
const DROPPED_COLUMNS: &[&str] = &[
    "statutory_tax_rate",
    "effective_tax_rate",
    "commentary",
    "main_activities",
    "tax_reconciliation",
];

const EFFECTIVE_TAX_RATE: &str = "effective_tax_rate";
const TOTAL_REVENUES: &str = "total_revenues";
/// Revenue columns sometimes given as a share of the total.
const SHARE_OF_TOTAL_COLUMNS: &[&str] = &["unrelated_revenues", "related_revenues"];

/// A typed cell of tidy data.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Value::Missing } else { Value::Text(s) }
    }

    fn optional_text(s: Option<&str>) -> Self {
        s.map(|s| Value::text(s.trim())).unwrap_or(Value::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn to_csv_field(&self) -> String {
        match self {
            Value::Text(s) => quoted(s),
            other => other.to_string(),
        }
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Display of f64 has no fractional part for integral values.
            Value::Number(n) if *n == 0.0 => write!(f, "0"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => Ok(()),
        }
    }
}

/// Tidy table: one row per jurisdiction of a report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TidyTable {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TidyTable {
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Iterates over the cells of the column labelled `label`.
    pub fn column(&self, label: &str) -> impl Iterator<Item = &Value> {
        let col = self.position(label);
        self.rows
            .iter()
            .filter_map(move |row| col.and_then(|col| row.get(col)))
    }

    fn insert_column(&mut self, index: usize, label: &str, value: Value) {
        self.labels.insert(index, label.to_string());
        for row in self.rows.iter_mut() {
            row.insert(index, value.clone());
        }
    }

    fn remove_column(&mut self, label: &str) {
        let Some(col) = self.position(label) else {
            return;
        };
        self.labels.remove(col);
        for row in self.rows.iter_mut() {
            row.remove(col);
        }
    }

    fn map_column(&mut self, label: &str, mut f: impl FnMut(&Value) -> Value) {
        let Some(col) = self.position(label) else {
            return;
        };
        for row in self.rows.iter_mut() {
            row[col] = f(&row[col]);
        }
    }

    /// Writes the table as CSV. Labels and text cells are always quoted,
    /// numbers never are and missing cells are left empty.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        // Fields are quoted here, by type, rather than by content.
        let mut csv_writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(w);
        csv_writer
            .write_record(self.labels.iter().map(|label| quoted(label)))
            .with_context(|| "writing header")?;
        for row in &self.rows {
            csv_writer
                .write_record(row.iter().map(Value::to_csv_field))
                .with_context(|| "writing record")?;
        }
        csv_writer.flush().with_context(|| "flushing to CSV")?;
        Ok(())
    }
}

/// Typed value of a cell of the column `label`.
fn convert(label: &str, cell: &str) -> Value {
    if TEXT_COLUMNS.contains(&label) {
        return Value::text(cell);
    }
    let cleaned = clean_cell(cell);
    if UNCOERCED_COLUMNS.contains(&label) {
        return Value::text(cleaned);
    }
    let parsed = if label == EFFECTIVE_TAX_RATE {
        rate(&cleaned)
    } else {
        number(&cleaned)
    };
    parsed.map(Value::Number).unwrap_or(Value::Missing)
}

/// Revenues given as a percentage of the total, as absolute values.
fn shares_of_total(table: &LabelledTable, column: usize, total: usize) -> Vec<Option<f64>> {
    table
        .rows
        .iter()
        .map(|row| {
            let share = row.get(column).map(|cell| clean_cell(cell)).and_then(|c| percentage(&c))?;
            let total = row.get(total).map(|cell| clean_cell(cell)).and_then(|c| number(&c))?;
            Some(total * share)
        })
        .collect()
}

/// Tidies the standardised table of `report`.
///
/// Cells are cleaned and typed, percentages of the total revenues resolved,
/// the signs of `columns_to_flip` inverted and amounts scaled to units. The
/// report metadata then leads every row, and the helper columns are dropped.
pub fn tidy(
    table: &LabelledTable,
    report: &Report,
    rates: &ExchangeRates,
) -> Result<TidyTable, StandardizationError> {
    let multiplier_to_euro = rates.rate(&report.currency, &report.end_of_period_date())?;

    let mut tidy = TidyTable {
        labels: table.labels.clone(),
        rows: table
            .rows
            .iter()
            .map(|row| {
                table
                    .labels
                    .iter()
                    .enumerate()
                    .map(|(col, label)| convert(label, row.get(col).map_or("", String::as_str)))
                    .collect()
            })
            .collect(),
    };

    if let Some(total) = table.position(TOTAL_REVENUES) {
        for label in SHARE_OF_TOTAL_COLUMNS {
            let Some(col) = table.position(label) else {
                continue;
            };
            for (row, value) in shares_of_total(table, col, total).into_iter().enumerate() {
                if let Some(value) = value {
                    tidy.rows[row][col] = Value::Number(value);
                }
            }
        }
    } else {
        log::info!("{}: no {TOTAL_REVENUES} column", report.id());
    }

    for label in &report.columns_to_flip {
        if tidy.position(label).is_none() {
            return Err(StandardizationError::MissingFlipColumn {
                column: label.clone(),
            });
        }
        tidy.map_column(label, |value| match value {
            Value::Number(n) => Value::Number(-n),
            other => other.clone(),
        });
    }

    let unit = report.unit_multiplier as f64;
    let scaled: Vec<String> = tidy
        .labels
        .iter()
        .filter(|label| !UNSCALED_COLUMNS.contains(&label.as_str()))
        .cloned()
        .collect();
    for label in &scaled {
        tidy.map_column(label, |value| match value {
            Value::Number(n) => Value::Number(n * unit),
            other => other.clone(),
        });
    }

    let mut metadata = vec![
        ("group_name", Value::text(report.group_name.as_str())),
        ("parent_entity", Value::optional_text(report.parent_entity_name.as_deref())),
        ("end_of_year", Value::text(report.end_of_period_date())),
    ];
    let optional = [
        ("parent_entity_nace2_core_code", &report.nace2_core_code),
        ("parent_entity_nace2_main", &report.nace2_main),
        ("parent_entity_bvd_sector", &report.bvd_sector),
        ("parent_entity_jurisdiction", &report.parent_jurisdiction),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            metadata.push((label, Value::text(value.as_str())));
        }
    }
    metadata.push(("currency", Value::text(report.currency.as_str())));
    metadata.push(("multiplier_to_euro", Value::Number(multiplier_to_euro)));
    for (index, (label, value)) in metadata.into_iter().enumerate() {
        tidy.insert_column(index, label, value);
    }

    for label in DROPPED_COLUMNS {
        tidy.remove_column(label);
    }
    Ok(tidy)
}
