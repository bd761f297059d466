//! Layered store of label rules.
//!
//! Two independent books, one for column labels and one for jurisdiction
//! labels, each holding a global `default` scope, per-entity `default`
//! scopes and per-period scopes. A lookup merges the scopes in effect for a
//! report, the period overriding the entity which overrides the global scope.

mod book;

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::error::ConfigError;
use crate::report::Report;

pub use book::RuleEntry;
use book::{DEFAULT_SCOPE, REGEX_PREFIX, RuleBook, compile_full_match, is_vocabulary_rule};

/// Sink of columns that are to be removed from the table.
pub const TO_DROP: &str = "to_drop";

/// Canonical columns of the disclosure standard, always part of the
/// vocabulary.
const BASE_VOCABULARY: &[&str] = &[
    "unrelated_revenues",
    "related_revenues",
    "total_revenues",
    "profit_before_tax",
    "tax_paid",
    "tax_accrued",
    "stated_capital",
    "accumulated_earnings",
    "employees",
    "tangible_assets",
];

/// Which labels a rule applies to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::Display, strum_macros::EnumIter)]
pub enum Domain {
    #[strum(to_string = "column_rules")]
    Column,
    #[strum(to_string = "jurisdiction_rules")]
    Jurisdiction,
}

/// Where a new rule is recorded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Every report (`!`).
    Global,
    /// Every period of the report's entity (`#`).
    Entity,
    /// The report's own period (`.`).
    Period,
}

impl Scope {
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '!' => Some(Self::Global),
            '#' => Some(Self::Entity),
            '.' => Some(Self::Period),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::Global => '!',
            Self::Entity => '#',
            Self::Period => '.',
        }
    }
}

/// A rule to add to the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewRule {
    /// Rule key: the observed label, or `_regex_` followed by a pattern.
    pub source: String,
    pub scope: Scope,
    pub sink: String,
    pub justification: String,
}

impl NewRule {
    pub fn strict(
        label: impl Into<String>,
        sink: impl Into<String>,
        scope: Scope,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            source: label.into(),
            scope,
            sink: sink.into(),
            justification: justification.into(),
        }
    }

    pub fn regex(
        pattern: &str,
        sink: impl Into<String>,
        scope: Scope,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            source: format!("{REGEX_PREFIX}{pattern}"),
            scope,
            sink: sink.into(),
            justification: justification.into(),
        }
    }
}

/// Rule lookups and updates, as needed by the label standardizer.
pub trait Rules {
    /// Sink of the strict rule keyed by exactly `source`.
    fn resolve_strict(&self, report: &Report, source: &str, domain: Domain) -> Option<String>;

    /// Sink of the first regex rule, in merge order, that matches the whole
    /// of `source`.
    fn resolve_regex(&self, report: &Report, source: &str, domain: Domain) -> Option<String>;

    /// Strict rules first, then regex rules.
    fn resolve(&self, report: &Report, source: &str, domain: Domain) -> Option<String> {
        self.resolve_strict(report, source, domain)
            .or_else(|| self.resolve_regex(report, source, domain))
    }

    /// Adds or overwrites a rule at the scope it names, relative to `report`.
    fn write_rule(&mut self, report: &Report, domain: Domain, rule: &NewRule) -> Result<(), ConfigError>;

    /// Sorted canonical column names.
    fn standard_vocabulary(&self) -> Vec<String>;
}

/// Both rule books, as loaded from and written back to the rules document.
#[derive(Clone, Debug)]
pub struct RuleStore {
    column: RuleBook,
    jurisdiction: RuleBook,
    /// Other top level keys of the document, written back untouched.
    extra: Map<String, Value>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self {
            column: RuleBook::empty(),
            jurisdiction: RuleBook::empty(),
            extra: Map::new(),
        }
    }
}

impl RuleStore {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_document(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_document(serde_json::from_reader(BufReader::new(file))?)
    }

    fn from_document(document: Value) -> Result<Self, ConfigError> {
        let Value::Object(mut document) = document else {
            return Err(ConfigError::InvalidValue {
                document: "rules",
                value: "top level is not an object".to_string(),
            });
        };

        let mut take_book = |domain: Domain| {
            let key = domain.to_string();
            let value = document.shift_remove(&key).ok_or_else(|| ConfigError::MissingKey {
                document: "rules",
                key: key.clone(),
            })?;
            RuleBook::from_value(&key, value)
        };
        let column = take_book(Domain::Column)?;
        let jurisdiction = take_book(Domain::Jurisdiction)?;

        Ok(Self {
            column,
            jurisdiction,
            extra: document,
        })
    }

    /// Writes the rules document to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file =
            AtomicWriteFile::open(path).with_context(|| format!("opening {:?} for writing", path))?;
        self.write_json(&mut file)
            .with_context(|| format!("writing rules to {:?}", path))?;
        file.commit()
            .with_context(|| format!("committing rules file {:?}", path))?;
        Ok(())
    }

    /// Writes the rules document, indented by four spaces.
    pub fn write_json<W: Write>(&self, w: W) -> Result<()> {
        let mut serializer = serde_json::Serializer::with_formatter(w, PrettyFormatter::with_indent(b"    "));
        self.to_value().serialize(&mut serializer)?;
        Ok(())
    }

    fn to_value(&self) -> Value {
        let mut document = Map::new();
        document.insert(Domain::Column.to_string(), self.column.to_value());
        document.insert(Domain::Jurisdiction.to_string(), self.jurisdiction.to_value());
        document.extend(self.extra.clone());
        Value::Object(document)
    }

    fn book(&self, domain: Domain) -> &RuleBook {
        match domain {
            Domain::Column => &self.column,
            Domain::Jurisdiction => &self.jurisdiction,
        }
    }

    fn book_mut(&mut self, domain: Domain) -> &mut RuleBook {
        match domain {
            Domain::Column => &mut self.column,
            Domain::Jurisdiction => &mut self.jurisdiction,
        }
    }

    /// Flat audit records of every entity-level rule.
    pub fn justifications(&self) -> Vec<JustificationRecord> {
        let mut records = Vec::new();
        for domain in Domain::iter() {
            for (group, scope, label, entry) in self.book(domain).entity_rules() {
                records.push(JustificationRecord {
                    type_of_rule: domain.to_string(),
                    mnc: group.to_string(),
                    report_end_of_year: scope.to_string(),
                    column_name_found: label.to_string(),
                    column_name_assigned: entry.sink.clone(),
                    justification: entry.justification.clone().unwrap_or_default(),
                });
            }
        }
        records
    }

    /// Writes the justification audit as CSV.
    pub fn export_justifications<W: Write>(&self, w: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(w);
        let records = self.justifications();
        if records.is_empty() {
            csv_writer.write_record(JustificationRecord::HEADER)?;
        }
        for record in records {
            csv_writer.serialize(record).with_context(|| "writing record")?;
        }
        csv_writer.flush().with_context(|| "flushing to CSV")?;
        Ok(())
    }
}

impl Rules for RuleStore {
    fn resolve_strict(&self, report: &Report, source: &str, domain: Domain) -> Option<String> {
        if source.starts_with(REGEX_PREFIX) {
            return None;
        }
        self.book(domain)
            .find_strict(&report.group_name, &report.end_of_year, source)
            .map(|entry| entry.sink.clone())
    }

    fn resolve_regex(&self, report: &Report, source: &str, domain: Domain) -> Option<String> {
        self.book(domain)
            .find_regex(&report.group_name, &report.end_of_year, source)
            .map(|entry| entry.sink.clone())
    }

    fn write_rule(&mut self, report: &Report, domain: Domain, rule: &NewRule) -> Result<(), ConfigError> {
        let entry = RuleEntry::new(&rule.source, rule.sink.clone(), rule.justification.clone())?;
        let book = self.book_mut(domain);
        let layer = match rule.scope {
            Scope::Global => book.global_mut()?,
            Scope::Entity => book.entity_scope_mut(&report.group_name, DEFAULT_SCOPE)?,
            Scope::Period => book.entity_scope_mut(&report.group_name, &report.end_of_year)?,
        };
        layer.set(&rule.source, entry);
        log::info!(
            "new {domain} rule {:?} -> {:?} at scope {}",
            rule.source,
            rule.sink,
            rule.scope.marker()
        );
        Ok(())
    }

    fn standard_vocabulary(&self) -> Vec<String> {
        let mut vocabulary: Vec<String> = BASE_VOCABULARY
            .iter()
            .map(|s| s.to_string())
            .chain(
                self.column
                    .all_rules()
                    .into_iter()
                    .filter(|(label, _)| is_vocabulary_rule(label))
                    .map(|(_, entry)| entry.sink.clone()),
            )
            .filter(|sink| sink != TO_DROP)
            .collect();
        vocabulary.sort();
        vocabulary.dedup();
        vocabulary
    }
}

/// One row of the justification audit file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct JustificationRecord {
    pub type_of_rule: String,
    pub mnc: String,
    pub report_end_of_year: String,
    pub column_name_found: String,
    pub column_name_assigned: String,
    pub justification: String,
}

impl JustificationRecord {
    const HEADER: [&'static str; 6] = [
        "type_of_rule",
        "mnc",
        "report_end_of_year",
        "column_name_found",
        "column_name_assigned",
        "justification",
    ];
}

/// Checks that `pattern` can be used as a regex rule.
pub fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    compile_full_match(pattern).map(|_| ())
}
