//! Error taxonomy of the standardisation core.
//!
//! Configuration errors abort a run before any report is processed. The other
//! kinds are fatal for a single report only, and are collected by the batch
//! driver.

use std::path::PathBuf;

/// Malformed rules, metadata, exchange rate or alias documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing JSON document")]
    Json(#[from] serde_json::Error),
    #[error("parsing CSV document")]
    Csv(#[from] csv::Error),
    #[error("invalid regex rule pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{document} document has no {key:?} key")]
    MissingKey { document: &'static str, key: String },
    #[error("invalid value {value:?} in {document}")]
    InvalidValue {
        document: &'static str,
        value: String,
    },
}

/// Required metadata absent or unusable for a report that is to be extracted.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MetadataError {
    #[error("report {report} has no {field:?} metadata")]
    MissingField { report: String, field: &'static str },
    #[error("report {report} has invalid {field:?} metadata: {value}")]
    InvalidField {
        report: String,
        field: &'static str,
        value: String,
    },
}

/// Failures to find, orient or join the disclosure tables of a report.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum UnifyError {
    #[error("no disclosure table found among {grids} grid(s)")]
    NoTableFound { grids: usize },
    #[error("cannot tell whether grid {grid} is transposed")]
    UndecidableOrientation { grid: usize },
    #[error(
        "incompatible tables: grid {grid} has {found} columns where {expected} were expected, intervention needed"
    )]
    IncompatibleTables {
        grid: usize,
        expected: usize,
        found: usize,
    },
}

/// Failures while mapping labels or normalising values of a report.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum StandardizationError {
    #[error("no column with enough jurisdiction names")]
    NoJurisdictionColumn,
    #[error("multiple columns with jurisdiction names: {columns:?}")]
    MultipleJurisdictionColumns { columns: Vec<usize> },
    #[error("column label {label:?} assigned to more than one column")]
    DuplicateColumn { label: String },
    #[error("no {column:?} column found but listed in columns_to_flip")]
    MissingFlipColumn { column: String },
    #[error("no exchange rate for {currency} at {end_of_year}")]
    MissingExchangeRate {
        currency: String,
        end_of_year: String,
    },
}
