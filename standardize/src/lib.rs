//! Standardisation of country-by-country tax disclosure tables.
//!
//! Raw grids of strings, as produced by a PDF table extraction backend, are
//! classified, oriented and unified into a single working table, their
//! labels are mapped onto a closed vocabulary through a layered rule store,
//! and their cells are normalised into tidy numeric data.

pub mod aggregate;
pub mod batch;
pub mod classify;
pub mod csvio;
pub mod error;
pub mod exchange;
pub mod jurisdiction;
pub mod labels;
pub mod report;
pub mod rules;
pub mod table;
pub mod text;
pub mod tidy;
pub mod unify;

pub use error::{ConfigError, MetadataError, StandardizationError, UnifyError};
pub use report::Report;
pub use rules::{Domain, RuleStore, Rules, Scope};
pub use table::{LabelledTable, Row, Table};
