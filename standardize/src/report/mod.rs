//! Report descriptors: one per (entity group, reporting period), built from
//! the metadata document.

#[cfg(test)]
mod tests;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{ConfigError, MetadataError};

/// Key of the period whose fields are merged beneath every explicit period of
/// an entity.
const DEFAULT_PERIOD: &str = "default";

const DEFAULT_THRESHOLD: usize = 2;

/// Grid classification thresholds of a report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Thresholds {
    pub min_nb_cols: usize,
    pub min_nb_terms: usize,
    pub min_nb_jurs_per_table: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_nb_cols: DEFAULT_THRESHOLD,
            min_nb_terms: DEFAULT_THRESHOLD,
            min_nb_jurs_per_table: DEFAULT_THRESHOLD,
        }
    }
}

/// Immutable descriptor of a single disclosure report.
///
/// `unit_multiplier` and `currency` are guaranteed to come from the metadata
/// when `to_extract` is set. Otherwise they hold `1` and an empty string.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub group_name: String,
    /// Period key as written in the metadata, a bare year or a full date.
    pub end_of_year: String,
    pub metadata: Map<String, Value>,
    pub to_extract: bool,
    pub unit_multiplier: i64,
    pub currency: String,
    pub parent_entity_name: Option<String>,
    pub nace2_main: Option<String>,
    pub nace2_core_code: Option<String>,
    pub bvd_sector: Option<String>,
    pub parent_jurisdiction: Option<String>,
    pub columns_to_flip: Vec<String>,
    pub pages: Vec<u32>,
    pub filename_of_source: Option<String>,
    pub thresholds: Thresholds,
}

impl Report {
    /// Builds a descriptor from already merged metadata.
    pub fn new(
        group_name: impl Into<String>,
        end_of_year: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Result<Self, MetadataError> {
        let group_name = group_name.into();
        let end_of_year = end_of_year.into();
        let fields = Fields {
            report: format!("{group_name}_{end_of_year}"),
            metadata: &metadata,
        };

        let to_extract = fields
            .string("to_extract")?
            .is_some_and(|v| v.to_lowercase() == "yes");

        let unit_multiplier = if to_extract {
            fields.integer("unit")?.ok_or_else(|| fields.missing("unit"))?
        } else {
            1
        };
        let currency = match fields.string("currency")? {
            Some(currency) => currency,
            None if to_extract => return Err(fields.missing("currency")),
            None => String::new(),
        };

        let thresholds = Thresholds {
            min_nb_cols: fields.threshold("min_nb_cols")?,
            min_nb_terms: fields.threshold("min_nb_terms")?,
            min_nb_jurs_per_table: fields.threshold("min_nb_jurs_per_table")?,
        };

        let mut columns_to_flip: Vec<String> = Vec::new();
        for column in fields.strings("columns_to_flip")? {
            if !columns_to_flip.contains(&column) {
                columns_to_flip.push(column);
            }
        }

        let pages = fields
            .list("pages")?
            .iter()
            .map(|page| {
                number_of(page)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| fields.invalid("pages", page))
            })
            .collect::<Result<Vec<u32>, MetadataError>>()?;

        Ok(Self {
            parent_entity_name: fields.non_empty_string("parent_entity_name")?,
            nace2_main: fields.non_empty_string("nace2_main")?,
            nace2_core_code: fields.non_empty_string("nace2_core_code")?,
            bvd_sector: fields.non_empty_string("bvd_sector")?,
            parent_jurisdiction: fields.non_empty_string("parent_jurisdiction")?,
            filename_of_source: fields.non_empty_string("filename")?,
            group_name,
            end_of_year,
            to_extract,
            unit_multiplier,
            currency,
            columns_to_flip,
            pages,
            thresholds,
            metadata,
        })
    }

    /// Identifier used to name the files of this report.
    pub fn id(&self) -> String {
        format!("{}_{}", self.group_name, self.end_of_year)
    }

    /// End of the reporting period as a full date; a bare year is taken to
    /// end on December 31st.
    pub fn end_of_period_date(&self) -> String {
        if crate::text::is_bare_year(&self.end_of_year) {
            format!("{}.12.31", self.end_of_year)
        } else {
            self.end_of_year.clone()
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report(group_name = {}, end_of_period = {}, to_extract = {})",
            self.group_name, self.end_of_year, self.to_extract
        )
    }
}

/// Typed access to the metadata fields of one report.
struct Fields<'a> {
    report: String,
    metadata: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn missing(&self, field: &'static str) -> MetadataError {
        MetadataError::MissingField {
            report: self.report.clone(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, value: &Value) -> MetadataError {
        MetadataError::InvalidField {
            report: self.report.clone(),
            field,
            value: value.to_string(),
        }
    }

    fn string(&self, field: &'static str) -> Result<Option<String>, MetadataError> {
        match self.metadata.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(self.invalid(field, other)),
        }
    }

    fn non_empty_string(&self, field: &'static str) -> Result<Option<String>, MetadataError> {
        Ok(self.string(field)?.filter(|s| !s.trim().is_empty()))
    }

    fn integer(&self, field: &'static str) -> Result<Option<i64>, MetadataError> {
        match self.metadata.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => number_of(value)
                .map(Some)
                .ok_or_else(|| self.invalid(field, value)),
        }
    }

    fn threshold(&self, field: &'static str) -> Result<usize, MetadataError> {
        match self.integer(field)? {
            None => Ok(DEFAULT_THRESHOLD),
            Some(n) => usize::try_from(n).map_err(|_| self.invalid(field, &Value::from(n))),
        }
    }

    fn list(&self, field: &'static str) -> Result<&[Value], MetadataError> {
        match self.metadata.get(field) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(values)) => Ok(values),
            Some(other) => Err(self.invalid(field, other)),
        }
    }

    fn strings(&self, field: &'static str) -> Result<Vec<String>, MetadataError> {
        self.list(field)?
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(self.invalid(field, other)),
            })
            .collect()
    }
}

/// Reads an integer from a JSON number or a numeric string.
fn number_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reports built from a metadata document.
#[derive(Debug, Default)]
pub struct ReportSet {
    /// Descriptors in document order.
    pub reports: Vec<Report>,
    /// Reports excluded because their metadata is incomplete.
    pub rejected: Vec<MetadataError>,
}

/// Metadata document, `entity -> period -> fields`.
type Metadata = IndexMap<String, IndexMap<String, Map<String, Value>>>;

/// Parses a metadata document of the form `entity -> period -> fields`.
///
/// The optional `default` period of an entity is merged beneath each of its
/// explicit periods.
pub fn load_reports(json: &str) -> Result<ReportSet, ConfigError> {
    let document: Metadata = serde_json::from_str(json)?;
    Ok(reports_from_document(document))
}

/// Reads and parses the metadata document at `path`.
pub fn load_reports_from_path(path: &Path) -> Result<ReportSet, ConfigError> {
    let mut json = String::new();
    File::open(path)
        .map(BufReader::new)
        .and_then(|mut r| r.read_to_string(&mut json))
        .map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
    load_reports(&json)
}

fn reports_from_document(document: Metadata) -> ReportSet {
    let mut set = ReportSet::default();
    for (group_name, mut periods) in document {
        let defaults = periods.shift_remove(DEFAULT_PERIOD).unwrap_or_default();
        for (end_of_year, specific) in periods {
            let mut merged = defaults.clone();
            merged.extend(specific);
            match Report::new(group_name.clone(), end_of_year, merged) {
                Ok(report) => set.reports.push(report),
                Err(err) => {
                    log::error!("{err}");
                    set.rejected.push(err);
                }
            }
        }
    }
    set
}

#[cfg(test)]
impl Report {
    /// Descriptor of an extractable report with neutral metadata.
    pub(crate) fn for_test(group_name: &str, end_of_year: &str) -> Self {
        let metadata = Map::from_iter([
            ("to_extract".to_string(), Value::from("yes")),
            ("unit".to_string(), Value::from(1)),
            ("currency".to_string(), Value::from("EUR")),
        ]);
        Self::new(group_name, end_of_year, metadata).expect("valid test metadata")
    }
}
