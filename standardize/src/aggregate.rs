//! Concatenation of the standardised tables of every report into a single
//! database, under rules that may be stricter than those used per report.

use std::path::Path;

use anyhow::Result;
use hashbrown::HashMap;

use crate::csvio::read_labelled_from_path;
use crate::jurisdiction::JurisdictionResolver;
use crate::labels::{reresolve_jurisdictions, trim};
use crate::report::Report;
use crate::rules::Rules;
use crate::table::{LabelledTable, Row, Table};

/// Concatenates `tables` under the union of their labels, in first-seen
/// order. Cells of columns a table lacks are empty.
pub fn concat(tables: impl IntoIterator<Item = LabelledTable>) -> LabelledTable {
    let mut labels: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut parts = Vec::new();
    for table in tables {
        let indices: Vec<usize> = table
            .labels
            .iter()
            .map(|label| {
                *positions.entry(label.clone()).or_insert_with(|| {
                    labels.push(label.clone());
                    labels.len() - 1
                })
            })
            .collect();
        parts.push((indices, table.rows));
    }

    let width = labels.len();
    let mut rows = Table::default();
    for (indices, part) in parts {
        for row in part.0 {
            let mut cells = vec![String::new(); width];
            for (cell, &index) in row.0.into_iter().zip(indices.iter()) {
                cells[index] = cell;
            }
            rows.push(Row(cells));
        }
    }
    LabelledTable { labels, rows }
}

/// Reads the output of every report found in `outputs_dir`, re-resolves its
/// jurisdictions with `rules`, drops what is marked for deletion and
/// concatenates the lot.
///
/// Reports without output are skipped, as are outputs that cannot be read
/// and tables whose jurisdiction column cannot be found.
pub fn aggregate(
    reports: &[Report],
    outputs_dir: &Path,
    rules: &dyn Rules,
    resolver: &JurisdictionResolver,
) -> Result<LabelledTable> {
    let mut tables = Vec::new();
    for report in reports {
        let path = outputs_dir.join(format!("{}.csv", report.id()));
        if !path.is_file() {
            log::info!("{report} not extracted so not in the aggregate");
            continue;
        }
        let mut table = match read_labelled_from_path(&path) {
            Ok(table) => table,
            Err(err) => {
                log::error!("{report}: {err:#}");
                continue;
            }
        };
        if let Err(err) = reresolve_jurisdictions(&mut table, report, rules, resolver) {
            log::error!("{report}: {err}");
            continue;
        }
        trim(&mut table);
        tables.push(table);
    }
    log::info!("aggregating {} table(s)", tables.len());
    Ok(concat(tables))
}
