//! Joins the grids extracted for one report into a single working table.

use crate::classify::{Orientation, detect_orientation, is_candidate_table};
use crate::error::UnifyError;
use crate::jurisdiction::JurisdictionResolver;
use crate::report::{Report, Thresholds};
use crate::table::{LabelledTable, Table};
use crate::text::{has_double_digits, neatify};

/// Placeholder some extraction backends write for missing cells.
const NAN: &str = "nan";

/// Splits the header rows off an oriented grid.
///
/// The first row with at least `min_nb_cols` cells holding two consecutive
/// digits starts the data. The rows above it are joined column by column and
/// normalised into labels. A grid whose first row is already data has blank
/// labels, as has a grid where no row looks like data.
pub fn extract_header(mut grid: Table, thresholds: &Thresholds) -> (Vec<String>, Table) {
    grid.pad_to_width();
    let width = grid.width();

    let first_data_row = grid.iter().position(|row| {
        row.iter().filter(|cell| has_double_digits(cell)).count() >= thresholds.min_nb_cols
    });
    let Some(first_data_row) = first_data_row else {
        log::warn!("no row looks like data, keeping every row as data");
        return (vec![String::new(); width], grid);
    };

    let data = Table(grid.split_off(first_data_row));
    let labels = (0..width)
        .map(|col| {
            let joined = grid
                .column(col)
                .filter(|cell| *cell != NAN)
                .collect::<Vec<_>>()
                .join(" ");
            neatify(&joined)
        })
        .collect();
    (labels, data)
}

/// Classifies, orients and concatenates the grids of `report`.
///
/// Grids that do not look like disclosure tables are dropped. The labels of
/// the first remaining grid apply to all of them, which must therefore have
/// the same number of columns.
pub fn unify(
    grids: Vec<Table>,
    report: &Report,
    resolver: &JurisdictionResolver,
) -> Result<LabelledTable, UnifyError> {
    let nb_grids = grids.len();
    let thresholds = &report.thresholds;

    let mut unified: Option<LabelledTable> = None;
    for (index, mut grid) in grids.into_iter().enumerate() {
        grid.clean();
        if !is_candidate_table(&grid, thresholds, resolver) {
            log::info!("{}: grid {index} is not a disclosure table", report.id());
            continue;
        }

        let grid = match detect_orientation(&grid, thresholds, resolver) {
            Some(Orientation::Oriented) => grid,
            Some(Orientation::Transposed) => {
                log::info!("{}: transposing grid {index}", report.id());
                grid.transpose()
            }
            None => return Err(UnifyError::UndecidableOrientation { grid: index }),
        };

        let (labels, rows) = extract_header(grid, thresholds);
        match &mut unified {
            None => unified = Some(LabelledTable { labels, rows }),
            Some(table) => {
                if labels.len() != table.labels.len() {
                    return Err(UnifyError::IncompatibleTables {
                        grid: index,
                        expected: table.labels.len(),
                        found: labels.len(),
                    });
                }
                table.rows.extend(rows.0);
            }
        }
    }

    unified.ok_or(UnifyError::NoTableFound { grids: nb_grids })
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    fn thresholds(min_nb_cols: usize) -> Thresholds {
        Thresholds {
            min_nb_cols,
            ..Thresholds::default()
        }
    }

    fn report(min_nb_cols: usize) -> Report {
        let mut report = Report::for_test("acme", "2020");
        report.thresholds = thresholds(min_nb_cols);
        report
    }

    #[gtest]
    fn joins_multi_row_header() {
        let grid = Table::from([
            vec!["", "Revenues", "Tax"],
            vec!["Country", "(third parties)", "paid 1"],
            vec!["France", "1,234", "56"],
            vec!["Spain", "789", "12"],
        ]);

        let (labels, data) = extract_header(grid, &thresholds(2));

        expect_that!(
            labels,
            elements_are![eq("country"), eq("revenues third parties"), eq("tax paid")]
        );
        expect_eq!(data.len(), 2);
        expect_that!(data[0].0, elements_are![eq("France"), eq("1,234"), eq("56")]);
    }

    #[gtest]
    fn skips_nan_placeholders() {
        let grid = Table::from([
            vec!["nan", "Profit"],
            vec!["Jurisdiction", "nan"],
            vec!["Italy", "10"],
        ]);

        let (labels, _) = extract_header(grid, &thresholds(1));

        expect_that!(labels, elements_are![eq("jurisdiction"), eq("profit")]);
    }

    #[gtest]
    fn first_row_of_data_means_headerless() {
        let grid = Table::from([vec!["France", "12", "34"], vec!["Spain", "56", "78"]]);

        let (labels, data) = extract_header(grid, &thresholds(2));

        expect_that!(labels, elements_are![eq(""), eq(""), eq("")]);
        expect_eq!(data.len(), 2);
    }

    #[gtest]
    fn grid_without_data_rows_is_kept_whole() {
        let grid = Table::from([vec!["France", "n/a"], vec!["Spain", "n/a"]]);

        let (labels, data) = extract_header(grid, &thresholds(2));

        expect_that!(labels, elements_are![eq(""), eq("")]);
        expect_eq!(data.len(), 2);
    }

    fn tax_grid() -> Table {
        Table::from([
            vec!["Country", "Tax Paid"],
            vec!["France", "1,234"],
            vec!["Germany", "5,678"],
            vec!["Italy", "(12)"],
        ])
    }

    #[gtest]
    fn oriented_and_transposed_grids_unify() -> anyhow::Result<()> {
        let resolver = JurisdictionResolver::with_builtin_aliases();

        let table = unify(
            vec![tax_grid(), tax_grid().transpose()],
            &report(1),
            &resolver,
        )?;

        expect_that!(table.labels, elements_are![eq("country"), eq("tax paid")]);
        expect_eq!(table.rows.len(), 6);
        expect_eq!(table.rows[0], table.rows[3]);
        expect_eq!(table.rows[2], table.rows[5]);
        Ok(())
    }

    #[gtest]
    fn non_disclosure_grids_are_dropped() -> anyhow::Result<()> {
        let resolver = JurisdictionResolver::with_builtin_aliases();
        let noise = Table::from([vec!["Page 12 of 40"]]);

        let table = unify(vec![noise, tax_grid()], &report(1), &resolver)?;

        expect_eq!(table.rows.len(), 3);
        Ok(())
    }

    #[gtest]
    fn no_grid_means_no_table() {
        let resolver = JurisdictionResolver::with_builtin_aliases();

        expect_that!(
            unify(vec![], &report(1), &resolver),
            err(eq(&UnifyError::NoTableFound { grids: 0 }))
        );
    }

    #[gtest]
    fn no_candidate_grid_means_no_table() {
        let resolver = JurisdictionResolver::with_builtin_aliases();
        let noise = Table::from([vec!["Notes", "Page 12"], vec!["See", "above"]]);

        expect_that!(
            unify(vec![noise], &report(1), &resolver),
            err(eq(&UnifyError::NoTableFound { grids: 1 }))
        );
    }

    #[gtest]
    fn different_widths_are_incompatible() {
        let resolver = JurisdictionResolver::with_builtin_aliases();
        let wider = Table::from([
            vec!["Country", "Tax Paid", "Revenue"],
            vec!["Spain", "12", "34"],
            vec!["Portugal", "56", "78"],
        ]);

        expect_that!(
            unify(vec![tax_grid(), wider], &report(1), &resolver),
            err(eq(&UnifyError::IncompatibleTables {
                grid: 1,
                expected: 2,
                found: 3
            }))
        );
    }
}
