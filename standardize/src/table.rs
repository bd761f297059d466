use std::io::Write;
use std::ops::{Deref, DerefMut};

use anyhow::{Context, Result};

use crate::text::clean_text;

/// Raw grid of string cells, as supplied by table extraction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table(pub Vec<Row>);

impl Deref for Table {
    type Target = Vec<Row>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Table {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<C, R> From<C> for Table
where
    C: IntoIterator<Item = R>,
    R: Into<Row>,
{
    fn from(value: C) -> Self {
        Table(value.into_iter().map(Into::into).collect())
    }
}

impl Table {
    /// Number of columns, the length of the longest row.
    pub fn width(&self) -> usize {
        self.iter().map(|row| row.len()).max().unwrap_or(0)
    }

    /// Pads short rows with empty cells so that the grid is rectangular.
    pub fn pad_to_width(&mut self) {
        let width = self.width();
        for row in self.iter_mut() {
            row.resize(width, String::new());
        }
    }

    /// Iterates over the cells of column `index`. Rows without the column are
    /// skipped.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.iter()
            .filter_map(move |row| row.get(index).map(String::as_str))
    }

    /// Iterates over every cell, column by column.
    pub fn cells_by_column(&self) -> impl Iterator<Item = &str> {
        (0..self.width()).flat_map(move |col| self.column(col))
    }

    /// Iterates over every cell, row by row.
    pub fn cells_by_row(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .flat_map(|row| row.iter().map(String::as_str))
    }

    /// Transposes the table (rows become columns and vice versa).
    pub fn transpose(self) -> Table {
        let orig_num_cols: usize = self.width();
        let orig_num_rows: usize = self.len();

        let mut out_table = Table(Vec::with_capacity(orig_num_cols));

        // Preallocate in a rectangle of empty strings.
        for _ in 0..orig_num_cols {
            let mut row: Vec<String> = Vec::with_capacity(orig_num_rows);
            row.resize(orig_num_rows, String::new());
            out_table.push(Row(row))
        }

        for (orig_row, row) in self.0.into_iter().enumerate() {
            for (orig_col, cell) in row.0.into_iter().enumerate() {
                out_table[orig_col][orig_row] = cell;
            }
        }

        out_table
    }

    /// Clean leading, trailing, and redundant sequences of whitespace within
    /// the `Table`, in-place.
    pub fn clean(&mut self) {
        for row in self.iter_mut() {
            for cell in row.iter_mut() {
                clean_text(cell);
            }
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Row(pub Vec<String>);

impl Deref for Row {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Row {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<C, S> From<C> for Row
where
    C: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from(value: C) -> Self {
        Row(value.into_iter().map(Into::into).collect())
    }
}

/// Working table: data rows under an ordered sequence of column labels.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LabelledTable {
    pub labels: Vec<String>,
    pub rows: Table,
}

impl LabelledTable {
    /// Returns the index of the column labelled `label`.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Keeps only the columns for which `keep` returns `true`.
    pub fn retain_columns(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let kept: Vec<bool> = self.labels.iter().map(|l| keep(l)).collect();
        let mut idx = 0;
        self.labels.retain(|_| {
            idx += 1;
            kept[idx - 1]
        });
        for row in self.rows.iter_mut() {
            let mut idx = 0;
            row.retain(|_| {
                idx += 1;
                kept.get(idx - 1).copied().unwrap_or(false)
            });
        }
    }

    /// Writes the labels as a header followed by the rows, quoting every
    /// non-numeric field.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .flexible(true)
            .quote_style(csv::QuoteStyle::NonNumeric)
            .from_writer(w);
        csv_writer
            .write_record(&self.labels)
            .context("writing header")?;
        for row in self.rows.iter() {
            csv_writer
                .write_record(row.iter())
                .context("writing record")?;
        }
        // Check for error rather than implicitly flushing and ignoring.
        csv_writer.flush().context("flushing CSV")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    fn table(cells: &[&[&str]]) -> Table {
        cells.iter().map(|r| r.iter().copied()).into()
    }

    #[gtest]
    fn transpose_fills_ragged_rows() {
        let actual = table(&[
            &["r1c1", "r1c2", "r1c3"],
            &["r2c1", "r2c2"],
            &["r3c1", "r3c2", "r3c3"],
        ])
        .transpose();

        expect_that!(
            actual,
            eq(&table(&[
                &["r1c1", "r2c1", "r3c1"],
                &["r1c2", "r2c2", "r3c2"],
                &["r1c3", "", "r3c3"],
            ]))
        );
    }

    #[gtest]
    fn iterates_columns() {
        let t = table(&[&["a", "b"], &["c"], &["e", "f"]]);
        expect_that!(t.column(1).collect::<Vec<_>>(), elements_are![eq(&"b"), eq(&"f")]);
        expect_that!(
            t.cells_by_column().collect::<Vec<_>>(),
            elements_are![eq(&"a"), eq(&"c"), eq(&"e"), eq(&"b"), eq(&"f")]
        );
    }

    #[gtest]
    fn retains_columns_in_labels_and_rows() {
        let mut t = LabelledTable {
            labels: vec!["a".into(), "to_drop_1".into(), "c".into()],
            rows: table(&[&["1", "2", "3"], &["4", "5", "6"]]),
        };
        t.retain_columns(|label| !label.contains("to_drop"));

        expect_that!(t.labels, elements_are![eq("a"), eq("c")]);
        expect_that!(t.rows, eq(&table(&[&["1", "3"], &["4", "6"]])));
    }

    #[gtest]
    fn writes_csv_with_header() -> anyhow::Result<()> {
        let t = LabelledTable {
            labels: vec!["jurisdiction".into(), "tax_paid".into()],
            rows: table(&[&["FRA", "1,000"], &["DEU", "-12.5"]]),
        };
        let mut out = Vec::new();
        t.write_csv(&mut out)?;
        expect_that!(
            String::from_utf8(out)?,
            eq("\"jurisdiction\",\"tax_paid\"\n\"FRA\",\"1,000\"\n\"DEU\",-12.5\n")
        );
        Ok(())
    }
}
