//! CSV files exchanged with the table extraction backends and the outputs of
//! a run.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use atomic_write_file::AtomicWriteFile;

use crate::report::Report;
use crate::table::{LabelledTable, Row, Table};

/// Directory of `intermediate_dir` where backends write the tables of each
/// report.
pub const INTERMEDIATE_TABLES_DIR: &str = "csv_intermediate_tables";

/// Supplies the raw grids extracted from the source document of a report.
pub trait GridSource {
    fn grids(&self, report: &Report) -> Result<Vec<Table>>;
}

/// Grids stored as CSV files.
///
/// A manually edited `<after_intervention_dir>/<id>.csv` replaces whatever
/// the backends extracted into `<intermediate_dir>/csv_intermediate_tables/<id>/`.
#[derive(Clone, Debug)]
pub struct CsvGridSource {
    after_intervention_dir: PathBuf,
    intermediate_dir: PathBuf,
}

impl CsvGridSource {
    pub fn new<P, Q>(after_intervention_dir: P, intermediate_dir: Q) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        Self {
            after_intervention_dir: after_intervention_dir.into(),
            intermediate_dir: intermediate_dir.into(),
        }
    }

    fn override_path(&self, report: &Report) -> PathBuf {
        self.after_intervention_dir
            .join(format!("{}.csv", report.id()))
    }

    fn extracted_dir(&self, report: &Report) -> PathBuf {
        self.intermediate_dir
            .join(INTERMEDIATE_TABLES_DIR)
            .join(report.id())
    }

    /// CSV files directly in `dir`, in name order. A missing directory has
    /// none.
    fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for dir_entry in walkdir::WalkDir::new(dir)
            .follow_links(false)
            .max_depth(1)
            .sort_by_file_name()
        {
            let dir_entry = match dir_entry {
                Ok(dir_entry) => dir_entry,
                Err(e) => match e.io_error() {
                    Some(io_err)
                        if io_err.kind() == std::io::ErrorKind::NotFound
                            && e.path() == Some(dir) =>
                    {
                        return Ok(Vec::new());
                    }
                    _ => return Err(anyhow!(e)),
                },
            };
            let is_csv = dir_entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if dir_entry.file_type().is_file() && is_csv {
                paths.push(dir_entry.into_path());
            }
        }
        Ok(paths)
    }
}

impl GridSource for CsvGridSource {
    fn grids(&self, report: &Report) -> Result<Vec<Table>> {
        let override_path = self.override_path(report);
        if override_path.is_file() {
            log::info!("{}: using manually edited {:?}", report.id(), override_path);
            return Ok(vec![read_grid_from_path(&override_path)?]);
        }

        let dir = self.extracted_dir(report);
        let paths = Self::csv_files(&dir)?;
        if paths.is_empty() {
            return Err(anyhow!(
                "no extracted table for {} in {:?} nor {:?}",
                report.id(),
                override_path,
                dir
            ));
        }
        paths.iter().map(|path| read_grid_from_path(path)).collect()
    }
}

/// Reads a headerless grid of cells. Rows may have different lengths.
pub fn read_grid<R: Read>(r: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(r);
    let mut table = Table::default();
    for record in reader.records() {
        let record = record.context("reading record")?;
        table.push(Row::from(record.iter()));
    }
    Ok(table)
}

pub fn read_grid_from_path(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    read_grid(file).with_context(|| format!("reading grid from {:?}", path))
}

/// Reads a table whose first row holds the labels.
pub fn read_labelled<R: Read>(r: R) -> Result<LabelledTable> {
    let mut grid = read_grid(r)?;
    if grid.is_empty() {
        return Ok(LabelledTable::default());
    }
    let labels = grid.remove(0).0;
    Ok(LabelledTable { labels, rows: grid })
}

pub fn read_labelled_from_path(path: &Path) -> Result<LabelledTable> {
    let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    read_labelled(file).with_context(|| format!("reading table from {:?}", path))
}

/// Writes a file through `write`, replacing any previous version atomically.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut AtomicWriteFile) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {:?}", parent))?;
    }
    let mut file =
        AtomicWriteFile::open(path).with_context(|| format!("opening {:?} for writing", path))?;
    write(&mut file).with_context(|| format!("writing {:?}", path))?;
    file.flush()?;
    file.commit()
        .with_context(|| format!("committing file {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use googletest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn write_file(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    #[gtest]
    fn reads_ragged_grid() -> Result<()> {
        let grid = read_grid("Country,Tax\nFrance,\"1,234\",x\n".as_bytes())?;

        expect_eq!(grid.len(), 2);
        expect_that!(grid[1].0, elements_are![eq("France"), eq("1,234"), eq("x")]);
        Ok(())
    }

    #[gtest]
    fn reads_labelled_table() -> Result<()> {
        let table = read_labelled("\"jurisdiction\",\"tax_paid\"\n\"FRA\",12\n".as_bytes())?;

        expect_that!(table.labels, elements_are![eq("jurisdiction"), eq("tax_paid")]);
        expect_that!(table.rows[0].0, elements_are![eq("FRA"), eq("12")]);
        Ok(())
    }

    #[gtest]
    fn extracted_tables_are_read_in_name_order() -> Result<()> {
        let temp = TempDir::new()?;
        let tables = temp.path().join(INTERMEDIATE_TABLES_DIR).join("acme_2020");
        write_file(&tables.join("acme_2020_2.csv"), "second\n")?;
        write_file(&tables.join("acme_2020_1.csv"), "first\n")?;
        write_file(&tables.join("notes.txt"), "ignored\n")?;
        let source = CsvGridSource::new(temp.path().join("after"), temp.path());

        let grids = source.grids(&Report::for_test("acme", "2020"))?;

        expect_that!(
            grids,
            elements_are![
                eq(&Table::from([vec!["first"]])),
                eq(&Table::from([vec!["second"]]))
            ]
        );
        Ok(())
    }

    #[gtest]
    fn tables_in_subdirectories_are_ignored() -> Result<()> {
        let temp = TempDir::new()?;
        let tables = temp.path().join(INTERMEDIATE_TABLES_DIR).join("acme_2020");
        write_file(&tables.join("acme_2020_1.csv"), "current\n")?;
        write_file(&tables.join("previous").join("acme_2020_1.csv"), "stale\n")?;
        let source = CsvGridSource::new(temp.path().join("after"), temp.path());

        let grids = source.grids(&Report::for_test("acme", "2020"))?;

        expect_that!(grids, elements_are![eq(&Table::from([vec!["current"]]))]);
        Ok(())
    }

    #[gtest]
    fn manually_edited_file_takes_precedence() -> Result<()> {
        let temp = TempDir::new()?;
        write_file(
            &temp
                .path()
                .join(INTERMEDIATE_TABLES_DIR)
                .join("acme_2020")
                .join("acme_2020_1.csv"),
            "extracted\n",
        )?;
        write_file(&temp.path().join("after").join("acme_2020.csv"), "edited\n")?;
        let source = CsvGridSource::new(temp.path().join("after"), temp.path());

        let grids = source.grids(&Report::for_test("acme", "2020"))?;

        expect_that!(grids, elements_are![eq(&Table::from([vec!["edited"]]))]);
        Ok(())
    }

    #[gtest]
    fn missing_tables_are_an_error() -> Result<()> {
        let temp = TempDir::new()?;
        let source = CsvGridSource::new(temp.path().join("after"), temp.path());

        let result = source.grids(&Report::for_test("acme", "2020"));

        expect_that!(
            result.map_err(|e| e.to_string()),
            err(contains_substring("no extracted table for acme_2020"))
        );
        Ok(())
    }

    #[gtest]
    fn writes_atomically_creating_directories() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("outputs").join("table.csv");

        write_atomically(&path, |file| {
            file.write_all(b"a,b\n")?;
            Ok(())
        })?;

        expect_that!(fs::read_to_string(&path)?, eq("a,b\n"));
        Ok(())
    }
}
