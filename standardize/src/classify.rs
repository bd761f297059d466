//! Heuristics telling disclosure tables apart from other extracted grids, and
//! telling which way round they are.

use crate::jurisdiction::JurisdictionResolver;
use crate::report::Thresholds;
use crate::table::Table;
use crate::text::count_terms_in;

/// Direction in which the observations of a grid run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Orientation {
    /// One jurisdiction per row.
    Oriented,
    /// One jurisdiction per column, the grid must be transposed.
    Transposed,
}

/// Returns `true` if `grid` is plausibly a disclosure table: wide enough, and
/// with enough jurisdiction names and disclosure terms.
pub fn is_candidate_table(
    grid: &Table,
    thresholds: &Thresholds,
    resolver: &JurisdictionResolver,
) -> bool {
    let nb_rows = grid.len();
    let nb_cols = grid.width();
    let nb_countries =
        resolver.count_countries(grid.cells_by_column(), Some(thresholds.min_nb_jurs_per_table));
    let nb_terms = count_terms(grid, thresholds.min_nb_terms);
    log::debug!(
        "nb_countries: {nb_countries}, nb_terms: {nb_terms}, nb_rows: {nb_rows}, nb_cols: {nb_cols}"
    );

    nb_cols >= thresholds.min_nb_cols
        && nb_countries >= thresholds.min_nb_jurs_per_table
        && nb_terms >= thresholds.min_nb_terms
}

/// Counts disclosure terms row by row, stopping once `stop_at` is reached.
fn count_terms(grid: &Table, stop_at: usize) -> usize {
    let mut total = 0;
    for cell in grid.cells_by_row() {
        total += count_terms_in(cell);
        if total >= stop_at {
            break;
        }
    }
    total
}

/// Finds the direction of the observations: a column holding enough
/// jurisdictions means the grid is oriented, failing that a row holding
/// enough means it is transposed. `None` when neither is found.
pub fn detect_orientation(
    grid: &Table,
    thresholds: &Thresholds,
    resolver: &JurisdictionResolver,
) -> Option<Orientation> {
    let needed = thresholds.min_nb_jurs_per_table;

    if (0..grid.width()).any(|col| has_enough_countries(resolver, grid.column(col), needed)) {
        return Some(Orientation::Oriented);
    }
    if grid
        .iter()
        .any(|row| has_enough_countries(resolver, row.iter().map(String::as_str), needed))
    {
        return Some(Orientation::Transposed);
    }
    None
}

/// Returns `true` if at least `needed` of `cells` name a jurisdiction.
pub fn has_enough_countries<'a>(
    resolver: &JurisdictionResolver,
    cells: impl IntoIterator<Item = &'a str>,
    needed: usize,
) -> bool {
    resolver.count_countries(cells, Some(needed)) >= needed
}
