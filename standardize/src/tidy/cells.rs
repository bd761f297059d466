//! Cleanup of individual cells into parseable numbers.

use lazy_regex::{regex_captures, regex_find, regex_is_match, regex_replace_all};

/// Reduces a cell to the characters of a number, with `.` as the decimal
/// mark and a leading `-` for negative values. Percent signs are kept.
///
/// Applying it to its own output changes nothing.
pub fn clean_cell(cell: &str) -> String {
    let unmarked = regex_replace_all!(r"<s>.*?</s>", cell, "");
    let kept = regex_replace_all!(r"[^0-9()\-.%, ]", &unmarked, "");
    let kept = kept.trim();
    if kept == "-" {
        return String::new();
    }
    let separated = normalize_separators(kept);
    match regex_captures!(r"^\((.*)\)$", &separated) {
        Some((_, inner)) => format!("-{inner}"),
        None => separated,
    }
}

/// Removes grouping separators and turns the decimal mark into `.`.
///
/// With both `.` and `,` present, the last one is the decimal mark. A single
/// kind of separator is grouping when it occurs several times, or once
/// between a group of one to three digits not starting with `0` and exactly
/// three digits. Spaces always group.
fn normalize_separators(s: &str) -> String {
    let s: String = s.chars().filter(|c| *c != ' ').collect();
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');

    let (grouping, decimal) = match (last_dot, last_comma) {
        (None, None) => return s,
        (Some(dot), Some(comma)) => {
            if dot > comma {
                (',', Some('.'))
            } else {
                ('.', Some(','))
            }
        }
        (Some(_), None) => single_separator(&s, '.'),
        (None, Some(_)) => single_separator(&s, ','),
    };

    s.chars()
        .filter(|c| *c != grouping)
        .map(|c| if Some(c) == decimal { '.' } else { c })
        .collect()
}

/// Decides whether `sep`, the only kind of separator in `s`, groups digits
/// or marks the decimals. Returns the grouping and decimal characters.
fn single_separator(s: &str, sep: char) -> (char, Option<char>) {
    let grouping = (sep, None);
    let decimal = (' ', Some(sep));
    if s.matches(sep).count() > 1 {
        return grouping;
    }
    if s.contains('%') {
        return decimal;
    }
    let thousands = match sep {
        '.' => regex_is_match!(r"^[-(]?[1-9]\d{0,2}\.\d{3}\)?$", s),
        _ => regex_is_match!(r"^[-(]?[1-9]\d{0,2},\d{3}\)?$", s),
    };
    if thousands { grouping } else { decimal }
}

/// Value of a cleaned cell holding a percentage, as a ratio.
pub fn percentage(cleaned: &str) -> Option<f64> {
    let (_, digits) = regex_captures!(r"(\d+[.,]?\d*)\w?%", cleaned)?;
    digits.replace(',', ".").parse::<f64>().ok().map(|p| p / 100.0)
}

/// Value of a cleaned rate cell, `25%` or `25` both giving 0.25.
pub fn rate(cleaned: &str) -> Option<f64> {
    let number = regex_find!(r"-?\d+\.?\d*", cleaned)?;
    number.parse::<f64>().ok().map(|r| r / 100.0)
}

/// Value of a cleaned cell, `None` unless it is a plain number.
pub fn number(cleaned: &str) -> Option<f64> {
    if !regex_is_match!(r"^-?(\d+\.?\d*|\.\d+)$", cleaned) {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use test_casing::test_casing;

    use super::*;

    const CLEAN_CASES: [(&str, &str); 16] = [
        ("(1,234)", "-1234"),
        ("1,234", "1234"),
        ("1.234", "1234"),
        ("1 234 567", "1234567"),
        ("1.234.567", "1234567"),
        ("1,234.56", "1234.56"),
        ("1.234,56", "1234.56"),
        ("12,5", "12.5"),
        ("0,123", "0.123"),
        ("1234,567", "1234.567"),
        ("EUR 12 m", "12"),
        ("-", ""),
        (" - ", ""),
        ("n/a", ""),
        ("12<s>34</s>", "12"),
        ("25,5 %", "25.5%"),
    ];

    #[test_casing(16, CLEAN_CASES)]
    fn cleans_cells(cell: &str, expected: &str) {
        assert_eq!(clean_cell(cell), expected);
    }

    #[test_casing(16, CLEAN_CASES)]
    fn cleaning_is_idempotent(cell: &str, _expected: &str) {
        let once = clean_cell(cell);
        assert_eq!(clean_cell(&once), once);
    }

    #[gtest]
    fn bracketed_thousands_become_negative_number() {
        expect_that!(number(&clean_cell("(1,234)")), some(eq(-1234.0)));
    }

    #[gtest]
    fn parses_plain_numbers_only() {
        expect_that!(number("1234.5"), some(eq(1234.5)));
        expect_that!(number("-12"), some(eq(-12.0)));
        expect_that!(number(".5"), some(eq(0.5)));
        expect_that!(number(""), none());
        expect_that!(number("12%"), none());
        expect_that!(number("1-2"), none());
    }

    #[gtest]
    fn parses_percentages() {
        expect_that!(percentage("25.5%"), some(eq(0.255)));
        expect_that!(percentage("40%"), some(eq(0.4)));
        expect_that!(percentage("40"), none());
    }

    #[gtest]
    fn parses_rates() {
        expect_that!(rate("25%"), some(eq(0.25)));
        expect_that!(rate("-12.5"), some(eq(-0.125)));
        expect_that!(rate(""), none());
    }
}
