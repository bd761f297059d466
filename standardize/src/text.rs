//! Text normalisation and lexical heuristics shared by the classifier and the
//! standardizer.

use lazy_regex::{regex, regex_find, regex_is_match, regex_replace_all};

/// Terms whose presence marks a grid as a likely disclosure table.
pub const DISCLOSURE_TERMS: &[&str] = &[
    // English.
    "tax",
    "related",
    "income",
    "employee",
    "unrelated",
    "third",
    "tangible",
    "assets",
    "party",
    "parties",
    "accrued",
    "profit",
    "revenue",
    "paid",
    "earnings",
    "capital",
    "turnover",
    // Italian.
    "imposte",
    "pagate",
    "reddito",
    "utile",
    // Spanish.
    "impuesto",
    "ingresos",
    "beneficio",
    "empleados",
    // French.
    "impot",
    "chiffre",
    "benefice",
    // German.
    "steuer",
    "umsatz",
    "mitarbeiter",
];

/// Cleans leading, trailing, and redundant whitespace from a string, in-place.
pub fn clean_text(s: &mut String) {
    let trimmed = s.trim();
    // Skip the copy/realloc if nothing to do.
    if trimmed.len() != s.len() || regex_find!(r"\s{2,}", &trimmed).is_some() {
        let new = regex_replace_all!(r"\s{2,}", trimmed, " ");
        *s = new.to_string();
    }
}

/// Reduces a label to lowercase ASCII words.
///
/// Everything but ASCII letters and apostrophes becomes whitespace, a trailing
/// stand-alone character (footnote marker) or trailing "mn" is dropped, and
/// whitespace is collapsed.
pub fn neatify(s: &str) -> String {
    let letters = regex_replace_all!(r"[^a-zA-Z ']", s, " ");
    let unmarked = regex_replace_all!(r"(\s\S\s*$)|(\smn\s*$)", &letters, " ");
    unmarked
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns `true` if the cell looks like it holds a numeric disclosure value.
pub fn has_double_digits(cell: &str) -> bool {
    regex_is_match!(r"\d{2}", cell)
}

/// Returns `true` for a bare four digit year such as "2020".
pub fn is_bare_year(s: &str) -> bool {
    regex_is_match!(r"^\d{4}$", s)
}

/// Counts occurrences of disclosure terms in `cell`, each matched at a word
/// start.
pub fn count_terms_in(cell: &str) -> usize {
    let rx = regex!(
        r"\b(tax|related|income|employee|unrelated|third|tangible|assets|party|parties|accrued|profit|revenue|paid|earnings|capital|turnover|imposte|pagate|reddito|utile|impuesto|ingresos|beneficio|empleados|impot|chiffre|benefice|steuer|umsatz|mitarbeiter)"
    );
    rx.find_iter(&cell.to_lowercase()).count()
}
