//! Recognition of jurisdiction names and their mapping to ISO 3166-1 alpha-3
//! codes.

mod countries;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use hashbrown::{HashMap, HashSet};

use crate::error::ConfigError;
use crate::text::neatify;

pub use countries::{COUNTRIES, Country};

/// Continents recognised when counting jurisdiction-like cells.
const COUNTED_CONTINENTS: &[&str] = &["AFRICA", "EUROPE", "AMERICA", "ASIA", "NORTH AMERICA"];

/// Continents that the fuzzy search returns unchanged.
const RESOLVED_CONTINENTS: &[&str] = &["africa", "america", "europe"];

const EXACT_SCORE: u32 = 50;
const CONTINENT_SCORE: u32 = 51;
const MIN_FUZZY_QUERY_LEN: usize = 3;
const MIN_FUZZY_SCORE: u32 = 20;

/// Frequent spellings that neither the ISO names nor the fuzzy search get
/// right.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("uk", "GBR"),
    ("great britain", "GBR"),
    ("england", "GBR"),
    ("scotland", "GBR"),
    ("us", "USA"),
    ("usa", "USA"),
    ("united states of america", "USA"),
    ("holland", "NLD"),
    ("the netherlands", "NLD"),
    ("russia", "RUS"),
    ("south korea", "KOR"),
    ("korea", "KOR"),
    ("uae", "ARE"),
    ("ivory coast", "CIV"),
    ("turkey", "TUR"),
    ("vietnam", "VNM"),
    ("czech republic", "CZE"),
    ("slovak republic", "SVK"),
    ("macau", "MAC"),
    ("hong kong sar", "HKG"),
    ("swaziland", "SWZ"),
    ("cape verde", "CPV"),
    ("macedonia", "MKD"),
    ("burma", "MMR"),
    ("kosovo", "XKX"),
];

/// Maps free text jurisdiction names to ISO 3166-1 alpha-3 codes.
#[derive(Clone, Debug)]
pub struct JurisdictionResolver {
    alpha3: HashSet<&'static str>,
    /// Normalised ISO names to alpha-3 code.
    names: HashMap<String, &'static str>,
    /// Normalised alternative names to alpha-3 code.
    aliases: HashMap<String, String>,
}

impl Default for JurisdictionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl JurisdictionResolver {
    /// A resolver that only knows the ISO names.
    pub fn new() -> Self {
        let mut names = HashMap::new();
        for country in COUNTRIES {
            for name in [Some(country.name), country.official_name, country.common_name]
                .into_iter()
                .flatten()
            {
                names.insert(neatify(name), country.alpha3);
            }
        }
        Self {
            alpha3: COUNTRIES.iter().map(|c| c.alpha3).collect(),
            names,
            aliases: HashMap::new(),
        }
    }

    /// A resolver that also knows a few frequent alternative spellings.
    pub fn with_builtin_aliases() -> Self {
        let mut resolver = Self::new();
        for (name, code) in BUILTIN_ALIASES {
            resolver.add_alias(name, code);
        }
        resolver
    }

    pub fn add_alias(&mut self, name: &str, code: &str) {
        self.aliases.insert(neatify(name), code.to_uppercase());
    }

    /// Merges aliases from a headerless `name,code` CSV document. Rows
    /// without a code are ignored.
    pub fn read_aliases<R: Read>(&mut self, r: R) -> Result<(), ConfigError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(r);
        for record in reader.records() {
            let record = record?;
            match (record.get(0), record.get(1).map(str::trim)) {
                (Some(name), Some(code)) if !code.is_empty() => self.add_alias(name, code),
                _ => {}
            }
        }
        Ok(())
    }

    /// Builtin aliases merged with those of the CSV file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut resolver = Self::with_builtin_aliases();
        resolver.read_aliases(file)?;
        Ok(resolver)
    }

    /// Returns `true` if `code` is an ISO 3166-1 alpha-3 code, Kosovo
    /// included.
    pub fn is_iso(&self, code: &str) -> bool {
        self.alpha3.contains(code)
    }

    /// Returns `true` if the cell names a jurisdiction by code, ISO name,
    /// known alias or continent.
    pub fn is_countryish(&self, cell: &str) -> bool {
        let upper = cell.trim().to_uppercase();
        if self.alpha3.contains(upper.as_str()) || COUNTED_CONTINENTS.contains(&upper.as_str()) {
            return true;
        }
        let name = neatify(cell);
        self.names.contains_key(&name) || self.aliases.contains_key(&name)
    }

    /// Counts jurisdiction-like cells, stopping early once `stop_at` is
    /// reached.
    pub fn count_countries<'a>(
        &self,
        cells: impl IntoIterator<Item = &'a str>,
        stop_at: Option<usize>,
    ) -> usize {
        let mut total = 0;
        for cell in cells {
            if self.is_countryish(cell) {
                total += 1;
            }
            if stop_at.is_some_and(|stop| total >= stop) {
                break;
            }
        }
        total
    }

    /// Resolves a normalised jurisdiction name, trying in turn the code
    /// itself, the aliases and a fuzzy search over the ISO names.
    pub fn to_iso3166(&self, name: &str) -> Option<String> {
        let upper = name.to_uppercase();
        if self.is_iso(&upper) {
            return Some(upper);
        }
        if let Some(code) = self.aliases.get(name) {
            return Some(code.clone());
        }
        if let Some(code) = self.names.get(name) {
            return Some(code.to_string());
        }
        if name.len() < MIN_FUZZY_QUERY_LEN {
            return None;
        }
        let best = self.search_fuzzy(name).into_iter().next()?;
        log::debug!("fuzzy match of {name:?}: {best:?}");
        (best.1 >= MIN_FUZZY_SCORE).then_some(best.0)
    }

    /// Scores every ISO entry against `query`, best first, ties broken by
    /// code.
    pub fn search_fuzzy(&self, query: &str) -> Vec<(String, u32)> {
        let query = query.trim().to_lowercase();
        if RESOLVED_CONTINENTS.contains(&query.as_str()) {
            return vec![(query, CONTINENT_SCORE)];
        }

        let mut scores: HashMap<&'static str, u32> = HashMap::new();
        if let Some(country) = COUNTRIES.iter().find(|c| is_exact_match(c, &query)) {
            *scores.entry(country.alpha3).or_default() += EXACT_SCORE;
        }
        for country in COUNTRIES {
            let names = [Some(country.name), country.official_name, country.common_name];
            let position = names
                .into_iter()
                .flatten()
                .find_map(|name| name.to_lowercase().find(&query));
            if let Some(position) = position {
                let points = 30_u32.saturating_sub(2 * position as u32).max(5);
                *scores.entry(country.alpha3).or_default() += points;
            }
        }

        let mut results: Vec<(String, u32)> = scores
            .into_iter()
            .map(|(code, points)| (code.to_string(), points))
            .collect();
        results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results
    }
}

fn is_exact_match(country: &Country, query: &str) -> bool {
    [
        Some(country.alpha2),
        Some(country.alpha3),
        Some(country.name),
        country.official_name,
        country.common_name,
    ]
    .into_iter()
    .flatten()
    .any(|field| field.eq_ignore_ascii_case(query))
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use test_casing::test_casing;

    use super::*;

    #[gtest]
    fn fuzzy_matches_country_name() {
        let resolver = JurisdictionResolver::new();

        expect_that!(resolver.to_iso3166("united kingdom"), some(eq("GBR")));
    }

    const RESOLVED_CASES: [(&str, &str); 7] = [
        ("fra", "FRA"),
        ("germany", "DEU"),
        ("uk", "GBR"),
        ("the netherlands", "NLD"),
        ("kosovo", "XKX"),
        ("europe", "europe"),
        ("luxemb", "LUX"),
    ];

    #[test_casing(7, RESOLVED_CASES)]
    fn resolves_with_aliases(name: &str, expected: &str) {
        let resolver = JurisdictionResolver::with_builtin_aliases();

        assert_that!(resolver.to_iso3166(name), some(eq(expected)));
    }

    #[gtest]
    fn rejects_short_or_weak_queries() {
        let resolver = JurisdictionResolver::new();

        expect_that!(resolver.to_iso3166("xy"), none());
        expect_that!(resolver.to_iso3166("rest of world"), none());
        expect_that!(resolver.to_iso3166("other"), none());
    }

    #[gtest]
    fn fuzzy_results_are_ranked_by_score_then_code() {
        let results = JurisdictionResolver::new().search_fuzzy("guinea");
        let codes: Vec<&str> = results.iter().take(3).map(|(code, _)| code.as_str()).collect();

        expect_that!(codes, elements_are![eq(&"GIN"), eq(&"GNB"), eq(&"PNG")]);
    }

    #[gtest]
    fn counts_countryish_cells() {
        let resolver = JurisdictionResolver::with_builtin_aliases();
        let cells = ["Country", "FRA", "Asia", "UK", "Revenue", "12"];

        expect_eq!(resolver.count_countries(cells, None), 3);
        expect_eq!(resolver.count_countries(cells, Some(2)), 2);
    }

    #[gtest]
    fn reads_alias_csv() -> anyhow::Result<()> {
        let mut resolver = JurisdictionResolver::new();
        resolver.read_aliases("Channel Islands,JEY\nRest of world,\nBlighty,gbr\n".as_bytes())?;

        expect_that!(resolver.to_iso3166("channel islands"), some(eq("JEY")));
        expect_that!(resolver.to_iso3166("blighty"), some(eq("GBR")));
        expect_that!(resolver.to_iso3166("rest of world"), none());
        Ok(())
    }
}
