//! Average exchange rates to the euro, per currency and period.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use hashbrown::HashMap;
use serde::Deserialize;

use crate::error::{ConfigError, StandardizationError};

type CsvResult<T> = std::result::Result<T, csv::Error>;

/// Exchange rate table keyed by (currency, end of period date).
#[derive(Clone, Debug, Default)]
pub struct ExchangeRates {
    rates: HashMap<(String, String), f64>,
}

impl ExchangeRates {
    fn from_records(records: impl IntoIterator<Item = CsvResult<CsvRecord>>) -> Result<Self, ConfigError> {
        let mut rates = HashMap::new();
        for record in records {
            let record = record?;
            rates.insert((record.currency, record.end_of_year), record.rate);
        }
        Ok(Self { rates })
    }

    /// Reads a CSV document with the header
    /// `from,end_of_year,total_days,rolling_12_months_avg_rate`. The last
    /// column may also be named `rate`.
    pub fn read<R: Read>(r: R) -> Result<Self, ConfigError> {
        let mut reader = csv::Reader::from_reader(r);
        Self::from_records(reader.deserialize::<CsvRecord>())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::read(file)
    }

    pub fn insert(&mut self, currency: &str, end_of_year: &str, rate: f64) {
        self.rates
            .insert((currency.to_string(), end_of_year.to_string()), rate);
    }

    /// Rate of `currency` averaged over the period ending at `end_of_year`
    /// (`YYYY.MM.DD`).
    pub fn rate(&self, currency: &str, end_of_year: &str) -> Result<f64, StandardizationError> {
        self.rates
            .get(&(currency.to_string(), end_of_year.to_string()))
            .copied()
            .ok_or_else(|| StandardizationError::MissingExchangeRate {
                currency: currency.to_string(),
                end_of_year: end_of_year.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "from")]
    currency: String,
    end_of_year: String,
    #[serde(alias = "rolling_12_months_avg_rate")]
    rate: f64,
}
