//! CSV directory quote source.
//!
//! Reads `<base_path>/<SYMBOL>.csv` with a `date,open,high,low,close,volume`
//! header (Yahoo-style capitalized headers and extra columns are accepted).

use crate::domain::error::PricelabError;
use crate::domain::ohlcv::{validate_symbol, OhlcvBar};
use crate::ports::quote_port::QuoteSource;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> Result<PathBuf, PricelabError> {
        validate_symbol(symbol)?;
        Ok(self.base_path.join(format!("{}.csv", symbol)))
    }

    fn source_error(&self, symbol: &str, reason: String) -> PricelabError {
        PricelabError::DataSource {
            source_name: self.name().to_string(),
            symbol: symbol.to_string(),
            reason,
        }
    }
}

impl QuoteSource for CsvAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError> {
        let path = self.csv_path(symbol)?;
        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| self.source_error(symbol, format!("failed to read {}: {}", path.display(), e)))?;

        let mut bars = Vec::new();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| {
                self.source_error(symbol, format!("CSV parse error at record {}: {}", line + 1, e))
            })?;

            if row.date < start_date || row.date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                symbol: symbol.to_string(),
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
