#![allow(dead_code)]

use chrono::NaiveDate;
use pricelab::domain::error::PricelabError;
pub use pricelab::domain::ohlcv::OhlcvBar;
use pricelab::ports::data_port::PriceStore;
use pricelab::ports::quote_port::QuoteSource;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory store keyed by (symbol, date); inserts skip existing keys.
#[derive(Default)]
pub struct MockPriceStore {
    pub bars: Mutex<BTreeMap<(String, NaiveDate), OhlcvBar>>,
}

impl MockPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(self, bars: Vec<OhlcvBar>) -> Self {
        self.insert_bars(&bars).unwrap();
        self
    }

    pub fn len(&self) -> usize {
        self.bars.lock().unwrap().len()
    }
}

impl PriceStore for MockPriceStore {
    fn get_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError> {
        Ok(self
            .bars
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.symbol == symbol && b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<usize, PricelabError> {
        let mut stored = self.bars.lock().unwrap();
        let mut inserted = 0;
        for bar in bars {
            let key = (bar.symbol.clone(), bar.date);
            if !stored.contains_key(&key) {
                stored.insert(key, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn get_earliest(&self, symbol: &str) -> Result<Option<OhlcvBar>, PricelabError> {
        Ok(self
            .bars
            .lock()
            .unwrap()
            .values()
            .find(|b| b.symbol == symbol)
            .cloned())
    }

    fn get_latest(&self, symbol: &str) -> Result<Option<OhlcvBar>, PricelabError> {
        Ok(self
            .bars
            .lock()
            .unwrap()
            .values()
            .rev()
            .find(|b| b.symbol == symbol)
            .cloned())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PricelabError> {
        let stored = self.bars.lock().unwrap();
        let dates: Vec<NaiveDate> = stored
            .values()
            .filter(|b| b.symbol == symbol)
            .map(|b| b.date)
            .collect();
        match (dates.first(), dates.last()) {
            (Some(&first), Some(&last)) => Ok(Some((first, last, dates.len()))),
            _ => Ok(None),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, PricelabError> {
        let mut symbols: Vec<String> = self
            .bars
            .lock()
            .unwrap()
            .keys()
            .map(|(s, _)| s.clone())
            .collect();
        symbols.dedup();
        Ok(symbols)
    }
}

/// Quote source backed by a fixed bar list. Records every requested range
/// and can be told to fail a number of times before succeeding.
#[derive(Default)]
pub struct MockQuoteSource {
    pub bars: HashMap<String, Vec<OhlcvBar>>,
    pub failures_remaining: Mutex<u32>,
    pub calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn failing(self, times: u32) -> Self {
        *self.failures_remaining.lock().unwrap() = times;
        self
    }

    pub fn calls(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.calls.lock().unwrap().clone()
    }
}

impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), start_date, end_date));

        let mut failures = self.failures_remaining.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(PricelabError::DataSource {
                source_name: "mock".into(),
                symbol: symbol.to_string(),
                reason: "simulated outage".into(),
            });
        }

        Ok(self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(symbol: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date: d(date),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

/// One bar per calendar day, starting at `start_date`, from the given closes.
pub fn bars_from_closes(symbol: &str, start_date: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = d(start_date);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            symbol: symbol.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        })
        .collect()
}

pub fn generate_bars(symbol: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    bars_from_closes(symbol, start_date, &closes)
}
