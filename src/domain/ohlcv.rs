//! OHLCV bar and price series representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::PricelabError;

pub const MAX_SYMBOL_LEN: usize = 16;

/// Accepts `A-Z`, `0-9` and `. ^ = -`, up to [`MAX_SYMBOL_LEN`] characters.
/// Symbols are used as file names and URL path segments.
pub fn validate_symbol(symbol: &str) -> Result<(), PricelabError> {
    if symbol.is_empty() {
        return Err(PricelabError::invalid_parameter("symbol", "must not be empty"));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(PricelabError::invalid_parameter(
            "symbol",
            format!("longer than {MAX_SYMBOL_LEN} characters"),
        ));
    }
    if let Some(c) = symbol
        .chars()
        .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '=' | '-')))
    {
        return Err(PricelabError::invalid_parameter(
            "symbol",
            format!("'{symbol}' contains '{c}'"),
        ));
    }
    Ok(())
}

/// Trimmed, upper-cased and validated.
pub fn normalize_symbol(raw: &str) -> Result<String, PricelabError> {
    let symbol = raw.trim().to_uppercase();
    validate_symbol(&symbol)?;
    Ok(symbol)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// All fields finite and non-negative, high/low bracketing open and close.
    pub fn is_consistent(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return false;
        }
        self.high >= self.open.max(self.close).max(self.low)
            && self.low <= self.open.min(self.close).min(self.high)
    }
}

/// Daily bars for a single symbol, ascending by date with no duplicate dates.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    /// Sorts by date and keeps the first bar seen for each date.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Bars within [start, end], inclusive on both ends.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> &[OhlcvBar] {
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date <= end);
        if lo >= hi { &[] } else { &self.bars[lo..hi] }
    }
}
