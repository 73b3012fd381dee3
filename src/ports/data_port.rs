//! Price store port trait.

use crate::domain::error::PricelabError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Queryable, ordered daily bars keyed by (symbol, date).
pub trait PriceStore {
    /// Bars within [start_date, end_date], ascending by date.
    fn get_range(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError>;

    /// Insert bars, skipping any (symbol, date) already stored. Returns the
    /// number of newly inserted rows.
    fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<usize, PricelabError>;

    fn get_earliest(&self, symbol: &str) -> Result<Option<OhlcvBar>, PricelabError>;

    fn get_latest(&self, symbol: &str) -> Result<Option<OhlcvBar>, PricelabError>;

    /// (first date, last date, bar count) for a symbol.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PricelabError>;

    fn list_symbols(&self) -> Result<Vec<String>, PricelabError>;
}
