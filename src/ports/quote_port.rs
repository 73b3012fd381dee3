//! External market-data source port trait.

use crate::domain::error::PricelabError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait QuoteSource {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Daily bars for [start_date, end_date], inclusive. Failures are
    /// reported as `PricelabError::DataSource`.
    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError>;
}
