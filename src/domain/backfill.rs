//! Filling the price store from a quote source.
//!
//! Only the sub-ranges missing from either end of the stored history are
//! requested. Fetches are retried with exponential backoff; inserts skip
//! existing (symbol, date) rows, so repeating a backfill inserts nothing.

use chrono::{Days, NaiveDate};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::PricelabError;
use super::ohlcv::OhlcvBar;
use crate::ports::data_port::PriceStore;
use crate::ports::quote_port::QuoteSource;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry `attempt` (1-based): base * 2^(attempt-1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1))
    }
}

/// Sub-ranges of [start, end] not covered by the stored (first, last) range.
pub fn missing_ranges(
    stored: Option<(NaiveDate, NaiveDate)>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(NaiveDate, NaiveDate)> {
    if start > end {
        return Vec::new();
    }
    let Some((first, last)) = stored else {
        return vec![(start, end)];
    };

    let mut ranges = Vec::new();
    if start < first {
        let before = first.checked_sub_days(Days::new(1)).unwrap_or(first);
        ranges.push((start, before.min(end)));
    }
    if end > last {
        let after = last.checked_add_days(Days::new(1)).unwrap_or(last);
        ranges.push((after.max(start), end));
    }
    ranges
}

pub fn fetch_with_retry(
    source: &dyn QuoteSource,
    policy: &RetryPolicy,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<OhlcvBar>, PricelabError> {
    let mut attempt = 0;
    loop {
        match source.fetch_daily(symbol, start, end) {
            Ok(bars) => return Ok(bars),
            Err(err @ PricelabError::DataSource { .. }) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    source = source.name(),
                    symbol,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "fetch failed, retrying: {err}"
                );
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fetch [start, end] for `symbol` and store it. Returns newly inserted rows.
pub fn backfill(
    store: &dyn PriceStore,
    source: &dyn QuoteSource,
    policy: &RetryPolicy,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<usize, PricelabError> {
    let fetched = fetch_with_retry(source, policy, symbol, start, end)?;
    let total = fetched.len();

    let bars: Vec<OhlcvBar> = fetched
        .into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .filter(|b| {
            let ok = b.is_consistent();
            if !ok {
                warn!(symbol, date = %b.date, "dropping inconsistent bar");
            }
            ok
        })
        .map(|b| OhlcvBar {
            symbol: symbol.to_string(),
            ..b
        })
        .collect();

    let inserted = store.insert_bars(&bars)?;
    info!(
        source = source.name(),
        symbol,
        %start,
        %end,
        fetched = total,
        inserted,
        "backfill complete"
    );
    Ok(inserted)
}

/// Backfill whatever part of [start, end] lies outside the stored range.
///
/// A data source failure after retries is logged and skipped so the caller
/// can fall back to stored bars; store failures propagate.
pub fn ensure_data_available(
    store: &dyn PriceStore,
    source: &dyn QuoteSource,
    policy: &RetryPolicy,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<usize, PricelabError> {
    let stored = match (store.get_earliest(symbol)?, store.get_latest(symbol)?) {
        (Some(first), Some(last)) => Some((first.date, last.date)),
        _ => None,
    };
    let ranges = missing_ranges(stored, start, end);
    if ranges.is_empty() {
        debug!(symbol, %start, %end, "stored data covers requested range");
        return Ok(0);
    }

    let mut inserted = 0;
    for (from, to) in ranges {
        info!(symbol, from = %from, to = %to, "fetching missing range");
        match backfill(store, source, policy, symbol, from, to) {
            Ok(n) => inserted += n,
            Err(err @ PricelabError::DataSource { .. }) => {
                warn!(symbol, "giving up on {from}..{to}, using stored data: {err}");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(inserted)
}
