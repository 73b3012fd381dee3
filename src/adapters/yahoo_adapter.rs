//! Yahoo Finance quote source.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. A single request per
//! call; retries are the caller's [`RetryPolicy`](crate::domain::backfill::RetryPolicy).

use crate::domain::error::PricelabError;
use crate::domain::ohlcv::{validate_symbol, OhlcvBar};
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::QuoteSource;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new(timeout: Duration) -> Result<Self, PricelabError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| PricelabError::ConfigInvalid {
                section: "source".into(),
                key: "timeout_secs".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PricelabError> {
        let timeout_secs = config.get_int("source", "timeout_secs", 30).max(1) as u64;
        let mut adapter = Self::new(Duration::from_secs(timeout_secs))?;
        if let Some(url) = config.get_non_empty("source", "base_url") {
            adapter.base_url = url;
        }
        Ok(adapter)
    }

    /// Chart API URL covering [start, end] inclusive.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or(start_ts);
        format!(
            "{}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d",
            self.base_url
        )
    }

    fn source_error(&self, symbol: &str, reason: String) -> PricelabError {
        PricelabError::DataSource {
            source_name: self.name().to_string(),
            symbol: symbol.to_string(),
            reason,
        }
    }

    fn parse_response(&self, symbol: &str, resp: ChartResponse) -> Result<Vec<OhlcvBar>, PricelabError> {
        let Some(result) = resp.chart.result else {
            let reason = match resp.chart.error {
                Some(err) => format!("{}: {}", err.code, err.description),
                None => "empty result with no error".into(),
            };
            return Err(self.source_error(symbol, reason));
        };

        // Yahoo returns a result without timestamps for ranges with no trading days.
        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        // Timestamps mark the session open in UTC; the trading date is the
        // exchange-local one.
        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| self.source_error(symbol, "no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| self.source_error(symbol, format!("invalid timestamp: {ts}")))?;

            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            // Rows with any missing price are non-trading placeholders.
            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };

            bars.push(OhlcvBar {
                symbol: symbol.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume: field(&quote.volume).unwrap_or(0.0),
            });
        }

        Ok(bars)
    }
}

impl QuoteSource for YahooAdapter {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, PricelabError> {
        validate_symbol(symbol)?;
        let url = self.chart_url(symbol, start_date, end_date);
        debug!(%url, "requesting chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.source_error(symbol, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.source_error(symbol, format!("HTTP {status}")));
        }

        let chart: ChartResponse = resp
            .json()
            .map_err(|e| self.source_error(symbol, format!("failed to parse response: {e}")))?;

        let bars = self.parse_response(symbol, chart)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect())
    }
}
