//! Backtest orchestration: data availability, strategy dispatch, summary.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::backfill::{ensure_data_available, RetryPolicy};
use super::error::PricelabError;
use super::evaluator::{evaluate, EquityPoint};
use super::metrics::{PerformanceReport, DEFAULT_STARTING_CAPITAL};
use super::ohlcv::{validate_symbol, PriceSeries};
use super::position::Trade;
use super::strategy::StrategyParams;
use crate::ports::data_port::PriceStore;
use crate::ports::quote_port::QuoteSource;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub strategy: StrategyParams,
    pub starting_capital: f64,
}

impl BacktestRequest {
    /// Symbols are normalized to trimmed upper case.
    pub fn new(
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        strategy: StrategyParams,
    ) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            start_date,
            end_date,
            strategy,
            starting_capital: DEFAULT_STARTING_CAPITAL,
        }
    }

    pub fn with_starting_capital(mut self, starting_capital: f64) -> Self {
        self.starting_capital = starting_capital;
        self
    }

    pub fn validate(&self) -> Result<(), PricelabError> {
        validate_symbol(&self.symbol)?;
        if self.start_date > self.end_date {
            return Err(PricelabError::invalid_parameter(
                "start_date",
                format!("{} is after end_date {}", self.start_date, self.end_date),
            ));
        }
        if !(self.starting_capital.is_finite() && self.starting_capital > 0.0) {
            return Err(PricelabError::invalid_parameter(
                "starting_capital",
                "must be positive",
            ));
        }
        self.strategy.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: StrategyParams,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub report: PerformanceReport,
}

/// Inclusive date range of a backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Serialized view of a result, shared by the JSON report and the HTTP API.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub symbol: &'a str,
    pub strategy: &'a StrategyParams,
    pub starting_capital: f64,
    pub period: Period,
    pub performance_summary: &'a PerformanceReport,
    pub trades: &'a [Trade],
    pub equity_curve: &'a [EquityPoint],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BacktestResult {
    pub fn document(&self) -> ReportDocument<'_> {
        ReportDocument {
            symbol: &self.symbol,
            strategy: &self.strategy,
            starting_capital: self.starting_capital,
            period: Period {
                start_date: self.start_date,
                end_date: self.end_date,
            },
            performance_summary: &self.report,
            trades: &self.trades,
            equity_curve: &self.equity_curve,
            message: self.no_trades().map(|e| e.to_string()),
        }
    }

    pub fn has_trades(&self) -> bool {
        !self.trades.is_empty()
    }

    /// The non-fatal `NoTrades` condition, if the strategy never closed a trade.
    pub fn no_trades(&self) -> Option<PricelabError> {
        if self.has_trades() {
            None
        } else {
            Some(PricelabError::NoTrades {
                symbol: self.symbol.clone(),
                strategy: self.strategy.name().to_string(),
            })
        }
    }

    /// Treat an empty trade log as an error.
    pub fn require_trades(self) -> Result<Self, PricelabError> {
        match self.no_trades() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Run one backtest. When `source` is given, missing ends of the requested
/// range are backfilled first; otherwise only stored bars are used.
pub fn run_backtest(
    store: &dyn PriceStore,
    source: Option<&dyn QuoteSource>,
    policy: &RetryPolicy,
    request: &BacktestRequest,
) -> Result<BacktestResult, PricelabError> {
    request.validate()?;
    let symbol = request.symbol.as_str();

    if let Some(source) = source {
        ensure_data_available(
            store,
            source,
            policy,
            symbol,
            request.start_date,
            request.end_date,
        )?;
    }

    let series = PriceSeries::new(
        symbol,
        store.get_range(symbol, request.start_date, request.end_date)?,
    );
    let bars = series.slice(request.start_date, request.end_date);
    if bars.is_empty() {
        return Err(PricelabError::NoData {
            symbol: symbol.to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
        });
    }

    info!(
        symbol = series.symbol(),
        strategy = %request.strategy,
        bars = bars.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "running backtest"
    );
    let evaluation = evaluate(bars, &request.strategy);
    let report = PerformanceReport::summarize(
        &evaluation.trades,
        &evaluation.equity_curve,
        request.start_date,
        request.end_date,
        request.starting_capital,
    );

    let result = BacktestResult {
        symbol: symbol.to_string(),
        strategy: request.strategy.clone(),
        start_date: request.start_date,
        end_date: request.end_date,
        starting_capital: request.starting_capital,
        trades: evaluation.trades,
        equity_curve: evaluation.equity_curve,
        report,
    };

    if let Some(err) = result.no_trades() {
        warn!(symbol, "{err}");
    } else {
        info!(
            symbol,
            trades = result.trades.len(),
            total_pnl = result.report.total_pnl,
            "backtest complete"
        );
    }
    Ok(result)
}
