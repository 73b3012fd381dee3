//! HTTP request handlers for web adapter.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::backfill::backfill;
use crate::domain::backtest::{BacktestRequest, run_backtest};
use crate::domain::error::PricelabError;
use crate::domain::ohlcv::{normalize_symbol, OhlcvBar};
use crate::domain::strategy::{DEFAULT_STRATEGY, StrategyInputs, StrategyParams};
use crate::ports::quote_port::QuoteSource;

use super::{AppState, WebError};

#[derive(Debug, Default, Deserialize)]
pub struct BacktestQuery {
    pub strategy: Option<String>,
    pub threshold: Option<f64>,
    pub holding_period: Option<usize>,
    pub short_window: Option<usize>,
    pub long_window: Option<usize>,
    pub rsi_window: Option<usize>,
    pub buy_threshold: Option<f64>,
    pub sell_threshold: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BacktestQuery {
    fn inputs(&self) -> StrategyInputs {
        StrategyInputs {
            threshold: self.threshold,
            holding_period: self.holding_period,
            short_window: self.short_window,
            long_window: self.long_window,
            rsi_window: self.rsi_window,
            buy_threshold: self.buy_threshold,
            sell_threshold: self.sell_threshold,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub inserted: usize,
}

/// Runs store and network work on tokio's blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, WebError>
where
    F: FnOnce() -> Result<T, PricelabError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WebError::internal(format!("worker task failed: {e}")))?
        .map_err(WebError::from)
}

fn normalize(symbol: &str) -> Result<String, WebError> {
    normalize_symbol(symbol).map_err(WebError::from)
}

fn start_of_year(today: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn prices(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<OhlcvBar>>, WebError> {
    let symbol = normalize(&symbol)?;

    let bars = {
        let symbol = symbol.clone();
        blocking(move || match state.store.get_data_range(&symbol)? {
            Some((first, last, _)) => state.store.get_range(&symbol, first, last),
            None => Ok(Vec::new()),
        })
        .await?
    };

    if bars.is_empty() {
        return Err(WebError::not_found(format!("no data found for {symbol}")));
    }
    Ok(Json(bars))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<RefreshResponse>, WebError> {
    let symbol = normalize(&symbol)?;
    let source = state.source.clone().ok_or_else(|| {
        WebError::new(StatusCode::SERVICE_UNAVAILABLE, "no quote source configured")
    })?;

    let end = Local::now().date_naive();
    let start = start_of_year(end);

    let inserted = {
        let symbol = symbol.clone();
        blocking(move || {
            backfill(
                state.store.as_ref(),
                source.as_ref(),
                &state.policy,
                &symbol,
                start,
                end,
            )
        })
        .await?
    };

    info!(%symbol, inserted, "refresh complete");
    Ok(Json(RefreshResponse {
        message: format!("Inserted {inserted} new rows for {symbol}."),
        inserted,
    }))
}

pub async fn backtest(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    query: Result<Query<BacktestQuery>, QueryRejection>,
) -> Result<Response, WebError> {
    let symbol = normalize(&symbol)?;
    let Query(query) = query.map_err(|e| WebError::bad_request(e.body_text()))?;
    let strategy_name = query.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY);
    let strategy = StrategyParams::from_name(strategy_name, &query.inputs())?;

    let today = Local::now().date_naive();
    let end_date = query.end_date.unwrap_or(today);
    let start_date = query.start_date.unwrap_or_else(|| start_of_year(end_date));

    let request = BacktestRequest::new(&symbol, start_date, end_date, strategy)
        .with_starting_capital(state.starting_capital);
    request.validate()?;

    let result = blocking(move || {
        let source = state.source.as_deref().map(|s| s as &dyn QuoteSource);
        run_backtest(state.store.as_ref(), source, &state.policy, &request)
    })
    .await?;

    Ok(Json(result.document()).into_response())
}

pub async fn not_found() -> WebError {
    WebError::not_found("not found")
}
