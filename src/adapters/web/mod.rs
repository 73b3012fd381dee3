//! JSON HTTP API over the price store and backtest engine.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{Router, http::HeaderValue, http::Method, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::domain::backfill::RetryPolicy;
use crate::ports::data_port::PriceStore;
use crate::ports::quote_port::QuoteSource;

pub struct AppState {
    pub store: Arc<dyn PriceStore + Send + Sync>,
    /// Refresh and backfill are disabled without a source.
    pub source: Option<Arc<dyn QuoteSource + Send + Sync>>,
    pub policy: RetryPolicy,
    pub starting_capital: f64,
}

pub fn build_router(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/prices/{symbol}", get(handlers::prices))
        .route("/refresh/{symbol}", get(handlers::refresh))
        .route("/backtest/{symbol}", get(handlers::backtest))
        .fallback(handlers::not_found)
        .with_state(Arc::new(state));

    match cors_origin {
        Some(origin) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET]),
        ),
        None => router,
    }
}
