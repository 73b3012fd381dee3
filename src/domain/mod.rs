//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod indicator;
pub mod strategy;
pub mod evaluator;
pub mod metrics;
pub mod backfill;
pub mod backtest;
pub mod config_validation;
pub mod error;
