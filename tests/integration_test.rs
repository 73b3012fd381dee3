//! Integration tests for the backtest orchestrator and backfill.
//!
//! Tests cover:
//! - Full run over a mock store, with and without a quote source
//! - Partial refetch: only the missing edges of the stored range are requested
//! - Retry and degrade-to-stored-data behavior on source failures
//! - NoData / NoTrades / UnknownStrategy outcomes
//! - Backfill idempotence against an in-memory SQLite store

mod common;

use common::*;
use pricelab::domain::backfill::{backfill, ensure_data_available, RetryPolicy};
use pricelab::domain::backtest::{run_backtest, BacktestRequest};
use pricelab::domain::error::PricelabError;
use pricelab::domain::strategy::{StrategyInputs, StrategyParams};
use pricelab::ports::data_port::PriceStore;
use pricelab::ports::quote_port::QuoteSource;
use std::process::ExitCode;
use std::time::Duration;

fn threshold(threshold: f64, holding_period: usize) -> StrategyParams {
    StrategyParams::ThresholdCross {
        threshold,
        holding_period,
    }
}

fn instant_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::ZERO,
    }
}

mod full_backtest {
    use super::*;

    #[test]
    fn threshold_cross_over_stored_bars() {
        let store = MockPriceStore::new().with_bars(bars_from_closes(
            "AAPL",
            "2025-01-01",
            &[90.0, 95.0, 101.0, 98.0, 105.0],
        ));
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-05"), threshold(100.0, 2));

        let result = run_backtest(&store, None, &RetryPolicy::no_retry(), &request).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_date, d("2025-01-03"));
        assert_eq!(trade.entry_price, 101.0);
        assert_eq!(trade.exit_date, d("2025-01-05"));
        assert_eq!(trade.exit_price, 105.0);
        assert_eq!(trade.pnl, 4.0);

        assert_eq!(result.equity_curve.len(), 5);
        assert_eq!(result.report.total_pnl, 4.0);
        assert_eq!(result.report.total_trades, 1);
        assert_eq!(result.report.trades_won, 1);
        assert_eq!(result.report.final_capital, 10_004.0);
        assert!(result.no_trades().is_none());
    }

    #[test]
    fn moving_average_crossover_over_stored_bars() {
        let store = MockPriceStore::new().with_bars(bars_from_closes(
            "AAPL",
            "2025-01-01",
            &[10.0, 10.0, 10.0, 12.0, 14.0, 9.0, 8.0],
        ));
        let strategy = StrategyParams::MovingAverage {
            short_window: 2,
            long_window: 3,
        };
        let request = BacktestRequest::new("aapl", d("2025-01-01"), d("2025-01-07"), strategy);

        let result = run_backtest(&store, None, &RetryPolicy::no_retry(), &request).unwrap();

        assert_eq!(result.symbol, "AAPL");
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_price, 12.0);
        assert_eq!(result.trades[0].exit_price, 9.0);
        assert_eq!(result.trades[0].pnl, -3.0);

        let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
        assert_eq!(equity, vec![0.0, 0.0, 0.0, -3.0, -3.0]);
        assert!(result.report.max_drawdown < 0.0);
    }

    #[test]
    fn only_bars_inside_range_are_evaluated() {
        let store = MockPriceStore::new().with_bars(generate_bars("AAPL", "2025-01-01", 30, 100.0));
        let request =
            BacktestRequest::new("AAPL", d("2025-01-10"), d("2025-01-19"), threshold(1000.0, 5));

        let result = run_backtest(&store, None, &RetryPolicy::no_retry(), &request).unwrap();

        assert_eq!(result.equity_curve.len(), 10);
        assert_eq!(result.equity_curve[0].date, d("2025-01-10"));
        assert_eq!(result.equity_curve[9].date, d("2025-01-19"));
    }

    #[test]
    fn backfills_empty_store_before_running() {
        let store = MockPriceStore::new();
        let source = MockQuoteSource::new().with_bars(
            "AAPL",
            bars_from_closes("AAPL", "2025-01-01", &[90.0, 95.0, 101.0, 98.0, 105.0]),
        );
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-05"), threshold(100.0, 2));

        let result = run_backtest(&store, Some(&source as &dyn QuoteSource), &RetryPolicy::no_retry(), &request).unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(source.calls(), vec![("AAPL".to_string(), d("2025-01-01"), d("2025-01-05"))]);
        assert_eq!(result.report.total_pnl, 4.0);
    }
}

mod outcomes {
    use super::*;

    #[test]
    fn empty_store_is_no_data() {
        let store = MockPriceStore::new();
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-31"), threshold(100.0, 2));

        let err = run_backtest(&store, None, &RetryPolicy::no_retry(), &request).unwrap_err();
        match &err {
            PricelabError::NoData {
                symbol,
                start_date,
                end_date,
            } => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(*start_date, d("2025-01-01"));
                assert_eq!(*end_date, d("2025-01-31"));
            }
            other => panic!("expected NoData, got: {other}"),
        }
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
    }

    #[test]
    fn source_with_nothing_is_no_data() {
        let store = MockPriceStore::new();
        let source = MockQuoteSource::new();
        let request =
            BacktestRequest::new("ZZZZ", d("2025-01-01"), d("2025-01-31"), threshold(100.0, 2));

        let err = run_backtest(&store, Some(&source as &dyn QuoteSource), &RetryPolicy::no_retry(), &request).unwrap_err();
        assert!(matches!(err, PricelabError::NoData { .. }));
        assert_eq!(source.calls().len(), 1);
    }

    #[test]
    fn stored_data_outside_range_is_no_data() {
        let store = MockPriceStore::new().with_bars(generate_bars("AAPL", "2024-01-01", 10, 100.0));
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-31"), threshold(100.0, 2));

        let err = run_backtest(&store, None, &RetryPolicy::no_retry(), &request).unwrap_err();
        assert!(matches!(err, PricelabError::NoData { .. }));
    }

    #[test]
    fn never_entering_reports_no_trades() {
        let store = MockPriceStore::new().with_bars(generate_bars("AAPL", "2025-01-01", 20, 50.0));
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-20"), threshold(1000.0, 3));

        let result = run_backtest(&store, None, &RetryPolicy::no_retry(), &request).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), 20);
        assert!(result.equity_curve.iter().all(|p| p.equity == 0.0));
        assert_eq!(result.report.total_pnl, 0.0);
        assert_eq!(result.report.win_probability, 0.0);
        assert_eq!(result.report.max_drawdown, 0.0);

        let warning = result.no_trades().expect("no trades should be reported");
        assert_eq!(ExitCode::from(&warning), ExitCode::from(7));
        assert!(matches!(
            result.require_trades(),
            Err(PricelabError::NoTrades { .. })
        ));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = StrategyParams::from_name("momentum", &StrategyInputs::default()).unwrap_err();
        assert!(matches!(err, PricelabError::UnknownStrategy { ref name } if name == "momentum"));
        assert_eq!(ExitCode::from(&err), ExitCode::from(4));
    }

    #[test]
    fn invalid_parameters_fail_before_any_fetch() {
        let store = MockPriceStore::new();
        let source = MockQuoteSource::new();
        let strategy = StrategyParams::MovingAverage {
            short_window: 50,
            long_window: 20,
        };
        let request = BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-31"), strategy);

        let err = run_backtest(&store, Some(&source as &dyn QuoteSource), &RetryPolicy::no_retry(), &request).unwrap_err();
        assert!(err.is_input_error());
        assert!(source.calls().is_empty());
    }
}

mod partial_backfill {
    use super::*;

    #[test]
    fn fetches_only_missing_edges() {
        let store = MockPriceStore::new().with_bars(generate_bars("AAPL", "2025-02-01", 28, 100.0));
        let source =
            MockQuoteSource::new().with_bars("AAPL", generate_bars("AAPL", "2025-01-01", 90, 50.0));

        let inserted = ensure_data_available(
            &store,
            &source,
            &RetryPolicy::no_retry(),
            "AAPL",
            d("2025-01-01"),
            d("2025-03-31"),
        )
        .unwrap();

        assert_eq!(
            source.calls(),
            vec![
                ("AAPL".to_string(), d("2025-01-01"), d("2025-01-31")),
                ("AAPL".to_string(), d("2025-03-01"), d("2025-03-31")),
            ]
        );
        assert_eq!(inserted, 31 + 31);
        assert_eq!(store.len(), 90);

        // February keeps the originally stored prices.
        let feb = store.get_range("AAPL", d("2025-02-01"), d("2025-02-01")).unwrap();
        assert_eq!(feb[0].close, 100.0);
    }

    #[test]
    fn covered_range_makes_no_request() {
        let store = MockPriceStore::new().with_bars(generate_bars("AAPL", "2025-01-01", 60, 100.0));
        let source = MockQuoteSource::new();

        let inserted = ensure_data_available(
            &store,
            &source,
            &RetryPolicy::no_retry(),
            "AAPL",
            d("2025-01-10"),
            d("2025-02-10"),
        )
        .unwrap();

        assert_eq!(inserted, 0);
        assert!(source.calls().is_empty());
    }

    #[test]
    fn source_failure_falls_back_to_stored_bars() {
        let store = MockPriceStore::new().with_bars(bars_from_closes(
            "AAPL",
            "2025-01-01",
            &[90.0, 95.0, 101.0, 98.0, 105.0],
        ));
        let source = MockQuoteSource::new().failing(10);
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-10"), threshold(100.0, 2));

        let result = run_backtest(&store, Some(&source as &dyn QuoteSource), &instant_retries(1), &request).unwrap();

        assert_eq!(
            source.calls(),
            vec![
                ("AAPL".to_string(), d("2025-01-06"), d("2025-01-10")),
                ("AAPL".to_string(), d("2025-01-06"), d("2025-01-10")),
            ]
        );
        assert_eq!(result.report.total_pnl, 4.0);
    }

    #[test]
    fn retries_until_source_recovers() {
        let store = MockPriceStore::new();
        let source = MockQuoteSource::new()
            .with_bars("AAPL", generate_bars("AAPL", "2025-01-01", 10, 100.0))
            .failing(2);

        let inserted = backfill(
            &store,
            &source,
            &instant_retries(3),
            "AAPL",
            d("2025-01-01"),
            d("2025-01-10"),
        )
        .unwrap();

        assert_eq!(inserted, 10);
        assert_eq!(source.calls().len(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let store = MockPriceStore::new();
        let source = MockQuoteSource::new()
            .with_bars("AAPL", generate_bars("AAPL", "2025-01-01", 10, 100.0))
            .failing(5);

        let err = backfill(
            &store,
            &source,
            &instant_retries(2),
            "AAPL",
            d("2025-01-01"),
            d("2025-01-10"),
        )
        .unwrap_err();

        assert!(matches!(err, PricelabError::DataSource { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(6));
        assert_eq!(source.calls().len(), 3);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn inconsistent_bars_are_not_stored() {
        let mut bars = generate_bars("AAPL", "2025-01-01", 3, 100.0);
        bars[1].high = bars[1].low - 5.0;
        let store = MockPriceStore::new();
        let source = MockQuoteSource::new().with_bars("AAPL", bars);

        let inserted = backfill(
            &store,
            &source,
            &RetryPolicy::no_retry(),
            "AAPL",
            d("2025-01-01"),
            d("2025-01-03"),
        )
        .unwrap();

        assert_eq!(inserted, 2);
        assert!(store.get_range("AAPL", d("2025-01-02"), d("2025-01-02")).unwrap().is_empty());
    }

    #[test]
    fn repeated_backfill_inserts_nothing() {
        let store = MockPriceStore::new();
        let source =
            MockQuoteSource::new().with_bars("AAPL", generate_bars("AAPL", "2025-01-01", 15, 100.0));
        let policy = RetryPolicy::no_retry();

        let first = backfill(&store, &source, &policy, "AAPL", d("2025-01-01"), d("2025-01-15")).unwrap();
        let second = backfill(&store, &source, &policy, "AAPL", d("2025-01-01"), d("2025-01-15")).unwrap();

        assert_eq!(first, 15);
        assert_eq!(second, 0);
        assert_eq!(store.len(), 15);
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_pipeline {
    use super::*;
    use pricelab::adapters::sqlite_adapter::SqliteAdapter;

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn backfill_is_idempotent() {
        let store = store();
        let source =
            MockQuoteSource::new().with_bars("MSFT", generate_bars("MSFT", "2025-03-01", 20, 400.0));
        let policy = RetryPolicy::no_retry();

        let first = backfill(&store, &source, &policy, "MSFT", d("2025-03-01"), d("2025-03-20")).unwrap();
        let second = backfill(&store, &source, &policy, "MSFT", d("2025-03-01"), d("2025-03-20")).unwrap();

        assert_eq!(first, 20);
        assert_eq!(second, 0);
        assert_eq!(
            store.get_data_range("MSFT").unwrap(),
            Some((d("2025-03-01"), d("2025-03-20"), 20))
        );
    }

    #[test]
    fn backtest_with_partial_history() {
        let store = store();
        store
            .insert_bars(&bars_from_closes("AAPL", "2025-01-03", &[101.0, 98.0, 105.0]))
            .unwrap();
        let source = MockQuoteSource::new().with_bars(
            "AAPL",
            bars_from_closes("AAPL", "2025-01-01", &[90.0, 95.0, 101.0, 98.0, 105.0]),
        );
        let request =
            BacktestRequest::new("AAPL", d("2025-01-01"), d("2025-01-05"), threshold(100.0, 2));

        let result = run_backtest(&store, Some(&source as &dyn QuoteSource), &RetryPolicy::no_retry(), &request).unwrap();

        assert_eq!(source.calls(), vec![("AAPL".to_string(), d("2025-01-01"), d("2025-01-02"))]);
        assert_eq!(result.equity_curve.len(), 5);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].pnl, 4.0);
    }
}
