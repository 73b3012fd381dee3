//! Configuration validation.
//!
//! Checks config values before any store is opened or data fetched, and
//! reads the typed settings the rest of the crate consumes.

use crate::domain::backfill::RetryPolicy;
use crate::domain::error::PricelabError;
use crate::domain::strategy::StrategyInputs;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;
use std::time::Duration;

pub const PROVIDERS: &[&str] = &["yahoo", "csv"];

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PricelabError {
    PricelabError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), PricelabError> {
    let capital = config.get_double("backtest", "starting_capital", 10_000.0);
    if !(capital.is_finite() && capital > 0.0) {
        return Err(invalid("backtest", "starting_capital", "must be positive"));
    }

    let start = config_date(config, "backtest", "start_date")?;
    let end = config_date(config, "backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "backtest",
                "start_date",
                format!("{start} is after end_date {end}"),
            ));
        }
    }

    strategy_inputs(config)?;
    Ok(())
}

pub fn validate_source_config(config: &dyn ConfigPort) -> Result<(), PricelabError> {
    let provider = source_provider(config);
    if !PROVIDERS.contains(&provider.as_str()) {
        return Err(invalid(
            "source",
            "provider",
            format!("unknown provider '{provider}' (expected one of {})", PROVIDERS.join(", ")),
        ));
    }
    if provider == "csv" && config.get_non_empty("source", "csv_dir").is_none() {
        return Err(PricelabError::ConfigMissing {
            section: "source".into(),
            key: "csv_dir".into(),
        });
    }

    for key in ["max_retries", "retry_delay_ms"] {
        if config.get_int("source", key, 0) < 0 {
            return Err(invalid("source", key, "must be non-negative"));
        }
    }
    if config.get_int("source", "timeout_secs", 30) <= 0 {
        return Err(invalid("source", "timeout_secs", "must be positive"));
    }
    Ok(())
}

/// Lower-cased `[source] provider`, `yahoo` when unset.
pub fn source_provider(config: &dyn ConfigPort) -> String {
    config
        .get_non_empty("source", "provider")
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| "yahoo".to_string())
}

/// An optional `YYYY-MM-DD` value.
pub fn config_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, PricelabError> {
    config
        .get_non_empty(section, key)
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|_| invalid(section, key, "invalid date format (expected YYYY-MM-DD)"))
        })
        .transpose()
}

fn optional_number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, PricelabError> {
    config
        .get_non_empty(section, key)
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| invalid(section, key, format!("'{s}' is not a valid number")))
        })
        .transpose()
}

/// The `[strategy]` section. Unset keys stay `None` so strategy defaults apply.
pub fn strategy_inputs(config: &dyn ConfigPort) -> Result<StrategyInputs, PricelabError> {
    Ok(StrategyInputs {
        threshold: optional_number(config, "strategy", "threshold")?,
        holding_period: optional_number(config, "strategy", "holding_period")?,
        short_window: optional_number(config, "strategy", "short_window")?,
        long_window: optional_number(config, "strategy", "long_window")?,
        rsi_window: optional_number(config, "strategy", "rsi_window")?,
        buy_threshold: optional_number(config, "strategy", "buy_threshold")?,
        sell_threshold: optional_number(config, "strategy", "sell_threshold")?,
    })
}

pub fn retry_policy(config: &dyn ConfigPort) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    let max_retries = config.get_int("source", "max_retries", defaults.max_retries as i64);
    let delay_ms = config.get_int(
        "source",
        "retry_delay_ms",
        defaults.base_delay.as_millis() as i64,
    );
    RetryPolicy {
        max_retries: max_retries.clamp(0, u32::MAX as i64) as u32,
        base_delay: Duration::from_millis(delay_ms.max(0) as u64),
    }
}
