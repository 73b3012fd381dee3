//! Strategy selection and parameter sets.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PricelabError;

/// Used when neither a request nor config names a strategy.
pub const DEFAULT_STRATEGY: &str = "threshold_cross";

pub const DEFAULT_HOLDING_PERIOD: usize = 5;
pub const DEFAULT_SHORT_WINDOW: usize = 20;
pub const DEFAULT_LONG_WINDOW: usize = 50;
pub const DEFAULT_RSI_WINDOW: usize = 14;
pub const DEFAULT_BUY_THRESHOLD: f64 = 30.0;
pub const DEFAULT_SELL_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyParams {
    ThresholdCross {
        threshold: f64,
        holding_period: usize,
    },
    MovingAverage {
        short_window: usize,
        long_window: usize,
    },
    RsiMeanReversion {
        rsi_window: usize,
        buy_threshold: f64,
        sell_threshold: f64,
    },
}

/// Loosely-typed parameters as they arrive from config files or query strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StrategyInputs {
    pub threshold: Option<f64>,
    pub holding_period: Option<usize>,
    pub short_window: Option<usize>,
    pub long_window: Option<usize>,
    pub rsi_window: Option<usize>,
    pub buy_threshold: Option<f64>,
    pub sell_threshold: Option<f64>,
}

impl StrategyParams {
    /// Resolve a strategy by name, filling unset parameters with defaults.
    pub fn from_name(name: &str, inputs: &StrategyInputs) -> Result<Self, PricelabError> {
        let params = match name.trim().to_lowercase().as_str() {
            "threshold_cross" | "threshold" => StrategyParams::ThresholdCross {
                threshold: inputs.threshold.ok_or_else(|| {
                    PricelabError::invalid_parameter("threshold", "required for threshold_cross")
                })?,
                holding_period: inputs.holding_period.unwrap_or(DEFAULT_HOLDING_PERIOD),
            },
            "moving_average" | "ma_crossover" => StrategyParams::MovingAverage {
                short_window: inputs.short_window.unwrap_or(DEFAULT_SHORT_WINDOW),
                long_window: inputs.long_window.unwrap_or(DEFAULT_LONG_WINDOW),
            },
            "rsi_mean_reversion" | "rsi" => StrategyParams::RsiMeanReversion {
                rsi_window: inputs.rsi_window.unwrap_or(DEFAULT_RSI_WINDOW),
                buy_threshold: inputs.buy_threshold.unwrap_or(DEFAULT_BUY_THRESHOLD),
                sell_threshold: inputs.sell_threshold.unwrap_or(DEFAULT_SELL_THRESHOLD),
            },
            _ => {
                return Err(PricelabError::UnknownStrategy {
                    name: name.to_string(),
                });
            }
        };
        params.validate()?;
        Ok(params)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyParams::ThresholdCross { .. } => "threshold_cross",
            StrategyParams::MovingAverage { .. } => "moving_average",
            StrategyParams::RsiMeanReversion { .. } => "rsi_mean_reversion",
        }
    }

    pub fn validate(&self) -> Result<(), PricelabError> {
        match *self {
            StrategyParams::ThresholdCross {
                threshold,
                holding_period,
            } => {
                if !threshold.is_finite() {
                    return Err(PricelabError::invalid_parameter(
                        "threshold",
                        "must be a finite number",
                    ));
                }
                if holding_period == 0 {
                    return Err(PricelabError::invalid_parameter(
                        "holding_period",
                        "must be positive",
                    ));
                }
            }
            StrategyParams::MovingAverage {
                short_window,
                long_window,
            } => {
                if short_window == 0 {
                    return Err(PricelabError::invalid_parameter(
                        "short_window",
                        "must be positive",
                    ));
                }
                if long_window <= short_window {
                    return Err(PricelabError::invalid_parameter(
                        "long_window",
                        format!("must be greater than short_window ({short_window})"),
                    ));
                }
            }
            StrategyParams::RsiMeanReversion {
                rsi_window,
                buy_threshold,
                sell_threshold,
            } => {
                if rsi_window == 0 {
                    return Err(PricelabError::invalid_parameter(
                        "rsi_window",
                        "must be positive",
                    ));
                }
                for (name, value) in [
                    ("buy_threshold", buy_threshold),
                    ("sell_threshold", sell_threshold),
                ] {
                    if !(0.0..=100.0).contains(&value) {
                        return Err(PricelabError::invalid_parameter(
                            name,
                            "must be between 0 and 100",
                        ));
                    }
                }
                if buy_threshold >= sell_threshold {
                    return Err(PricelabError::invalid_parameter(
                        "buy_threshold",
                        format!("must be below sell_threshold ({sell_threshold})"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyParams::ThresholdCross {
                threshold,
                holding_period,
            } => write!(
                f,
                "threshold_cross(threshold={}, holding_period={})",
                threshold, holding_period
            ),
            StrategyParams::MovingAverage {
                short_window,
                long_window,
            } => write!(f, "moving_average({}, {})", short_window, long_window),
            StrategyParams::RsiMeanReversion {
                rsi_window,
                buy_threshold,
                sell_threshold,
            } => write!(
                f,
                "rsi_mean_reversion(window={}, buy<{}, sell>{})",
                rsi_window, buy_threshold, sell_threshold
            ),
        }
    }
}
