//! RSI (Relative Strength Index) over simple rolling means.
//!
//! avg_gain / avg_loss are plain means of the positive / negative
//! close-to-close deltas in the last n deltas (no Wilder smoothing).
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100
//! If both are 0 (flat window): RSI = 50
//!
//! Warmup: first n bars are invalid (need n deltas).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    date: b.date,
                    valid: false,
                    value: 0.0,
                })
                .collect(),
        };
    }

    // deltas[k] is the change from bar k to bar k+1
    let deltas: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period {
                return IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: 0.0,
                };
            }
            let window = &deltas[i - period..i];
            let avg_gain = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
            let avg_loss = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;
            IndicatorPoint {
                date: bar.date,
                valid: true,
                value: rsi_from_averages(avg_gain, avg_loss),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
