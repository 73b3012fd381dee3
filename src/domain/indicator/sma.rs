//! Simple Moving Average.
//!
//! SMA(n) at bar i = mean of closes i-n+1..=i.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values: Vec::new(),
        };
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i + 1 < period {
                return IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: 0.0,
                };
            }
            // Recomputed per window: no running-sum drift.
            let sum: f64 = bars[i + 1 - period..=i].iter().map(|b| b.close).sum();
            IndicatorPoint {
                date: bar.date,
                valid: true,
                value: sum / period as f64,
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
