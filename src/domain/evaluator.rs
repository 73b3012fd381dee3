//! Strategy evaluation over a date-bounded slice of bars.
//!
//! Each variant supplies a signal function; [`scan`] drives it through the
//! single-position state machine in [`super::position`] and records one
//! equity point per evaluated bar. Equity is realized P&L only, so it moves
//! on trade-closing bars and nowhere else.

use chrono::NaiveDate;
use serde::Serialize;

use super::indicator::rsi::calculate_rsi;
use super::indicator::sma::calculate_sma;
use super::ohlcv::OhlcvBar;
use super::position::{step, PositionState, Signal, Trade};
use super::strategy::StrategyParams;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// Close of the underlying, for charting alongside equity.
    pub price: f64,
    /// Cumulative realized P&L up to and including this bar.
    pub equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

pub fn evaluate(bars: &[OhlcvBar], params: &StrategyParams) -> Evaluation {
    match *params {
        StrategyParams::ThresholdCross {
            threshold,
            holding_period,
        } => threshold_cross(bars, threshold, holding_period),
        StrategyParams::MovingAverage {
            short_window,
            long_window,
        } => moving_average_crossover(bars, short_window, long_window),
        StrategyParams::RsiMeanReversion {
            rsi_window,
            buy_threshold,
            sell_threshold,
        } => rsi_mean_reversion(bars, rsi_window, buy_threshold, sell_threshold),
    }
}

/// Enter when close > threshold, exit `holding_period` bars later or on the
/// final bar. No entry on the final bar.
pub fn threshold_cross(bars: &[OhlcvBar], threshold: f64, holding_period: usize) -> Evaluation {
    let last = bars.len().saturating_sub(1);
    scan(bars, 0, |i, bar, state| match state {
        PositionState::Long(pos) if i - pos.entry_index >= holding_period || i == last => {
            Signal::Exit
        }
        PositionState::Flat if bar.close > threshold && i < last => Signal::Enter,
        _ => Signal::Hold,
    })
}

/// Golden cross enters, death cross exits. Bars before both averages are
/// valid are warm-up and produce no equity points.
pub fn moving_average_crossover(
    bars: &[OhlcvBar],
    short_window: usize,
    long_window: usize,
) -> Evaluation {
    if short_window == 0 || long_window == 0 {
        return Evaluation::default();
    }
    let short = calculate_sma(bars, short_window);
    let long = calculate_sma(bars, long_window);
    let (Some(short_first), Some(long_first)) = (short.first_valid(), long.first_valid()) else {
        return Evaluation::default();
    };
    let first = short_first.max(long_first);

    scan(bars, first, |i, _, state| {
        let (Some(s), Some(l)) = (short.get(i), long.get(i)) else {
            return Signal::Hold;
        };
        let Some(prev) = i.checked_sub(1) else {
            return Signal::Hold;
        };
        let (Some(prev_s), Some(prev_l)) = (short.get(prev), long.get(prev)) else {
            return Signal::Hold;
        };

        if !state.is_long() && s > l && prev_s <= prev_l {
            Signal::Enter
        } else if state.is_long() && s < l && prev_s >= prev_l {
            Signal::Exit
        } else {
            Signal::Hold
        }
    })
}

/// Enter when RSI < buy_threshold, exit when RSI > sell_threshold.
pub fn rsi_mean_reversion(
    bars: &[OhlcvBar],
    rsi_window: usize,
    buy_threshold: f64,
    sell_threshold: f64,
) -> Evaluation {
    if rsi_window == 0 {
        return Evaluation::default();
    }
    let rsi = calculate_rsi(bars, rsi_window);
    let Some(first) = rsi.first_valid() else {
        return Evaluation::default();
    };

    scan(bars, first, |i, _, state| match rsi.get(i) {
        Some(value) if !state.is_long() && value < buy_threshold => Signal::Enter,
        Some(value) if state.is_long() && value > sell_threshold => Signal::Exit,
        _ => Signal::Hold,
    })
}

/// Walk bars from `first`, applying one transition per bar. A position still
/// open after the last bar is dropped unrealized.
fn scan<F>(bars: &[OhlcvBar], first: usize, mut signal: F) -> Evaluation
where
    F: FnMut(usize, &OhlcvBar, &PositionState) -> Signal,
{
    let mut state = PositionState::Flat;
    let mut realized = 0.0;
    let mut evaluation = Evaluation {
        trades: Vec::new(),
        equity_curve: Vec::with_capacity(bars.len().saturating_sub(first)),
    };

    for (i, bar) in bars.iter().enumerate().skip(first) {
        let (next, trade) = step(state, i, bar, signal(i, bar, &state));
        state = next;
        if let Some(trade) = trade {
            realized += trade.pnl;
            evaluation.trades.push(trade);
        }
        evaluation.equity_curve.push(EquityPoint {
            date: bar.date,
            price: bar.close,
            equity: realized,
        });
    }

    evaluation
}
