//! Single-position state machine and closed trades.
//!
//! Every strategy variant is a signal function feeding [`step`], which is the
//! only place a position is opened or closed.

use chrono::NaiveDate;
use serde::Serialize;

use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    /// Index of the entry bar within the evaluated slice.
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long(OpenPosition),
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }
}

/// What a strategy wants to do on a given bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Enter,
    Exit,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub pnl: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}

/// Apply one bar's signal. Enter while long and exit while flat are no-ops.
pub fn step(
    state: PositionState,
    index: usize,
    bar: &OhlcvBar,
    signal: Signal,
) -> (PositionState, Option<Trade>) {
    match (state, signal) {
        (PositionState::Flat, Signal::Enter) => (
            PositionState::Long(OpenPosition {
                entry_index: index,
                entry_date: bar.date,
                entry_price: bar.close,
            }),
            None,
        ),
        (PositionState::Long(pos), Signal::Exit) => {
            let trade = Trade {
                entry_date: pos.entry_date,
                entry_price: pos.entry_price,
                exit_date: bar.date,
                exit_price: bar.close,
                pnl: bar.close - pos.entry_price,
            };
            (PositionState::Flat, Some(trade))
        }
        (state, _) => (state, None),
    }
}
