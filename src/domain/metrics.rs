//! Performance summary of a trade log and equity curve.

use chrono::NaiveDate;
use serde::Serialize;

use super::evaluator::EquityPoint;
use super::position::Trade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub const DEFAULT_STARTING_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total_pnl: f64,
    /// CAGR-style, in percent.
    pub annualized_return: f64,
    /// Most negative peak-to-trough decline, in percent (<= 0).
    pub max_drawdown: f64,
    /// Fraction of trades with positive pnl, 0..=1.
    pub win_probability: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub final_capital: f64,
    pub avg_holding_days: f64,
}

impl PerformanceReport {
    pub fn summarize(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        start_date: NaiveDate,
        end_date: NaiveDate,
        starting_capital: f64,
    ) -> Self {
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let trades_won = trades.iter().filter(|t| t.is_win()).count();
        let trades_lost = trades.iter().filter(|t| t.pnl < 0.0).count();
        let total_trades = trades.len();

        let win_probability = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let avg_holding_days = if total_trades > 0 {
            trades.iter().map(|t| t.holding_days()).sum::<i64>() as f64 / total_trades as f64
        } else {
            0.0
        };

        let days_in_range = (end_date - start_date).num_days();

        PerformanceReport {
            total_pnl,
            annualized_return: annualized_return(total_pnl, starting_capital, days_in_range),
            max_drawdown: max_drawdown(equity_curve, starting_capital),
            win_probability,
            total_trades,
            trades_won,
            trades_lost,
            final_capital: starting_capital + total_pnl,
            avg_holding_days,
        }
    }
}

/// `((C + pnl) / C) ^ (252 / max(days, 1)) - 1`, in percent. Calendar days
/// stand in for trading days.
pub fn annualized_return(total_pnl: f64, starting_capital: f64, days_in_range: i64) -> f64 {
    if starting_capital <= 0.0 {
        return 0.0;
    }
    let growth = (starting_capital + total_pnl) / starting_capital;
    if growth <= 0.0 {
        return -100.0;
    }
    let days = days_in_range.max(1) as f64;
    let cagr = (growth.powf(TRADING_DAYS_PER_YEAR / days) - 1.0) * 100.0;
    if cagr.is_finite() { cagr } else { 0.0 }
}

/// Most negative `(capital - running_max) / running_max` over the curve,
/// where capital = starting capital + realized equity. In percent.
pub fn max_drawdown(equity_curve: &[EquityPoint], starting_capital: f64) -> f64 {
    let mut running_max = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for point in equity_curve {
        let capital = starting_capital + point.equity;
        running_max = running_max.max(capital);
        if running_max <= 0.0 {
            continue;
        }
        let drawdown = (capital - running_max) / running_max;
        if drawdown < worst {
            worst = drawdown;
        }
    }

    worst * 100.0
}
