//! Derived risk metrics for a single trade and aggregates over a portfolio.
//!
//! Everything here is pure. Degenerate inputs (zero size or zero equity)
//! produce `inf`/`NaN` rather than errors; rounding is left to display code.

use serde::{Deserialize, Serialize};

use crate::models::{Direction, Trade, TradeFields, TradeState};

/// Maintenance leverage assumed by the Mango liquidation estimate.
///
/// 40x holds for the SOL, BTC and ETH perps; other markets differ.
pub const MANGO_LIQUIDATION_LEVERAGE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub direction: Direction,
    pub end_equity: f64,
    pub equity_at_stop: f64,
    pub start_lev: f64,
    pub end_lev: f64,
    pub stop_lev: f64,
    pub liq_price: f64,
    pub profit_loss: f64,
    pub change: f64,
    pub stop_loss: f64,
    /// Signed fraction of start equity lost at the stop; negative for a loss.
    pub max_loss: f64,
    pub percent_move_to_ideal: f64,
    pub percent_move_to_stop: f64,
    pub risk_to_reward: f64,
    pub mango_liq_price: f64,
}

/// Equity once price reaches `end`.
pub fn equity_at(fields: &TradeFields, end: f64) -> f64 {
    match fields.direction() {
        Direction::Long => fields.size * (end - fields.entry_price) + fields.start_equity,
        Direction::Short => fields.size * (fields.entry_price - end) + fields.start_equity,
    }
}

pub fn compute_stats(fields: &TradeFields) -> Stats {
    let entry = fields.entry_price;
    let stop = fields.stop_price;
    let start_equity = fields.start_equity;
    let size = fields.size;
    let ideal_exit = fields.ideal_exit_price;
    let direction = fields.direction();

    let end_equity = equity_at(fields, ideal_exit);
    let equity_at_stop = equity_at(fields, stop);

    let start_lev = size * entry / start_equity;
    let end_lev = size * ideal_exit / end_equity;
    let stop_lev = size * stop / equity_at_stop;

    let liq_price = match direction {
        Direction::Long => entry - start_equity / size,
        Direction::Short => entry + start_equity / size,
    };

    let profit_loss = end_equity - start_equity;
    let change = profit_loss / start_equity;
    let stop_loss = equity_at_stop - start_equity;
    let max_loss = stop_loss / start_equity;

    let equity_direction = match direction {
        Direction::Long => -1.0,
        Direction::Short => 1.0,
    };
    let lev = MANGO_LIQUIDATION_LEVERAGE;
    let mango_liq_price = (equity_direction * lev * entry * size + lev * start_equity)
        / (size + lev * size * equity_direction);

    Stats {
        direction,
        end_equity,
        equity_at_stop,
        start_lev,
        end_lev,
        stop_lev,
        liq_price,
        profit_loss,
        change,
        stop_loss,
        max_loss,
        percent_move_to_ideal: (ideal_exit - entry) / entry,
        percent_move_to_stop: (stop - entry) / entry,
        risk_to_reward: (change / max_loss).abs(),
        mango_liq_price,
    }
}

impl Trade {
    pub fn stats(&self) -> Stats {
        compute_stats(&self.fields())
    }

    /// Realized P/L: the ideal profit, or the stop loss when stopped out.
    pub fn realized_pnl(&self) -> Option<f64> {
        let finished = self.finished.as_ref()?;
        let stats = self.stats();
        Some(if finished.stopped { stats.stop_loss } else { stats.profit_loss })
    }
}

/// Aggregate view of one portfolio plus the shared staging list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub portfolio: String,
    pub staged_trades: usize,
    pub open_trades: usize,
    pub finished_trades: usize,
    pub locked_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub realized_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_risk_to_reward: f64,
}

pub fn summarize(portfolio: &str, staging: &[Trade], active: &[Trade]) -> PortfolioSummary {
    let mut open_trades = 0;
    let mut finished_trades = 0;
    let mut locked_trades = 0;
    let mut wins = 0;
    let mut losses = 0;
    let mut realized: Vec<f64> = Vec::new();

    for trade in active {
        match trade.state() {
            TradeState::Open => open_trades += 1,
            TradeState::Finished => finished_trades += 1,
            TradeState::Locked => locked_trades += 1,
            TradeState::Staging => {}
        }
        if let Some(finished) = &trade.finished {
            if finished.stopped {
                losses += 1;
            } else {
                wins += 1;
            }
        }
        if let Some(pnl) = trade.realized_pnl() {
            realized.push(pnl);
        }
    }

    let closed = wins + losses;
    let win_rate = if closed > 0 {
        (wins as f64 / closed as f64) * 100.0
    } else {
        0.0
    };

    let ratios: Vec<f64> = active
        .iter()
        .map(|t| t.stats().risk_to_reward)
        .filter(|r| r.is_finite())
        .collect();
    let avg_risk_to_reward = if ratios.is_empty() {
        0.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    };

    PortfolioSummary {
        portfolio: portfolio.to_string(),
        staged_trades: staging.len(),
        open_trades,
        finished_trades,
        locked_trades,
        wins,
        losses,
        win_rate,
        realized_pnl: realized.iter().sum(),
        best_trade: realized.iter().copied().reduce(f64::max).unwrap_or(0.0),
        worst_trade: realized.iter().copied().reduce(f64::min).unwrap_or(0.0),
        avg_risk_to_reward,
    }
}

/// Rounds to two decimals for display.
pub fn dec2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
