//! Position and trade records.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle status of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionStatus {
    Open,
    /// A confirmed fill deviated beyond tolerance from the intent. The
    /// position stays open for the operator to resolve; never auto-closed.
    Flagged,
}

/// An open long position. At most one per symbol at any time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
}

impl Position {
    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    /// Stop triggers off the bar's low.
    pub fn stop_hit(&self, bar_low: f64) -> bool {
        bar_low <= self.stop_loss
    }

    /// Target triggers off the bar's high.
    pub fn target_hit(&self, bar_high: f64) -> bool {
        bar_high >= self.take_profit
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// Bar low touched the stop-loss price.
    Stop,
    /// Bar high touched the take-profit price.
    Target,
    /// Sell signal from the strategy.
    SignalExit,
    /// Backtest liquidation at the last available close.
    EndOfData,
}

/// Immutable record appended to the ledger when a position closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub close_reason: CloseReason,
}
