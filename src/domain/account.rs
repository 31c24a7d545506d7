//! Account state: balance, equity, open positions, trade ledger.
//!
//! Single-writer discipline: the execution coordinator is the only code
//! that mutates an `AccountState`. Live cycles for distinct symbols may run
//! concurrently, but their balance debits/credits and position open/close
//! operations are serialized through one coordinator call at a time so the
//! shared balance can never be spent twice.

use crate::domain::position::{Position, Trade};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    /// Balance plus open positions marked at their last known price.
    pub equity: f64,
    /// Cash available to open new positions.
    pub available_balance: f64,
    pub positions: HashMap<String, Position>,
    /// Append-only ledger of closed trades.
    pub trades: Vec<Trade>,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        AccountState {
            equity: initial_balance,
            available_balance: initial_balance,
            positions: HashMap::new(),
            trades: Vec::new(),
        }
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// Balance plus open positions valued at the supplied prices. Positions
    /// without a quote fall back to their entry price.
    pub fn mark_to_market(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.available_balance + position_value
    }
}
