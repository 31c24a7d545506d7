//! Paper execution adapter.
//!
//! Fills every intent at its price hint, optionally worsened by a fixed
//! slippage percentage (buys fill higher, sells fill lower). Useful for
//! dry-running the live loop without touching an exchange.

use crate::domain::error::CrosstraderError;
use crate::domain::execution::{Fill, Side, TradeIntent};
use crate::ports::execution_port::ExecutionPort;

pub struct PaperExecutionAdapter {
    slippage_pct: f64,
}

impl PaperExecutionAdapter {
    pub fn new(slippage_pct: f64) -> Self {
        Self { slippage_pct }
    }
}

impl ExecutionPort for PaperExecutionAdapter {
    fn submit(&self, intent: &TradeIntent) -> Result<Fill, CrosstraderError> {
        if intent.size <= 0.0 {
            return Err(CrosstraderError::Order {
                symbol: intent.symbol.clone(),
                reason: format!("non-positive order size {}", intent.size),
            });
        }
        if intent.price_hint <= 0.0 {
            return Err(CrosstraderError::Order {
                symbol: intent.symbol.clone(),
                reason: format!("non-positive price hint {}", intent.price_hint),
            });
        }

        let factor = match intent.side {
            Side::Buy => 1.0 + self.slippage_pct / 100.0,
            Side::Sell => 1.0 - self.slippage_pct / 100.0,
        };
        let price = intent.price_hint * factor;
        log::debug!(
            "paper fill {} {:?} {} @ {:.8}",
            intent.symbol,
            intent.side,
            intent.size,
            price
        );

        Ok(Fill {
            symbol: intent.symbol.clone(),
            side: intent.side,
            size: intent.size,
            price,
        })
    }
}
