//! Risk management: stop-loss, take-profit, and position sizing.
//!
//! Stateless given a configuration snapshot; percentages are stored as
//! percent values (2.0 means 2%), matching the config file surface.

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub investment_amount: f64,
    pub risk_percentage: f64,
    pub max_position_size: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Number of configured symbols sharing the investment amount.
    pub symbol_count: usize,
}

impl RiskParams {
    /// `entry_price * (1 - stop_loss_pct / 100)`
    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct / 100.0)
    }

    /// `entry_price * (1 + take_profit_pct / 100)`
    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct / 100.0)
    }

    /// Asset quantity to buy at `price`.
    ///
    /// The configured investment is split evenly across symbols, scaled by
    /// the risk percentage, and capped at `max_position_size` notional.
    /// Zero when `price <= 0` (bad tick; no division by a junk price).
    pub fn position_size(&self, price: f64) -> f64 {
        if price <= 0.0 || self.symbol_count == 0 {
            return 0.0;
        }
        let raw_notional =
            self.investment_amount * (self.risk_percentage / 100.0) / self.symbol_count as f64;
        let capped = raw_notional.min(self.max_position_size);
        capped / price
    }

    /// Notional value of the position that `position_size` would produce.
    pub fn position_notional(&self, price: f64) -> f64 {
        self.position_size(price) * price
    }
}
