//! Signal generation: pure mapping from consecutive indicator snapshots.

use crate::domain::indicator::IndicatorSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// RSI confirmation bands for the MA crossover strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    /// Buy requires `rsi_buy_min <= rsi <= rsi_buy_max`.
    pub rsi_buy_min: f64,
    pub rsi_buy_max: f64,
    /// Sell requires `rsi > rsi_sell`.
    pub rsi_sell: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        SignalThresholds {
            rsi_buy_min: 30.0,
            rsi_buy_max: 50.0,
            rsi_sell: 70.0,
        }
    }
}

/// Trading strategy variants.
///
/// One variant ships today; the enum is the seam for adding more without a
/// trait object. Evaluation is a pure function of two consecutive snapshots:
/// identical inputs always yield the identical signal, with Hold whenever
/// either snapshot is undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Buy on the short MA crossing above the long MA with RSI inside the
    /// buy band; sell on the downward cross with RSI overbought.
    MaRsiCross { thresholds: SignalThresholds },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::MaRsiCross { .. } => "ma-rsi-cross",
        }
    }

    pub fn evaluate(
        &self,
        prev: Option<&IndicatorSnapshot>,
        curr: Option<&IndicatorSnapshot>,
    ) -> Signal {
        if self.should_buy(prev, curr) {
            Signal::Buy
        } else if self.should_sell(prev, curr) {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    pub fn should_buy(
        &self,
        prev: Option<&IndicatorSnapshot>,
        curr: Option<&IndicatorSnapshot>,
    ) -> bool {
        let (Some(prev), Some(curr)) = (prev, curr) else {
            return false;
        };
        match self {
            Strategy::MaRsiCross { thresholds } => {
                let crossed_up = prev.short_ma <= prev.long_ma && curr.short_ma > curr.long_ma;
                crossed_up
                    && curr.rsi >= thresholds.rsi_buy_min
                    && curr.rsi <= thresholds.rsi_buy_max
            }
        }
    }

    pub fn should_sell(
        &self,
        prev: Option<&IndicatorSnapshot>,
        curr: Option<&IndicatorSnapshot>,
    ) -> bool {
        let (Some(prev), Some(curr)) = (prev, curr) else {
            return false;
        };
        match self {
            Strategy::MaRsiCross { thresholds } => {
                let crossed_down = prev.short_ma >= prev.long_ma && curr.short_ma < curr.long_ma;
                crossed_down && curr.rsi > thresholds.rsi_sell
            }
        }
    }
}
