#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use crosstrader::domain::backtest::BacktestConfig;
use crosstrader::domain::bar::{Bar, Timeframe};
use crosstrader::domain::error::CrosstraderError;
use crosstrader::domain::execution::{Fill, TradeIntent};
use crosstrader::domain::indicator::IndicatorParams;
use crosstrader::domain::risk::RiskParams;
use crosstrader::domain::signal::{SignalThresholds, Strategy};
use crosstrader::ports::data_port::DataPort;
use crosstrader::ports::execution_port::ExecutionPort;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, CrosstraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(CrosstraderError::DataGap {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self, _timeframe: Timeframe) -> Result<Vec<String>, CrosstraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, CrosstraderError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Fills every intent at `price_hint * (1 + offset_pct/100)` and records
/// what was submitted.
pub struct MockExecutionPort {
    pub offset_pct: f64,
    pub submitted: RefCell<Vec<TradeIntent>>,
}

impl MockExecutionPort {
    pub fn exact() -> Self {
        Self::with_offset(0.0)
    }

    pub fn with_offset(offset_pct: f64) -> Self {
        Self {
            offset_pct,
            submitted: RefCell::new(Vec::new()),
        }
    }
}

impl ExecutionPort for MockExecutionPort {
    fn submit(&self, intent: &TradeIntent) -> Result<Fill, CrosstraderError> {
        self.submitted.borrow_mut().push(intent.clone());
        Ok(Fill {
            symbol: intent.symbol.clone(),
            side: intent.side,
            size: intent.size,
            price: intent.price_hint * (1.0 + self.offset_pct / 100.0),
        })
    }
}

pub fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(15 * i as i64)
}

pub fn make_bar(symbol: &str, i: usize, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp: ts(i),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, i, c))
        .collect()
}

/// Five flat bars, five bars falling by 2, then a shallow two-bar recovery.
/// With MA 2/4 and RSI 3 this produces an upward cross on the last bar with
/// RSI near 45, inside the default buy band.
pub fn golden_cross_closes() -> Vec<f64> {
    vec![100.0, 98.0, 96.0, 94.0, 92.0, 90.0, 91.0, 92.5]
}

/// Same decline but a sharp V recovery: the cross arrives with RSI above
/// the buy band, so no entry.
pub fn sharp_recovery_closes() -> Vec<f64> {
    vec![100.0, 98.0, 96.0, 94.0, 92.0, 90.0, 97.0, 104.0]
}

pub fn small_params() -> IndicatorParams {
    IndicatorParams {
        short_ma_period: 2,
        long_ma_period: 4,
        rsi_period: 3,
    }
}

pub fn default_strategy() -> Strategy {
    Strategy::MaRsiCross {
        thresholds: SignalThresholds::default(),
    }
}

pub fn sample_risk(symbol_count: usize) -> RiskParams {
    RiskParams {
        investment_amount: 100.0,
        risk_percentage: 50.0,
        max_position_size: 1000.0,
        stop_loss_pct: 2.0,
        take_profit_pct: 10.0,
        symbol_count,
    }
}

pub fn sample_config(n_bars: usize) -> BacktestConfig {
    BacktestConfig {
        start: ts(0),
        end: ts(n_bars),
        timeframe: Timeframe::M15,
        initial_balance: 100.0,
    }
}
