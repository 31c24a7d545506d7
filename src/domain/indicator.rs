//! Indicator engine: short/long simple moving averages and Wilder RSI.
//!
//! Two code paths compute the same numbers:
//! - [`IndicatorEngine`] updates incrementally, one bar at a time (live path);
//! - [`compute_snapshots`] recomputes the whole series from scratch.
//!
//! Both must agree bar-for-bar; the backtest relies on that to replay the
//! live decisions deterministically.
//!
//! RSI uses Wilder's smoothing: the first average gain/loss is a simple mean
//! over the first `period` price changes, then
//! `avg = (prev_avg * (period - 1) + current) / period`.
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`, and 100 when `avg_loss == 0`.

use crate::domain::bar::Bar;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub rsi_period: usize,
}

impl IndicatorParams {
    /// Bars required before the first defined snapshot. Snapshots are
    /// undefined for bar indices below this; upstream treats them as Hold.
    pub fn warmup_bars(&self) -> usize {
        self.short_ma_period
            .max(self.long_ma_period)
            .max(self.rsi_period)
    }
}

/// Indicator values attached to one bar index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub short_ma: f64,
    pub long_ma: f64,
    pub rsi: f64,
}

/// Incremental per-bar indicator state for one symbol.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    closes: VecDeque<f64>,
    short_sum: f64,
    long_sum: f64,
    bars_seen: usize,
    prev_close: Option<f64>,
    gain_acc: f64,
    loss_acc: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        IndicatorEngine {
            params,
            closes: VecDeque::with_capacity(params.long_ma_period + 1),
            short_sum: 0.0,
            long_sum: 0.0,
            bars_seen: 0,
            prev_close: None,
            gain_acc: 0.0,
            loss_acc: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Feed the next bar; returns the snapshot once enough history exists.
    pub fn update(&mut self, bar: &Bar) -> Option<IndicatorSnapshot> {
        let close = bar.close;
        self.bars_seen += 1;

        self.closes.push_back(close);
        self.short_sum += close;
        self.long_sum += close;

        let len = self.closes.len();
        if len > self.params.short_ma_period {
            // Oldest close still inside the deque leaves the short window.
            self.short_sum -= self.closes[len - 1 - self.params.short_ma_period];
        }
        if len > self.params.long_ma_period {
            let evicted = self.closes.pop_front().unwrap_or(0.0);
            self.long_sum -= evicted;
        }

        if let Some(prev) = self.prev_close {
            let change = close - prev;
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { -change } else { 0.0 };
            let n = self.params.rsi_period as f64;
            let changes_seen = self.bars_seen - 1;

            if changes_seen <= self.params.rsi_period {
                self.gain_acc += gain;
                self.loss_acc += loss;
                if changes_seen == self.params.rsi_period {
                    // Seed: simple mean over the first `period` changes.
                    self.avg_gain = self.gain_acc / n;
                    self.avg_loss = self.loss_acc / n;
                }
            } else {
                self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
                self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
            }
        }
        self.prev_close = Some(close);

        self.snapshot()
    }

    fn snapshot(&self) -> Option<IndicatorSnapshot> {
        // Undefined until bar index >= max(short, long, rsi), i.e. until the
        // warmup bar count plus one bar has been consumed.
        if self.bars_seen < self.params.warmup_bars() + 1 {
            return None;
        }
        let rsi = if self.avg_loss == 0.0 {
            100.0
        } else {
            let rs = self.avg_gain / self.avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        Some(IndicatorSnapshot {
            short_ma: self.short_sum / self.params.short_ma_period as f64,
            long_ma: self.long_sum / self.params.long_ma_period as f64,
            rsi,
        })
    }
}

/// From-scratch recomputation over a full bar sequence.
///
/// Returns one entry per bar index, `None` while history is insufficient.
/// Agrees bar-for-bar with the incremental [`IndicatorEngine`].
pub fn compute_snapshots(bars: &[Bar], params: &IndicatorParams) -> Vec<Option<IndicatorSnapshot>> {
    let mut engine = IndicatorEngine::new(*params);
    bars.iter().map(|bar| engine.update(bar)).collect()
}
