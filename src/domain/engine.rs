//! The shared per-bar decision path and the live cycle runner.
//!
//! [`Engine::on_bar`] is the single route from a bar to an account mutation:
//! indicator update, signal evaluation, then the execution coordinator. The
//! backtest simulator and [`LiveRunner`] both go through it, so a backtest
//! replays exactly the decisions the live path would make.

use chrono::{DateTime, Utc};
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::account::AccountState;
use crate::domain::bar::{Bar, Timeframe, validate_sequence};
use crate::domain::error::CrosstraderError;
use crate::domain::execution::{self, ExecutionEvent, Side};
use crate::domain::indicator::{IndicatorEngine, IndicatorParams, IndicatorSnapshot, compute_snapshots};
use crate::domain::risk::RiskParams;
use crate::domain::signal::{Signal, Strategy};

#[derive(Debug, Clone)]
struct SymbolState {
    indicators: IndicatorEngine,
    prev_snapshot: Option<IndicatorSnapshot>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl SymbolState {
    fn new(params: IndicatorParams) -> Self {
        SymbolState {
            indicators: IndicatorEngine::new(params),
            prev_snapshot: None,
            last_timestamp: None,
        }
    }
}

/// Per-symbol evaluation state plus the strategy and risk configuration,
/// both immutable for the engine's lifetime. Reconfiguring means building a
/// new engine; it takes effect from the next cycle.
#[derive(Debug, Clone)]
pub struct Engine {
    strategy: Strategy,
    risk: RiskParams,
    indicator_params: IndicatorParams,
    symbols: BTreeMap<String, SymbolState>,
}

impl Engine {
    pub fn new(strategy: Strategy, risk: RiskParams, indicator_params: IndicatorParams) -> Self {
        Engine {
            strategy,
            risk,
            indicator_params,
            symbols: BTreeMap::new(),
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn risk(&self) -> &RiskParams {
        &self.risk
    }

    /// Timestamp of the last bar consumed for `symbol`.
    pub fn last_timestamp(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.symbols.get(symbol).and_then(|s| s.last_timestamp)
    }

    /// Consume the next bar for its symbol: update indicators, evaluate the
    /// strategy over the two latest snapshots, and hand the signal to the
    /// execution coordinator.
    ///
    /// Bars must arrive in strictly increasing timestamp order per symbol;
    /// anything else is a [`CrosstraderError::DataGap`].
    pub fn on_bar(
        &mut self,
        account: &mut AccountState,
        bar: &Bar,
    ) -> Result<Vec<ExecutionEvent>, CrosstraderError> {
        let state = self
            .symbols
            .entry(bar.symbol.clone())
            .or_insert_with(|| SymbolState::new(self.indicator_params));

        if let Some(last) = state.last_timestamp {
            if bar.timestamp <= last {
                return Err(CrosstraderError::DataGap {
                    symbol: bar.symbol.clone(),
                    reason: format!(
                        "bar timestamp {} not after last seen {}",
                        bar.timestamp, last
                    ),
                });
            }
        }

        let curr = state.indicators.update(bar);
        let signal = self
            .strategy
            .evaluate(state.prev_snapshot.as_ref(), curr.as_ref());
        state.prev_snapshot = curr;
        state.last_timestamp = Some(bar.timestamp);

        Ok(execution::process_bar(
            account,
            &bar.symbol,
            bar,
            signal,
            &self.risk,
        ))
    }
}

/// Evaluate the signal at the end of a full bar sequence. Used by the CLI
/// `signal` command; shares the indicator and strategy code with the engine.
pub fn latest_signal(
    bars: &[Bar],
    strategy: &Strategy,
    params: &IndicatorParams,
) -> Result<Signal, CrosstraderError> {
    validate_sequence(bars)?;
    let snaps = compute_snapshots(bars, params);
    match snaps.len() {
        0 | 1 => Ok(Signal::Hold),
        n => Ok(strategy.evaluate(snaps[n - 2].as_ref(), snaps[n - 1].as_ref())),
    }
}

/// Drives one evaluation cycle per symbol per scheduling tick against the
/// data and order ports.
///
/// A malformed bar sequence skips that symbol's cycle (retried next tick);
/// a reconciliation mismatch is surfaced in the log and the position left
/// flagged. The stop flag is only checked between cycles, so an in-flight
/// cycle always finishes and no position mutation is left half-applied.
pub struct LiveRunner<'a> {
    engine: Engine,
    pub account: AccountState,
    data: &'a dyn crate::ports::data_port::DataPort,
    orders: &'a dyn crate::ports::execution_port::ExecutionPort,
    timeframe: Timeframe,
    symbols: Vec<String>,
    fill_tolerance_pct: f64,
    stop: Arc<AtomicBool>,
}

impl<'a> LiveRunner<'a> {
    pub fn new(
        engine: Engine,
        account: AccountState,
        data: &'a dyn crate::ports::data_port::DataPort,
        orders: &'a dyn crate::ports::execution_port::ExecutionPort,
        timeframe: Timeframe,
        mut symbols: Vec<String>,
        fill_tolerance_pct: f64,
    ) -> Self {
        // Fixed processing order: lexicographic, same as the backtest.
        symbols.sort();
        LiveRunner {
            engine,
            account,
            data,
            orders,
            timeframe,
            symbols,
            fill_tolerance_pct,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag for requesting a stop from another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run cycles until the stop flag is raised, sleeping one bar interval
    /// between ticks.
    pub fn run(&mut self) {
        let tick = self
            .timeframe
            .duration()
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        while !self.stop.load(Ordering::SeqCst) {
            self.run_cycle(Utc::now());
            std::thread::sleep(tick);
        }
    }

    /// One evaluation cycle: per symbol, fetch bars up to `now`, feed the
    /// unseen ones through the engine, submit any intents, and reconcile
    /// the confirmed fills.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Vec<ExecutionEvent> {
        let mut all_events = Vec::new();

        for symbol in self.symbols.clone() {
            match self.run_symbol_cycle(&symbol, now) {
                Ok(mut events) => all_events.append(&mut events),
                Err(err) => warn!("{symbol}: cycle skipped: {err}"),
            }
        }

        all_events
    }

    fn run_symbol_cycle(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExecutionEvent>, CrosstraderError> {
        let start = DateTime::<Utc>::MIN_UTC;
        let bars = self.data.fetch_bars(symbol, self.timeframe, start, now)?;
        validate_sequence(&bars)?;

        let last_seen = self.engine.last_timestamp(symbol);
        let mut events = Vec::new();

        for bar in &bars {
            if let Some(last) = last_seen {
                if bar.timestamp <= last {
                    continue;
                }
            }
            let mut bar_events = self.engine.on_bar(&mut self.account, bar)?;
            for event in &bar_events {
                self.dispatch(event);
            }
            events.append(&mut bar_events);
        }

        Ok(events)
    }

    fn dispatch(&mut self, event: &ExecutionEvent) {
        let intent = match event {
            ExecutionEvent::Opened { intent } => intent,
            ExecutionEvent::Closed { intent, .. } => intent,
            ExecutionEvent::BuyDropped { .. } => return,
        };

        match self.orders.submit(intent) {
            Ok(fill) => {
                let result = match fill.side {
                    Side::Buy => execution::reconcile_entry_fill(
                        &mut self.account,
                        &fill,
                        self.fill_tolerance_pct,
                    ),
                    Side::Sell => execution::reconcile_exit_fill(
                        &mut self.account,
                        &fill,
                        self.fill_tolerance_pct,
                    ),
                };
                if let Err(err) = result {
                    warn!("{}: {err}", intent.symbol);
                }
            }
            Err(err) => warn!("{}: order submission failed: {err}", intent.symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalThresholds;
    use chrono::TimeZone;

    fn make_bar(symbol: &str, i: usize, close: f64) -> Bar {
        Bar {
            symbol: symbol.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(15 * i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    fn engine() -> Engine {
        Engine::new(
            Strategy::MaRsiCross {
                thresholds: SignalThresholds::default(),
            },
            RiskParams {
                investment_amount: 100.0,
                risk_percentage: 10.0,
                max_position_size: 1000.0,
                stop_loss_pct: 2.0,
                take_profit_pct: 10.0,
                symbol_count: 1,
            },
            IndicatorParams {
                short_ma_period: 2,
                long_ma_period: 4,
                rsi_period: 3,
            },
        )
    }

    #[test]
    fn rejects_out_of_order_bars() {
        let mut eng = engine();
        let mut account = AccountState::new(100.0);

        eng.on_bar(&mut account, &make_bar("BTC-USDT", 1, 100.0))
            .unwrap();
        let err = eng
            .on_bar(&mut account, &make_bar("BTC-USDT", 1, 101.0))
            .unwrap_err();
        assert!(matches!(err, CrosstraderError::DataGap { .. }));

        let err = eng
            .on_bar(&mut account, &make_bar("BTC-USDT", 0, 99.0))
            .unwrap_err();
        assert!(matches!(err, CrosstraderError::DataGap { .. }));
    }

    #[test]
    fn symbols_track_timestamps_independently() {
        let mut eng = engine();
        let mut account = AccountState::new(100.0);

        eng.on_bar(&mut account, &make_bar("BTC-USDT", 5, 100.0))
            .unwrap();
        // A different symbol may still be at an earlier timestamp.
        assert!(
            eng.on_bar(&mut account, &make_bar("ETH-USDT", 1, 10.0))
                .is_ok()
        );
        assert!(eng.last_timestamp("ETH-USDT").is_some());
        assert!(eng.last_timestamp("SOL-USDT").is_none());
    }

    #[test]
    fn short_sequences_hold() {
        let bars: Vec<Bar> = (0..3).map(|i| make_bar("BTC-USDT", i, 100.0)).collect();
        let strategy = Strategy::MaRsiCross {
            thresholds: SignalThresholds::default(),
        };
        let params = IndicatorParams {
            short_ma_period: 2,
            long_ma_period: 4,
            rsi_period: 3,
        };
        assert_eq!(
            latest_signal(&bars, &strategy, &params).unwrap(),
            Signal::Hold
        );
        assert_eq!(latest_signal(&[], &strategy, &params).unwrap(), Signal::Hold);
    }

    #[test]
    fn latest_signal_rejects_malformed_sequence() {
        let bars = vec![
            make_bar("BTC-USDT", 1, 100.0),
            make_bar("BTC-USDT", 1, 101.0),
        ];
        let strategy = Strategy::MaRsiCross {
            thresholds: SignalThresholds::default(),
        };
        let params = IndicatorParams {
            short_ma_period: 2,
            long_ma_period: 4,
            rsi_period: 3,
        };
        assert!(latest_signal(&bars, &strategy, &params).is_err());
    }
}
