//! Backtest simulator.
//!
//! Replays historical bars through the same [`Engine`] the live runner
//! uses, so there is no duplicated decision logic. Single-threaded, deterministic, no
//! wall-clock dependency: bars are processed in strict chronological order,
//! and symbols sharing a timestamp are processed lexicographically (the
//! `BTreeMap` iteration order) because they share one available balance.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::account::AccountState;
use crate::domain::bar::{Bar, Timeframe, validate_sequence};
use crate::domain::engine::Engine;
use crate::domain::error::CrosstraderError;
use crate::domain::execution::close_position;
use crate::domain::indicator::IndicatorParams;
use crate::domain::position::{CloseReason, Trade};
use crate::domain::risk::RiskParams;
use crate::domain::signal::Strategy;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub initial_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Aggregate trade statistics for the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbols: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub timeframe: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub profit_loss: f64,
    pub profit_loss_percentage: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub summary: Summary,
}

/// Run the strategy over historical bars.
///
/// Fatal errors (an inverted date range, a symbol with no bars inside the
/// range, a malformed sequence) return `Err` with no partial result. Any
/// position still open when the data ends is liquidated at the last close
/// (`CloseReason::EndOfData`) so the final balance is fully realized.
pub fn run_backtest(
    data: &BTreeMap<String, Vec<Bar>>,
    strategy: &Strategy,
    risk: &RiskParams,
    indicator_params: &IndicatorParams,
    config: &BacktestConfig,
) -> Result<BacktestResult, CrosstraderError> {
    if config.end < config.start {
        return Err(CrosstraderError::InvalidDateRange {
            start: config.start.to_rfc3339(),
            end: config.end.to_rfc3339(),
        });
    }
    if data.is_empty() {
        return Err(CrosstraderError::NoData {
            symbol: "(no symbols)".into(),
        });
    }

    // Clip to the requested range and validate each symbol up front.
    let mut clipped: BTreeMap<&str, Vec<&Bar>> = BTreeMap::new();
    for (symbol, bars) in data {
        validate_sequence(bars)?;
        let in_range: Vec<&Bar> = bars
            .iter()
            .filter(|b| b.timestamp >= config.start && b.timestamp <= config.end)
            .collect();
        if in_range.is_empty() {
            return Err(CrosstraderError::EmptyBarRange {
                symbol: symbol.clone(),
                start: config.start.to_rfc3339(),
                end: config.end.to_rfc3339(),
            });
        }
        clipped.insert(symbol, in_range);
    }

    let timeline: BTreeSet<DateTime<Utc>> = clipped
        .values()
        .flat_map(|bars| bars.iter().map(|b| b.timestamp))
        .collect();

    let mut engine = Engine::new(*strategy, risk.clone(), *indicator_params);
    let mut account = AccountState::new(config.initial_balance);
    let mut cursors: BTreeMap<&str, usize> = clipped.keys().map(|s| (*s, 0usize)).collect();
    let mut latest_close: HashMap<String, f64> = HashMap::new();
    let mut equity_curve = Vec::with_capacity(timeline.len());
    let mut last_timestamp = config.start;

    for ts in timeline {
        for (symbol, bars) in &clipped {
            if let Some(cursor) = cursors.get_mut(symbol) {
                if *cursor < bars.len() && bars[*cursor].timestamp == ts {
                    let bar = bars[*cursor];
                    engine.on_bar(&mut account, bar)?;
                    latest_close.insert(bar.symbol.clone(), bar.close);
                    *cursor += 1;
                }
            }
        }
        equity_curve.push(EquityPoint {
            timestamp: ts,
            equity: account.mark_to_market(&latest_close),
        });
        last_timestamp = ts;
    }

    // Liquidate whatever is still open at the last seen close.
    let open_symbols: Vec<String> = account.positions.keys().cloned().collect();
    for symbol in open_symbols {
        let price = latest_close
            .get(&symbol)
            .copied()
            .unwrap_or_else(|| account.positions[&symbol].entry_price);
        close_position(
            &mut account,
            &symbol,
            price,
            last_timestamp,
            CloseReason::EndOfData,
        );
    }
    if let Some(point) = equity_curve.last_mut() {
        point.equity = account.available_balance;
    }

    let final_balance = account.available_balance;
    let profit_loss = final_balance - config.initial_balance;
    let profit_loss_percentage = if config.initial_balance > 0.0 {
        profit_loss / config.initial_balance * 100.0
    } else {
        0.0
    };

    Ok(BacktestResult {
        symbols: clipped.keys().map(|s| s.to_string()).collect(),
        start_date: config.start,
        end_date: config.end,
        timeframe: config.timeframe.to_string(),
        initial_balance: config.initial_balance,
        final_balance,
        profit_loss,
        profit_loss_percentage,
        summary: summarize(&account.trades, &equity_curve),
        equity_curve,
        trades: account.trades,
    })
}

fn summarize(trades: &[Trade], equity_curve: &[EquityPoint]) -> Summary {
    let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
    let losses = trades.iter().filter(|t| t.pnl < 0.0).count();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64
    };

    let mut peak = f64::MIN;
    let mut max_drawdown_pct = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let dd = (peak - point.equity) / peak * 100.0;
            if dd > max_drawdown_pct {
                max_drawdown_pct = dd;
            }
        }
    }

    Summary {
        total_trades: trades.len(),
        wins,
        losses,
        win_rate,
        max_drawdown_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalThresholds;
    use approx::assert_relative_eq;
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

    fn strategy() -> Strategy {
        Strategy::MaRsiCross {
            thresholds: SignalThresholds::default(),
        }
    }

    fn risk(symbol_count: usize) -> RiskParams {
        RiskParams {
            investment_amount: 100.0,
            risk_percentage: 50.0,
            max_position_size: 1000.0,
            stop_loss_pct: 2.0,
            take_profit_pct: 10.0,
            symbol_count,
        }
    }

    fn params() -> IndicatorParams {
        IndicatorParams {
            short_ma_period: 2,
            long_ma_period: 4,
            rsi_period: 3,
        }
    }

    fn config(n_bars: usize) -> BacktestConfig {
        BacktestConfig {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(15 * n_bars as i64),
            timeframe: Timeframe::M15,
            initial_balance: 100.0,
        }
    }

    fn flat_series(symbol: &str, n: usize) -> Vec<Bar> {
        (0..n).map(|i| make_bar(symbol, i, 100.0)).collect()
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut data = BTreeMap::new();
        data.insert("BTC-USDT".to_string(), flat_series("BTC-USDT", 10));
        let cfg = BacktestConfig {
            start: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            timeframe: Timeframe::M15,
            initial_balance: 100.0,
        };
        let err = run_backtest(&data, &strategy(), &risk(1), &params(), &cfg).unwrap_err();
        assert!(matches!(err, CrosstraderError::InvalidDateRange { .. }));
    }

    #[test]
    fn rejects_empty_bar_range() {
        let mut data = BTreeMap::new();
        data.insert("BTC-USDT".to_string(), flat_series("BTC-USDT", 10));
        let cfg = BacktestConfig {
            start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            timeframe: Timeframe::M15,
            initial_balance: 100.0,
        };
        let err = run_backtest(&data, &strategy(), &risk(1), &params(), &cfg).unwrap_err();
        assert!(matches!(err, CrosstraderError::EmptyBarRange { .. }));
    }

    #[test]
    fn rejects_no_symbols() {
        let data = BTreeMap::new();
        let err = run_backtest(&data, &strategy(), &risk(1), &params(), &config(10)).unwrap_err();
        assert!(matches!(err, CrosstraderError::NoData { .. }));
    }

    #[test]
    fn rejects_malformed_sequence() {
        let mut bars = flat_series("BTC-USDT", 5);
        bars[3].timestamp = bars[2].timestamp;
        let mut data = BTreeMap::new();
        data.insert("BTC-USDT".to_string(), bars);
        let err = run_backtest(&data, &strategy(), &risk(1), &params(), &config(10)).unwrap_err();
        assert!(matches!(err, CrosstraderError::DataGap { .. }));
    }

    #[test]
    fn flat_market_produces_no_trades() {
        let mut data = BTreeMap::new();
        data.insert("BTC-USDT".to_string(), flat_series("BTC-USDT", 30));
        let result =
            run_backtest(&data, &strategy(), &risk(1), &params(), &config(30)).unwrap();

        assert!(result.trades.is_empty());
        assert_relative_eq!(result.final_balance, 100.0);
        assert_relative_eq!(result.profit_loss, 0.0);
        assert_eq!(result.equity_curve.len(), 30);
        assert!(result.equity_curve.iter().all(|p| p.equity == 100.0));
    }

    #[test]
    fn deterministic_across_runs() {
        let mut data = BTreeMap::new();
        let bars: Vec<Bar> = (0..120)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.4).sin() * 10.0;
                make_bar("BTC-USDT", i, close)
            })
            .collect();
        data.insert("BTC-USDT".to_string(), bars);

        let first =
            run_backtest(&data, &strategy(), &risk(1), &params(), &config(120)).unwrap();
        let second =
            run_backtest(&data, &strategy(), &risk(1), &params(), &config(120)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn pnl_sum_matches_balance_delta() {
        let mut data = BTreeMap::new();
        let bars: Vec<Bar> = (0..200)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 12.0 + (i % 7) as f64;
                make_bar("BTC-USDT", i, close)
            })
            .collect();
        data.insert("BTC-USDT".to_string(), bars);

        let result =
            run_backtest(&data, &strategy(), &risk(1), &params(), &config(200)).unwrap();

        let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
        assert_relative_eq!(
            pnl_sum,
            result.final_balance - result.initial_balance,
            epsilon = 1e-9
        );
        for trade in &result.trades {
            assert_relative_eq!(
                trade.pnl,
                (trade.exit_price - trade.entry_price) * trade.size,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn open_position_liquidated_at_end_of_data() {
        // Drop below the long MA, then cross back up with mild RSI: one buy,
        // then the series ends while still in position.
        let mut closes: Vec<f64> = vec![100.0; 6];
        closes.extend([96.0, 94.0, 92.0, 90.0, 88.0]);
        closes.extend([89.5, 91.0, 93.0]);
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar("BTC-USDT", i, c))
            .collect();
        let n = bars.len();
        let mut data = BTreeMap::new();
        data.insert("BTC-USDT".to_string(), bars);

        let result = run_backtest(&data, &strategy(), &risk(1), &params(), &config(n)).unwrap();

        if let Some(last) = result.trades.last() {
            if last.close_reason == CloseReason::EndOfData {
                assert_relative_eq!(
                    last.exit_price,
                    *closes.last().unwrap(),
                    epsilon = 1e-9
                );
            }
        }
        // Whatever happened, nothing is left implicitly open: the final
        // equity point equals the fully realized balance.
        assert_relative_eq!(
            result.equity_curve.last().unwrap().equity,
            result.final_balance,
            epsilon = 1e-9
        );
    }

    #[test]
    fn multi_symbol_shares_one_balance() {
        let series_a: Vec<Bar> = (0..60)
            .map(|i| make_bar("AAA-USDT", i, 100.0 + (i as f64 * 0.5).sin() * 9.0))
            .collect();
        let series_b: Vec<Bar> = (0..60)
            .map(|i| make_bar("BBB-USDT", i, 50.0 + (i as f64 * 0.5).sin() * 4.5))
            .collect();
        let mut data = BTreeMap::new();
        data.insert("AAA-USDT".to_string(), series_a);
        data.insert("BBB-USDT".to_string(), series_b);

        let result =
            run_backtest(&data, &strategy(), &risk(2), &params(), &config(60)).unwrap();

        assert_eq!(result.symbols, vec!["AAA-USDT", "BBB-USDT"]);
        let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
        assert_relative_eq!(
            pnl_sum,
            result.final_balance - result.initial_balance,
            epsilon = 1e-9
        );
    }

    #[test]
    fn summary_counts_wins_and_losses() {
        let trades = vec![
            sample_trade(2.0),
            sample_trade(-1.0),
            sample_trade(3.0),
            sample_trade(0.0),
        ];
        let curve = vec![
            EquityPoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                equity: 100.0,
            },
            EquityPoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap(),
                equity: 110.0,
            },
            EquityPoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap(),
                equity: 99.0,
            },
        ];
        let summary = summarize(&trades, &curve);
        assert_eq!(summary.total_trades, 4);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.losses, 1);
        assert_relative_eq!(summary.win_rate, 0.5);
        assert_relative_eq!(summary.max_drawdown_pct, (110.0 - 99.0) / 110.0 * 100.0);
    }

    fn sample_trade(pnl: f64) -> Trade {
        Trade {
            symbol: "BTC-USDT".into(),
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            size: 1.0,
            pnl,
            pnl_pct: pnl,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            closed_at: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            close_reason: CloseReason::SignalExit,
        }
    }
}
