//! Execution coordination: the per-symbol Flat/Open state machine.
//!
//! [`process_bar`] is the only code that mutates [`AccountState`]. It turns
//! a signal plus the current bar into position lifecycle transitions and
//! emits trade intents for the order-execution collaborator; it performs no
//! I/O itself.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::domain::account::AccountState;
use crate::domain::bar::Bar;
use crate::domain::error::CrosstraderError;
use crate::domain::position::{CloseReason, Position, PositionStatus, Trade};
use crate::domain::risk::RiskParams;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Order request handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub price_hint: f64,
}

/// Confirmed execution reported back by the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
}

/// Outcome of evaluating one bar for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    Opened { intent: TradeIntent },
    Closed { intent: TradeIntent, trade: Trade },
    /// Buy signal dropped: not enough balance this bar. Non-fatal; the
    /// signal is re-evaluated fresh on the next bar.
    BuyDropped {
        symbol: String,
        required: f64,
        available: f64,
    },
}

/// Evaluate one bar for one symbol, mutating account state.
///
/// Transition order for an open position is fixed: stop-loss check first
/// (off the bar's low), then take-profit (off the high), then a Sell signal
/// exit at the close. When both stop and target are touched inside the same
/// bar the stop wins, the conservative tie-break.
///
/// Flat + Sell is a no-op (long-only); Open + Buy is a no-op (one position
/// per symbol).
pub fn process_bar(
    account: &mut AccountState,
    symbol: &str,
    bar: &Bar,
    signal: Signal,
    risk: &RiskParams,
) -> Vec<ExecutionEvent> {
    let mut events = Vec::new();

    if let Some(pos) = account.positions.get(symbol) {
        let exit = if pos.stop_hit(bar.low) {
            Some((pos.stop_loss, CloseReason::Stop))
        } else if pos.target_hit(bar.high) {
            Some((pos.take_profit, CloseReason::Target))
        } else if signal == Signal::Sell {
            Some((bar.close, CloseReason::SignalExit))
        } else {
            None
        };

        if let Some((exit_price, reason)) = exit {
            if let Some((trade, intent)) =
                close_position(account, symbol, exit_price, bar.timestamp, reason)
            {
                events.push(ExecutionEvent::Closed { intent, trade });
            }
        }
    } else if signal == Signal::Buy {
        if let Some(event) = open_position(account, symbol, bar, risk) {
            events.push(event);
        }
    }

    events
}

fn open_position(
    account: &mut AccountState,
    symbol: &str,
    bar: &Bar,
    risk: &RiskParams,
) -> Option<ExecutionEvent> {
    let entry_price = bar.close;
    let size = risk.position_size(entry_price);
    if size <= 0.0 {
        return None;
    }

    let cost = size * entry_price;
    if account.available_balance < cost {
        warn!(
            "{symbol}: buy signal dropped, need {cost:.2} but only {:.2} available",
            account.available_balance
        );
        return Some(ExecutionEvent::BuyDropped {
            symbol: symbol.to_string(),
            required: cost,
            available: account.available_balance,
        });
    }

    account.available_balance -= cost;
    let position = Position {
        symbol: symbol.to_string(),
        entry_price,
        size,
        stop_loss: risk.stop_loss_price(entry_price),
        take_profit: risk.take_profit_price(entry_price),
        opened_at: bar.timestamp,
        status: PositionStatus::Open,
    };
    info!(
        "{symbol}: opened {size} at {entry_price} (stop {:.4}, target {:.4})",
        position.stop_loss, position.take_profit
    );
    account.positions.insert(symbol.to_string(), position);

    Some(ExecutionEvent::Opened {
        intent: TradeIntent {
            symbol: symbol.to_string(),
            side: Side::Buy,
            size,
            price_hint: entry_price,
        },
    })
}

/// Close an open position at `exit_price`, crediting the balance, realizing
/// pnl into equity, and appending the trade to the ledger.
pub fn close_position(
    account: &mut AccountState,
    symbol: &str,
    exit_price: f64,
    closed_at: DateTime<Utc>,
    reason: CloseReason,
) -> Option<(Trade, TradeIntent)> {
    let position = account.positions.remove(symbol)?;

    let pnl = (exit_price - position.entry_price) * position.size;
    let pnl_pct = (exit_price / position.entry_price - 1.0) * 100.0;

    account.available_balance += position.size * exit_price;
    account.equity += pnl;

    let trade = Trade {
        symbol: position.symbol.clone(),
        entry_price: position.entry_price,
        exit_price,
        size: position.size,
        pnl,
        pnl_pct,
        opened_at: position.opened_at,
        closed_at,
        close_reason: reason,
    };
    info!(
        "{symbol}: closed {:?} at {exit_price} (pnl {pnl:.4}, {pnl_pct:.2}%)",
        reason
    );
    account.trades.push(trade.clone());

    let intent = TradeIntent {
        symbol: position.symbol,
        side: Side::Sell,
        size: position.size,
        price_hint: exit_price,
    };
    Some((trade, intent))
}

/// Result of reconciling a confirmed fill against the recorded prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    Unchanged,
    Adjusted { previous_price: f64, fill_price: f64 },
}

/// Reconcile an entry fill against the open position it created.
///
/// Within tolerance, the recorded entry price moves to the fill, the stop
/// and target are rescaled to preserve their percentages, and the balance is
/// corrected by the cost difference. Beyond tolerance the position is
/// flagged for the operator and left open; it is never auto-closed.
pub fn reconcile_entry_fill(
    account: &mut AccountState,
    fill: &Fill,
    tolerance_pct: f64,
) -> Result<ReconcileOutcome, CrosstraderError> {
    let position = account
        .positions
        .get_mut(&fill.symbol)
        .ok_or_else(|| CrosstraderError::NoData {
            symbol: fill.symbol.clone(),
        })?;

    let intent_price = position.entry_price;
    if fill.price == intent_price {
        return Ok(ReconcileOutcome::Unchanged);
    }

    let deviation_pct = ((fill.price - intent_price) / intent_price).abs() * 100.0;
    if deviation_pct > tolerance_pct {
        position.status = PositionStatus::Flagged;
        warn!(
            "{}: entry fill {:.4} deviates {:.4}% from intent {:.4}, flagging",
            fill.symbol, fill.price, deviation_pct, intent_price
        );
        return Err(CrosstraderError::ReconciliationMismatch {
            symbol: fill.symbol.clone(),
            intent_price,
            fill_price: fill.price,
            deviation_pct,
        });
    }

    let scale = fill.price / intent_price;
    position.entry_price = fill.price;
    position.stop_loss *= scale;
    position.take_profit *= scale;
    // We debited size * intent_price on open; settle the difference.
    account.available_balance += (intent_price - fill.price) * fill.size;

    Ok(ReconcileOutcome::Adjusted {
        previous_price: intent_price,
        fill_price: fill.price,
    })
}

/// Reconcile an exit fill against the most recent ledger entry for the
/// symbol, recomputing its pnl and correcting balance and equity.
pub fn reconcile_exit_fill(
    account: &mut AccountState,
    fill: &Fill,
    tolerance_pct: f64,
) -> Result<ReconcileOutcome, CrosstraderError> {
    let trade = account
        .trades
        .iter_mut()
        .rev()
        .find(|t| t.symbol == fill.symbol)
        .ok_or_else(|| CrosstraderError::NoData {
            symbol: fill.symbol.clone(),
        })?;

    let intent_price = trade.exit_price;
    if fill.price == intent_price {
        return Ok(ReconcileOutcome::Unchanged);
    }

    let deviation_pct = ((fill.price - intent_price) / intent_price).abs() * 100.0;
    if deviation_pct > tolerance_pct {
        warn!(
            "{}: exit fill {:.4} deviates {:.4}% from intent {:.4}",
            fill.symbol, fill.price, deviation_pct, intent_price
        );
        return Err(CrosstraderError::ReconciliationMismatch {
            symbol: fill.symbol.clone(),
            intent_price,
            fill_price: fill.price,
            deviation_pct,
        });
    }

    let delta = (fill.price - intent_price) * trade.size;
    trade.exit_price = fill.price;
    trade.pnl = (fill.price - trade.entry_price) * trade.size;
    trade.pnl_pct = (fill.price / trade.entry_price - 1.0) * 100.0;
    account.available_balance += delta;
    account.equity += delta;

    Ok(ReconcileOutcome::Adjusted {
        previous_price: intent_price,
        fill_price: fill.price,
    })
}
