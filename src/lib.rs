//! crosstrader — MA-crossover/RSI trading bot core and backtester.
//!
//! Hexagonal architecture: decision logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`]. The backtest
//! simulator and the live runner share one decision path
//! ([`domain::engine::Engine::on_bar`]).

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
