pub mod account;
pub mod backtest;
pub mod bar;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod position;
pub mod risk;
pub mod signal;
