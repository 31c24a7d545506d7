//! CLI definition and dispatch.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self, BacktestConfig};
use crate::domain::bar::{Bar, Timeframe};
use crate::domain::config_validation::{
    validate_backtest_config, validate_data_config, validate_indicator_config,
    validate_trading_config,
};
use crate::domain::engine::latest_signal;
use crate::domain::error::CrosstraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::risk::RiskParams;
use crate::domain::signal::{SignalThresholds, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "crosstrader", about = "MA crossover trading bot core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over historical bars
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// JSON result path (default: result.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Restrict the run to one symbol
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        initial_balance: Option<f64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for configured symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Evaluate the signal at the end of the available data
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
            start_date,
            end_date,
            timeframe,
            initial_balance,
        } => run_backtest(
            &config,
            output.as_ref(),
            symbol.as_deref(),
            start_date.as_deref(),
            end_date.as_deref(),
            timeframe.as_deref(),
            initial_balance,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::Signal { config, symbol } => run_signal(&config, symbol.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CrosstraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    validate_data_config(adapter)?;
    validate_trading_config(adapter)?;
    validate_indicator_config(adapter)?;
    validate_backtest_config(adapter)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_backtest(
    config_path: &PathBuf,
    output_path: Option<&PathBuf>,
    symbol_override: Option<&str>,
    start_override: Option<&str>,
    end_override: Option<&str>,
    timeframe_override: Option<&str>,
    balance_override: Option<f64>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 2: Resolve symbols and timeframe
    let symbols = resolve_symbols(symbol_override, &adapter);
    if symbols.is_empty() {
        eprintln!("error: no symbols configured");
        return ExitCode::from(2);
    }
    let timeframe = match resolve_timeframe(timeframe_override, &adapter) {
        Ok(tf) => tf,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Build strategy, risk and backtest parameters
    let strategy = build_strategy(&adapter);
    let indicator_params = build_indicator_params(&adapter);
    let risk = build_risk_params(&adapter, symbols.len());
    let bt_config = match build_backtest_config(
        &adapter,
        timeframe,
        start_override,
        end_override,
        balance_override,
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Loading strategy: {}", strategy.name());

    // Stage 4: Fetch bars
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let mut data: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    for symbol in &symbols {
        match data_port.fetch_bars(symbol, timeframe, bt_config.start, bt_config.end) {
            Ok(bars) => {
                eprintln!("  {}: {} bars", symbol, bars.len());
                data.insert(symbol.clone(), bars);
            }
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    }

    // Stage 5: Run
    eprintln!(
        "Running backtest: {} symbols, {} to {}",
        symbols.len(),
        bt_config.start.date_naive(),
        bt_config.end.date_naive(),
    );
    let result = match backtest::run_backtest(&data, &strategy, &risk, &indicator_params, &bt_config)
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 6: Console summary
    eprintln!("\n=== Results ===");
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!(
        "Profit/Loss:      {:+.2} ({:+.2}%)",
        result.profit_loss, result.profit_loss_percentage
    );
    eprintln!("Total Trades:     {}", result.summary.total_trades);
    eprintln!("Win Rate:         {:.1}%", result.summary.win_rate * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", result.summary.max_drawdown_pct);

    // Stage 7: Write JSON report
    let output = output_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("result.json"));
    match JsonReportAdapter::new().write(&result, &output) {
        Ok(()) => {
            eprintln!("\nResult written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let symbols = resolve_symbols(None, &adapter);
    let params = build_indicator_params(&adapter);
    let risk = build_risk_params(&adapter, symbols.len());
    let thresholds = build_thresholds(&adapter);

    eprintln!("\nSymbols:      {}", symbols.join(", "));
    eprintln!(
        "Indicators:   MA {}/{}, RSI {}",
        params.short_ma_period, params.long_ma_period, params.rsi_period
    );
    eprintln!(
        "RSI bands:    buy [{}, {}], sell > {}",
        thresholds.rsi_buy_min, thresholds.rsi_buy_max, thresholds.rsi_sell
    );
    eprintln!(
        "Risk:         {}% of {} per symbol, stop {}%, target {}%",
        risk.risk_percentage, risk.investment_amount, risk.stop_loss_pct, risk.take_profit_pct
    );
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf, symbol_override: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let timeframe = match resolve_timeframe(None, &adapter) {
        Ok(tf) => tf,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = resolve_symbols(symbol_override, &adapter);
    for symbol in &symbols {
        match data_port.data_range(symbol, timeframe) {
            Ok(Some((first, last, count))) => {
                println!("{} ({}): {} bars, {} to {}", symbol, timeframe, count, first, last);
            }
            Ok(None) => {
                eprintln!("{} ({}): no data found", symbol, timeframe);
            }
            Err(e) => {
                eprintln!("error querying {}: {}", symbol, e);
            }
        }
    }
    ExitCode::SUCCESS
}

fn run_signal(config_path: &PathBuf, symbol_override: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_indicator_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let timeframe = match resolve_timeframe(None, &adapter) {
        Ok(tf) => tf,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let strategy = build_strategy(&adapter);
    let params = build_indicator_params(&adapter);

    let symbols = resolve_symbols(symbol_override, &adapter);
    if symbols.is_empty() {
        eprintln!("error: no symbols configured");
        return ExitCode::from(2);
    }

    for symbol in &symbols {
        let bars = match data_port.fetch_bars(
            symbol,
            timeframe,
            DateTime::<Utc>::MIN_UTC,
            Utc::now(),
        ) {
            Ok(bars) => bars,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        match latest_signal(&bars, &strategy, &params) {
            Ok(signal) => println!("{}: {:?}", symbol, signal),
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    }
    ExitCode::SUCCESS
}

pub fn resolve_symbols(symbol_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    let mut symbols = match symbol_override {
        Some(s) => vec![s.to_uppercase()],
        None => config
            .get_list("trading", "symbols")
            .into_iter()
            .map(|s| s.to_uppercase())
            .collect(),
    };
    symbols.sort();
    symbols.dedup();
    symbols
}

pub fn resolve_timeframe(
    timeframe_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Timeframe, CrosstraderError> {
    let raw = match timeframe_override {
        Some(s) => s.to_string(),
        None => config
            .get_string("data", "timeframe")
            .unwrap_or_else(|| "15m".to_string()),
    };
    raw.parse().map_err(|_| CrosstraderError::ConfigInvalid {
        section: "data".into(),
        key: "timeframe".into(),
        reason: format!("unknown timeframe '{}'", raw),
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Strategy {
    Strategy::MaRsiCross {
        thresholds: build_thresholds(adapter),
    }
}

fn build_thresholds(adapter: &dyn ConfigPort) -> SignalThresholds {
    let defaults = SignalThresholds::default();
    SignalThresholds {
        rsi_buy_min: adapter.get_double("indicators", "rsi_buy_min", defaults.rsi_buy_min),
        rsi_buy_max: adapter.get_double("indicators", "rsi_buy_max", defaults.rsi_buy_max),
        rsi_sell: adapter.get_double("indicators", "rsi_sell_threshold", defaults.rsi_sell),
    }
}

pub fn build_indicator_params(adapter: &dyn ConfigPort) -> IndicatorParams {
    IndicatorParams {
        short_ma_period: adapter.get_int("indicators", "short_ma_period", 20) as usize,
        long_ma_period: adapter.get_int("indicators", "long_ma_period", 50) as usize,
        rsi_period: adapter.get_int("indicators", "rsi_period", 14) as usize,
    }
}

pub fn build_risk_params(adapter: &dyn ConfigPort, symbol_count: usize) -> RiskParams {
    RiskParams {
        investment_amount: adapter.get_double("trading", "investment_amount", 100.0),
        risk_percentage: adapter.get_double("trading", "risk_percentage", 2.0),
        max_position_size: adapter.get_double("trading", "max_position_size", 1000.0),
        stop_loss_pct: adapter.get_double("trading", "stop_loss_percentage", 2.0),
        take_profit_pct: adapter.get_double("trading", "take_profit_percentage", 10.0),
        symbol_count,
    }
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    timeframe: Timeframe,
    start_override: Option<&str>,
    end_override: Option<&str>,
    balance_override: Option<f64>,
) -> Result<BacktestConfig, CrosstraderError> {
    let start_str = match start_override {
        Some(s) => s.to_string(),
        None => adapter.get_string("backtest", "start_date").ok_or_else(|| {
            CrosstraderError::ConfigMissing {
                section: "backtest".into(),
                key: "start_date".into(),
            }
        })?,
    };
    let end_str = match end_override {
        Some(s) => s.to_string(),
        None => adapter.get_string("backtest", "end_date").ok_or_else(|| {
            CrosstraderError::ConfigMissing {
                section: "backtest".into(),
                key: "end_date".into(),
            }
        })?,
    };

    let start_date = parse_config_date(&start_str, "start_date")?;
    let end_date = parse_config_date(&end_str, "end_date")?;

    // Inclusive end: the whole of end_date is part of the run.
    let start = start_date.and_time(NaiveTime::MIN).and_utc();
    let end = end_date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1)
        - Duration::seconds(1);

    Ok(BacktestConfig {
        start,
        end,
        timeframe,
        initial_balance: balance_override
            .unwrap_or_else(|| adapter.get_double("backtest", "initial_balance", 1000.0)),
    })
}

fn parse_config_date(value: &str, field: &str) -> Result<NaiveDate, CrosstraderError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CrosstraderError::ConfigInvalid {
        section: "backtest".into(),
        key: field.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

fn build_data_port(adapter: &dyn ConfigPort) -> Result<CsvAdapter, CrosstraderError> {
    let path = adapter
        .get_string("data", "path")
        .ok_or_else(|| CrosstraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    Ok(CsvAdapter::new(PathBuf::from(path)))
}
