//! Configuration validation.
//!
//! Every field is checked before a run starts so a bad config fails fast
//! with a named section and key instead of surfacing mid-run.

use crate::domain::bar::Timeframe;
use crate::domain::error::CrosstraderError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    validate_symbols(config)?;
    validate_investment_amount(config)?;
    validate_risk_percentage(config)?;
    validate_max_position_size(config)?;
    validate_stop_loss(config)?;
    validate_take_profit(config)?;
    validate_fill_tolerance(config)?;
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    validate_ma_periods(config)?;
    validate_rsi_period(config)?;
    validate_rsi_thresholds(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    validate_dates(config)?;
    validate_initial_balance(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(CrosstraderError::ConfigMissing {
                section: "data".to_string(),
                key: "path".to_string(),
            });
        }
    }
    validate_timeframe(config)?;
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let symbols = config.get_list("trading", "symbols");
    if symbols.is_empty() {
        return Err(CrosstraderError::ConfigMissing {
            section: "trading".to_string(),
            key: "symbols".to_string(),
        });
    }
    Ok(())
}

fn validate_investment_amount(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("trading", "investment_amount", 0.0);
    if value <= 0.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "trading".to_string(),
            key: "investment_amount".to_string(),
            reason: "investment_amount must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_risk_percentage(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("trading", "risk_percentage", 0.0);
    if value <= 0.0 || value > 100.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "trading".to_string(),
            key: "risk_percentage".to_string(),
            reason: "risk_percentage must be between 0 and 100".to_string(),
        });
    }
    Ok(())
}

fn validate_max_position_size(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("trading", "max_position_size", 0.0);
    if value <= 0.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "trading".to_string(),
            key: "max_position_size".to_string(),
            reason: "max_position_size must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("trading", "stop_loss_percentage", 0.0);
    if value < 0.0 || value >= 100.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "trading".to_string(),
            key: "stop_loss_percentage".to_string(),
            reason: "stop_loss_percentage must be between 0 and 100".to_string(),
        });
    }
    Ok(())
}

fn validate_take_profit(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("trading", "take_profit_percentage", 0.0);
    if value < 0.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "trading".to_string(),
            key: "take_profit_percentage".to_string(),
            reason: "take_profit_percentage must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_fill_tolerance(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("trading", "fill_tolerance_pct", 0.0);
    if value < 0.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "trading".to_string(),
            key: "fill_tolerance_pct".to_string(),
            reason: "fill_tolerance_pct must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_ma_periods(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let short = config.get_int("indicators", "short_ma_period", 0);
    let long = config.get_int("indicators", "long_ma_period", 0);
    if short < 1 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "short_ma_period".to_string(),
            reason: "short_ma_period must be at least 1".to_string(),
        });
    }
    if long < 1 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "long_ma_period".to_string(),
            reason: "long_ma_period must be at least 1".to_string(),
        });
    }
    if short >= long {
        return Err(CrosstraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "short_ma_period".to_string(),
            reason: "short_ma_period must be less than long_ma_period".to_string(),
        });
    }
    Ok(())
}

fn validate_rsi_period(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_int("indicators", "rsi_period", 0);
    if value < 2 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "rsi_period".to_string(),
            reason: "rsi_period must be at least 2".to_string(),
        });
    }
    Ok(())
}

fn validate_rsi_thresholds(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let buy_min = config.get_double("indicators", "rsi_buy_min", 30.0);
    let buy_max = config.get_double("indicators", "rsi_buy_max", 50.0);
    let sell = config.get_double("indicators", "rsi_sell_threshold", 70.0);

    for (key, value) in [
        ("rsi_buy_min", buy_min),
        ("rsi_buy_max", buy_max),
        ("rsi_sell_threshold", sell),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(CrosstraderError::ConfigInvalid {
                section: "indicators".to_string(),
                key: key.to_string(),
                reason: format!("{} must be between 0 and 100", key),
            });
        }
    }
    if buy_min > buy_max {
        return Err(CrosstraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "rsi_buy_min".to_string(),
            reason: "rsi_buy_min must not exceed rsi_buy_max".to_string(),
        });
    }
    if buy_max > sell {
        return Err(CrosstraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "rsi_buy_max".to_string(),
            reason: "rsi_buy_max must not exceed rsi_sell_threshold".to_string(),
        });
    }
    Ok(())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    match config.get_string("data", "timeframe") {
        None => Err(CrosstraderError::ConfigMissing {
            section: "data".to_string(),
            key: "timeframe".to_string(),
        }),
        Some(s) => s
            .parse::<Timeframe>()
            .map(|_| ())
            .map_err(|_| CrosstraderError::ConfigInvalid {
                section: "data".to_string(),
                key: "timeframe".to_string(),
                reason: format!("unknown timeframe '{}'", s),
            }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(CrosstraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(())
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, CrosstraderError> {
    match value {
        None => Err(CrosstraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            CrosstraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }
        }),
    }
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), CrosstraderError> {
    let value = config.get_double("backtest", "initial_balance", 0.0);
    if value <= 0.0 {
        return Err(CrosstraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_balance".to_string(),
            reason: "initial_balance must be positive".to_string(),
        });
    }
    Ok(())
}
