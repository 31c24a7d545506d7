//! Domain error types.
//!
//! Not everything that goes wrong is an error: insufficient indicator
//! history yields a Hold signal, and a Buy dropped for lack of balance is an
//! execution event, logged and re-evaluated fresh on the next bar.

/// Top-level error type for crosstrader.
#[derive(Debug, thiserror::Error)]
pub enum CrosstraderError {
    #[error("malformed bar sequence for {symbol}: {reason}")]
    DataGap { symbol: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("empty bar range for {symbol} between {start} and {end}")]
    EmptyBarRange {
        symbol: String,
        start: String,
        end: String,
    },

    #[error("invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: String, end: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(
        "fill for {symbol} deviates {deviation_pct:.4}% from intent \
         (intent {intent_price}, fill {fill_price}), beyond tolerance"
    )]
    ReconciliationMismatch {
        symbol: String,
        intent_price: f64,
        fill_price: f64,
        deviation_pct: f64,
    },

    #[error("order rejected for {symbol}: {reason}")]
    Order { symbol: String, reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CrosstraderError> for std::process::ExitCode {
    fn from(err: &CrosstraderError) -> Self {
        let code: u8 = match err {
            CrosstraderError::Io(_) | CrosstraderError::Report { .. } => 1,
            CrosstraderError::ConfigParse { .. }
            | CrosstraderError::ConfigMissing { .. }
            | CrosstraderError::ConfigInvalid { .. } => 2,
            CrosstraderError::DataGap { .. }
            | CrosstraderError::NoData { .. }
            | CrosstraderError::EmptyBarRange { .. }
            | CrosstraderError::InvalidDateRange { .. } => 3,
            CrosstraderError::ReconciliationMismatch { .. }
            | CrosstraderError::Order { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_gap_message() {
        let err = CrosstraderError::DataGap {
            symbol: "BTC-USDT".into(),
            reason: "duplicate timestamp".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("BTC-USDT"));
        assert!(msg.contains("duplicate timestamp"));
    }

    #[test]
    fn config_errors_share_exit_code() {
        let missing = CrosstraderError::ConfigMissing {
            section: "trading".into(),
            key: "symbols".into(),
        };
        let invalid = CrosstraderError::ConfigInvalid {
            section: "indicators".into(),
            key: "short_ma_period".into(),
            reason: "must be less than long_ma_period".into(),
        };
        assert_eq!(
            format!("{:?}", std::process::ExitCode::from(&missing)),
            format!("{:?}", std::process::ExitCode::from(&invalid))
        );
    }

    #[test]
    fn reconciliation_message_includes_prices() {
        let err = CrosstraderError::ReconciliationMismatch {
            symbol: "ETH-USDT".into(),
            intent_price: 100.0,
            fill_price: 103.0,
            deviation_pct: 3.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("ETH-USDT"));
        assert!(msg.contains("100"));
        assert!(msg.contains("103"));
    }
}
