//! Bar data access port.
//!
//! The core never fetches data itself; it consumes already-fetched bar
//! sequences supplied through this trait and rejects malformed ones.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::CrosstraderError;
use chrono::{DateTime, Utc};

pub trait DataPort {
    /// Ordered bars for one symbol/timeframe inside `[start, end]`.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, CrosstraderError>;

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, CrosstraderError>;

    /// (first timestamp, last timestamp, bar count) for a symbol, or `None`
    /// when no data exists.
    fn data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, CrosstraderError>;
}
