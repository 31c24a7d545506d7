//! CSV file data adapter.
//!
//! Bars live in one file per symbol and timeframe, named
//! `{symbol}_{timeframe}.csv`, with columns
//! `timestamp,open,high,low,close,volume` and RFC 3339 timestamps.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::CrosstraderError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn parse_field<T: std::str::FromStr>(
        record: &csv::StringRecord,
        index: usize,
        name: &str,
        symbol: &str,
    ) -> Result<T, CrosstraderError>
    where
        T::Err: std::fmt::Display,
    {
        record
            .get(index)
            .ok_or_else(|| CrosstraderError::DataGap {
                symbol: symbol.to_string(),
                reason: format!("missing {} column", name),
            })?
            .parse()
            .map_err(|e| CrosstraderError::DataGap {
                symbol: symbol.to_string(),
                reason: format!("invalid {} value: {}", name, e),
            })
    }

    fn read_all(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, CrosstraderError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| CrosstraderError::NoData {
            symbol: format!("{} ({}: {})", symbol, path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| CrosstraderError::DataGap {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| CrosstraderError::DataGap {
                symbol: symbol.to_string(),
                reason: "missing timestamp column".into(),
            })?;
            let timestamp = DateTime::parse_from_rfc3339(ts_str)
                .map_err(|e| CrosstraderError::DataGap {
                    symbol: symbol.to_string(),
                    reason: format!("invalid timestamp '{}': {}", ts_str, e),
                })?
                .with_timezone(&Utc);

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: Self::parse_field(&record, 1, "open", symbol)?,
                high: Self::parse_field(&record, 2, "high", symbol)?,
                low: Self::parse_field(&record, 3, "low", symbol)?,
                close: Self::parse_field(&record, 4, "close", symbol)?,
                volume: Self::parse_field(&record, 5, "volume", symbol)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, CrosstraderError> {
        let bars = self.read_all(symbol, timeframe)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect())
    }

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, CrosstraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| CrosstraderError::NoData {
            symbol: format!("{}: {}", self.base_path.display(), e),
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(CrosstraderError::Io)?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if name_str.ends_with(&suffix) {
                let symbol = &name_str[..name_str.len() - suffix.len()];
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, CrosstraderError> {
        if !self.csv_path(symbol, timeframe).exists() {
            return Ok(None);
        }
        let bars = self.read_all(symbol, timeframe)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}
