//! JSON backtest report adapter.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CrosstraderError;
use crate::ports::report_port::ReportPort;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), CrosstraderError> {
        let file = File::create(output_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, result).map_err(|e| CrosstraderError::Report {
            reason: format!("failed to serialize result: {}", e),
        })?;
        Ok(())
    }
}
