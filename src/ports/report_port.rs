//! Backtest report output port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CrosstraderError;
use std::path::Path;

pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), CrosstraderError>;
}
