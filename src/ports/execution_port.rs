//! Order execution port.

use crate::domain::error::CrosstraderError;
use crate::domain::execution::{Fill, TradeIntent};

/// Submits trade intents to the exchange-facing collaborator and reports
/// the confirmed fill. The core reconciles the fill against its recorded
/// prices; it never talks to an exchange directly.
pub trait ExecutionPort {
    fn submit(&self, intent: &TradeIntent) -> Result<Fill, CrosstraderError>;
}
