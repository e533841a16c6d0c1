use serde::{Deserialize, Serialize};

/// Time-in-force instructions for order validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good Till Cancelled: order remains active until explicitly cancelled
    #[default]
    GoodTilCancelled,

    /// Good Till Day: cancelled at the end of the trading session
    GoodTilDay,

    /// Fill or Kill: execute immediately and completely, or cancel entire order
    FillOrKill,

    /// Immediate or Cancel: execute immediately and cancel unfilled portion
    ImmediateOrCancel,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GoodTilCancelled => "good_til_cancelled",
            TimeInForce::GoodTilDay => "good_til_day",
            TimeInForce::FillOrKill => "fill_or_kill",
            TimeInForce::ImmediateOrCancel => "immediate_or_cancel",
        }
    }

    /// Returns true if partial fills are allowed
    pub fn allows_partial_fill(&self) -> bool {
        !matches!(self, TimeInForce::FillOrKill)
    }
}
