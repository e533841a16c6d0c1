use serde::{Deserialize, Serialize};

/// Order types accepted by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Execute at specified price or better
    Limit,
    /// Execute at current market price
    Market,
    /// Limit order placed when the trigger price is crossed
    StopLimit,
    /// Market order placed when the trigger price is crossed
    StopMarket,
    TakeLimit,
    TakeMarket,
    /// Market order whose unfilled remainder rests as a limit order
    MarketLimit,
    TrailingStop,
    /// Forced close placed by the venue's risk engine
    Liquidation,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Limit => "limit",
            OrderKind::Market => "market",
            OrderKind::StopLimit => "stop_limit",
            OrderKind::StopMarket => "stop_market",
            OrderKind::TakeLimit => "take_limit",
            OrderKind::TakeMarket => "take_market",
            OrderKind::MarketLimit => "market_limit",
            OrderKind::TrailingStop => "trailing_stop",
            OrderKind::Liquidation => "liquidation",
        }
    }

    /// Returns true if the order executes without a limit price
    pub fn is_market(&self) -> bool {
        matches!(
            self,
            OrderKind::Market | OrderKind::StopMarket | OrderKind::TakeMarket
        )
    }

    /// Returns true if the order waits for a trigger
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            OrderKind::StopLimit
                | OrderKind::StopMarket
                | OrderKind::TakeLimit
                | OrderKind::TakeMarket
                | OrderKind::TrailingStop
        )
    }
}
