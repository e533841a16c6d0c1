//! Market data message types
//!
//! Push payloads from `book.*`, `trades.*`, `ticker.*` and
//! `deribit_price_index.*` channels, normalized for downstream consumers.

use kestrel_core::{Side, Timestamp, timestamp_from_millis};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Order book level (price + quantity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl BookLevel {
    /// Create a new book level
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Check if this level should be removed (quantity == 0)
    pub fn is_removed(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Parse a wire level.
    ///
    /// Raw books send `[action, price, amount]`, grouped books send
    /// `[price, amount]`. A `delete` action always yields quantity zero.
    fn from_wire(level: &[Value]) -> Option<Self> {
        match level {
            [Value::String(action), price, amount] => {
                let price = decimal_from_value(price)?;
                let quantity = if action == "delete" {
                    Decimal::ZERO
                } else {
                    decimal_from_value(amount)?
                };
                Some(Self::new(price, quantity))
            }
            [price, amount] => Some(Self::new(
                decimal_from_value(price)?,
                decimal_from_value(amount)?,
            )),
            _ => None,
        }
    }
}

/// Order book update message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderBookUpdate {
    /// Full snapshot of the order book
    Snapshot {
        instrument: String,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
        change_id: u64,
        timestamp: Timestamp,
    },
    /// Incremental update (delta)
    Delta {
        instrument: String,
        /// Changed bid levels (qty=0 means remove level)
        bids: Vec<BookLevel>,
        /// Changed ask levels (qty=0 means remove level)
        asks: Vec<BookLevel>,
        change_id: u64,
        prev_change_id: Option<u64>,
        timestamp: Timestamp,
    },
}

#[derive(Deserialize)]
struct BookPayload {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    instrument_name: String,
    timestamp: u64,
    change_id: u64,
    #[serde(default)]
    prev_change_id: Option<u64>,
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
}

impl OrderBookUpdate {
    /// Build from a `book.*` push payload.
    ///
    /// Grouped books carry no `type` and are always full snapshots.
    pub fn from_payload(data: &Value) -> Result<Self, serde_json::Error> {
        let payload = BookPayload::deserialize(data)?;
        let bids = levels(&payload.bids);
        let asks = levels(&payload.asks);
        let timestamp = timestamp_from_millis(payload.timestamp);

        Ok(match payload.kind.as_deref() {
            Some("change") => Self::Delta {
                instrument: payload.instrument_name,
                bids,
                asks,
                change_id: payload.change_id,
                prev_change_id: payload.prev_change_id,
                timestamp,
            },
            _ => Self::Snapshot {
                instrument: payload.instrument_name,
                bids,
                asks,
                change_id: payload.change_id,
                timestamp,
            },
        })
    }

    /// Get the instrument name
    pub fn instrument(&self) -> &str {
        match self {
            Self::Snapshot { instrument, .. } => instrument,
            Self::Delta { instrument, .. } => instrument,
        }
    }

    pub fn change_id(&self) -> u64 {
        match self {
            Self::Snapshot { change_id, .. } => *change_id,
            Self::Delta { change_id, .. } => *change_id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Snapshot { timestamp, .. } => *timestamp,
            Self::Delta { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this is a snapshot
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot { .. })
    }
}

fn levels(raw: &[Vec<Value>]) -> Vec<BookLevel> {
    raw.iter()
        .filter_map(|level| BookLevel::from_wire(level))
        .collect()
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// Public trade execution message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeMessage {
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    pub trade_id: String,
    #[serde(default)]
    pub trade_seq: u64,
    pub price: Decimal,
    #[serde(rename = "amount")]
    pub quantity: Decimal,
    /// Aggressor side
    pub direction: Side,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub index_price: Option<Decimal>,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub liquidation: Option<String>,
}

impl TradeMessage {
    /// Get the notional value of the trade
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Ticker snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerMessage {
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub best_bid_price: Option<Decimal>,
    #[serde(default)]
    pub best_bid_amount: Option<Decimal>,
    #[serde(default)]
    pub best_ask_price: Option<Decimal>,
    #[serde(default)]
    pub best_ask_amount: Option<Decimal>,
    #[serde(default)]
    pub last_price: Option<Decimal>,
    pub mark_price: Decimal,
    #[serde(default)]
    pub index_price: Option<Decimal>,
    #[serde(default)]
    pub open_interest: Option<Decimal>,
    #[serde(default)]
    pub current_funding: Option<Decimal>,
    #[serde(default)]
    pub funding_8h: Option<Decimal>,
    #[serde(default)]
    pub state: Option<String>,
}

impl TickerMessage {
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid_price, self.best_ask_price) {
            (Some(bid), Some(ask)) if !bid.is_zero() && !ask.is_zero() => {
                Some((bid + ask) / Decimal::TWO)
            }
            _ => None,
        }
    }
}

/// Index price tick from `deribit_price_index.<index>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPriceMessage {
    pub index_name: String,
    pub price: Decimal,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}
