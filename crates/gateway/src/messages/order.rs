//! Order message types
//!
//! The same order shape arrives on `user.orders.*` pushes and in the replies
//! to order-state, history, cancel, edit and buy/sell calls.

use kestrel_core::{OrderKind, OrderPrice, OrderState, Side, TimeInForce, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub order_id: String,
    /// Client label, used for correlation
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    pub direction: Side,
    pub order_type: OrderKind,
    pub order_state: OrderState,
    /// Limit price, `Market` when the venue reports `"market_price"`
    pub price: OrderPrice,
    pub amount: Decimal,
    #[serde(default)]
    pub filled_amount: Decimal,
    #[serde(default)]
    pub average_price: Option<Decimal>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub post_only: bool,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub creation_timestamp: Timestamp,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update_timestamp: Timestamp,
}

impl OrderMessage {
    /// Quantity still working on the book
    pub fn remaining(&self) -> Decimal {
        self.amount - self.filled_amount
    }

    pub fn is_terminal(&self) -> bool {
        self.order_state.is_terminal()
    }
}

/// Fill on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTradeMessage {
    pub trade_id: String,
    pub order_id: String,
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    pub direction: Side,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub fee_currency: String,
    #[serde(default)]
    pub trade_seq: u64,
    /// `"M"` maker or `"T"` taker
    #[serde(default)]
    pub liquidity: Option<String>,
    #[serde(default)]
    pub order_type: Option<OrderKind>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub state: Option<OrderState>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}

impl UserTradeMessage {
    pub fn is_maker(&self) -> bool {
        self.liquidity.as_deref() == Some("M")
    }
}

/// Reply to buy, sell and edit: the order plus any immediate fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: OrderMessage,
    #[serde(default)]
    pub trades: Vec<UserTradeMessage>,
}

/// Parameters for `private/buy` and `private/sell`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderParams {
    pub instrument_name: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub order_type: OrderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub time_in_force: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
    /// `index_price`, `mark_price` or `last_price`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl OrderParams {
    /// Create a new limit order
    pub fn limit(instrument: impl Into<String>, amount: Decimal, price: Decimal) -> Self {
        Self {
            instrument_name: instrument.into(),
            amount,
            order_type: OrderKind::Limit,
            price: Some(price),
            label: None,
            time_in_force: TimeInForce::GoodTilCancelled,
            post_only: None,
            reduce_only: None,
            trigger_price: None,
            trigger: None,
        }
    }

    /// Create a new market order
    pub fn market(instrument: impl Into<String>, amount: Decimal) -> Self {
        Self {
            order_type: OrderKind::Market,
            price: None,
            time_in_force: TimeInForce::ImmediateOrCancel,
            ..Self::limit(instrument, amount, Decimal::ZERO)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn post_only(mut self) -> Self {
        self.post_only = Some(true);
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = Some(true);
        self
    }
}

/// Parameters for `private/edit`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditParams {
    pub order_id: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
}

impl EditParams {
    pub fn new(order_id: impl Into<String>, amount: Decimal, price: Option<Decimal>) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
            price,
            post_only: None,
            reduce_only: None,
            trigger_price: None,
        }
    }
}
