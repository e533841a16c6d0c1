//! Account, position and reference-data messages

use kestrel_core::{OrderPrice, Side, Timestamp, timestamp_from_millis};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::UserTradeMessage;

/// Balances for one currency, pushed on `user.portfolio.<currency>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMessage {
    pub currency: String,
    pub equity: Decimal,
    pub balance: Decimal,
    pub available_funds: Decimal,
    #[serde(default)]
    pub available_withdrawal_funds: Decimal,
    pub margin_balance: Decimal,
    #[serde(default)]
    pub initial_margin: Decimal,
    #[serde(default)]
    pub maintenance_margin: Decimal,
    #[serde(default)]
    pub total_pl: Decimal,
    #[serde(default)]
    pub session_upl: Decimal,
    #[serde(default)]
    pub session_rpl: Decimal,
    #[serde(default)]
    pub delta_total: Option<Decimal>,
}

/// Reply to `private/get_account_summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    #[serde(flatten)]
    pub balances: PortfolioMessage,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub portfolio_margining_enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionDirection {
    Buy,
    Sell,
    Zero,
}

impl PositionDirection {
    pub fn side(&self) -> Option<Side> {
        match self {
            PositionDirection::Buy => Some(Side::Buy),
            PositionDirection::Sell => Some(Side::Sell),
            PositionDirection::Zero => None,
        }
    }
}

/// Open position, from `private/get_positions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMessage {
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    /// Signed size in contracts (USD for inverse perpetuals)
    pub size: Decimal,
    pub direction: PositionDirection,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub average_price: Decimal,
    #[serde(default)]
    pub mark_price: Decimal,
    #[serde(default)]
    pub index_price: Decimal,
    #[serde(default)]
    pub floating_profit_loss: Decimal,
    #[serde(default)]
    pub realized_profit_loss: Decimal,
    #[serde(default)]
    pub total_profit_loss: Decimal,
    #[serde(default)]
    pub initial_margin: Decimal,
    #[serde(default)]
    pub maintenance_margin: Decimal,
    #[serde(default)]
    pub delta: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<u32>,
}

impl PositionMessage {
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }
}

/// Entry of `private/get_stop_order_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopOrderEntry {
    pub stop_id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    pub direction: Side,
    pub amount: Decimal,
    /// Execution price once triggered; market stops report `"market_price"`
    pub price: OrderPrice,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub trigger: Option<String>,
    /// `"trigger:order"`, `"cancel"`, `"edit"`...
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub order_state: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopOrderHistory {
    pub entries: Vec<StopOrderEntry>,
    #[serde(default)]
    pub continuation: Option<String>,
}

/// Page of `private/get_user_trades_*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTradesPage {
    pub trades: Vec<UserTradeMessage>,
    #[serde(default)]
    pub has_more: bool,
}

/// Instrument definition from `public/get_instruments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMessage {
    #[serde(rename = "instrument_name")]
    pub instrument: String,
    /// `future`, `option`, `spot`, ...
    pub kind: String,
    pub base_currency: String,
    pub quote_currency: String,
    #[serde(default)]
    pub settlement_currency: Option<String>,
    pub tick_size: Decimal,
    pub min_trade_amount: Decimal,
    pub contract_size: Decimal,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub expiration_timestamp: Option<i64>,
    #[serde(default)]
    pub settlement_period: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub strike: Option<Decimal>,
    #[serde(default)]
    pub maker_commission: Decimal,
    #[serde(default)]
    pub taker_commission: Decimal,
}

impl InstrumentMessage {
    pub fn is_perpetual(&self) -> bool {
        self.settlement_period.as_deref() == Some("perpetual")
    }
}

/// Column-oriented reply of `public/get_tradingview_chart_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleData {
    pub status: String,
    pub ticks: Vec<u64>,
    pub open: Vec<Decimal>,
    pub high: Vec<Decimal>,
    pub low: Vec<Decimal>,
    pub close: Vec<Decimal>,
    pub volume: Vec<Decimal>,
    #[serde(default)]
    pub cost: Vec<Decimal>,
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: Timestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl CandleData {
    /// `"no_data"` when the range holds no bars
    pub fn has_data(&self) -> bool {
        self.status == "ok"
    }

    /// Zip the columns into bars, stopping at the shortest column
    pub fn candles(&self) -> Vec<Candle> {
        self.ticks
            .iter()
            .zip(&self.open)
            .zip(&self.high)
            .zip(&self.low)
            .zip(&self.close)
            .zip(&self.volume)
            .map(|(((((tick, open), high), low), close), volume)| Candle {
                open_time: timestamp_from_millis(*tick),
                open: *open,
                high: *high,
                low: *low,
                close: *close,
                volume: *volume,
            })
            .collect()
    }
}
