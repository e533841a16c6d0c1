//! Wire message types
//!
//! JSON-RPC envelopes plus the typed payloads carried by pushes and REST
//! replies. Payload types double as the events handed to consumers.

pub mod account;
pub mod market_data;
pub mod order;
pub mod rpc;

pub use account::{
    AccountSummary, Candle, CandleData, InstrumentMessage, PortfolioMessage, PositionMessage,
    StopOrderHistory, UserTradesPage,
};
pub use market_data::{BookLevel, IndexPriceMessage, OrderBookUpdate, TickerMessage, TradeMessage};
pub use order::{EditParams, OrderMessage, OrderParams, OrderResponse, UserTradeMessage};
pub use rpc::{HeartbeatKind, InboundFrame, RequestKind, RpcError, RpcRequest};
