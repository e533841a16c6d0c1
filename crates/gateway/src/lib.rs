//! Kestrel Gateway
//!
//! Exchange connectivity for Kestrel. Provides:
//! - An authenticated, self-healing Deribit WebSocket session that keeps a
//!   set of channels subscribed across reconnects
//! - A rate-limited REST client for account, order and reference data calls
//! - Wire message types for market data, orders and account state
//! - Typed event transport (tokio channels, with traits for other transports)
//!
//! ## Architecture
//!
//! ```text
//!            Deribit
//!       ws │       │ https
//!   ┌──────▼───┐ ┌─▼──────────┐
//!   │ Session  │ │ RestClient │
//!   └──────┬───┘ └─▲──────────┘
//!          │ SessionEvents (md.book.{instr}, trades.{instr}, account.orders, ...)
//!   ┌──────▼───────┴─┐
//!   │ Order mgmt /   │
//!   │ strategies     │
//!   └────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod messages;
pub mod transport;

// Re-export commonly used types
pub use adapters::deribit::{
    DeribitSession, ErrorEvent, RestClient, SessionEvents, SessionFeeds, SessionStatus,
};
pub use config::{ConnectivityConfig, Credentials, RestConfig, SessionConfig};
pub use error::{ConfigError, GatewayError, RestError, SessionError, TransportError};
pub use messages::{
    OrderBookUpdate, OrderMessage, OrderParams, PortfolioMessage, TickerMessage, TradeMessage,
    UserTradeMessage,
};
pub use transport::{
    Publisher, Subjects, Subscriber,
    channel::{ChannelPublisher, ChannelSubscriber},
};
