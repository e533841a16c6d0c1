//! Typed events handed to downstream consumers
//!
//! One publisher per topic. The session only sees the `Publisher` trait; the
//! default wiring uses broadcast channels and returns the matching
//! subscribers as [`SessionFeeds`].

use crate::messages::{
    IndexPriceMessage, OrderBookUpdate, OrderMessage, PortfolioMessage, TickerMessage,
    TradeMessage, UserTradeMessage,
};
use crate::transport::Publisher;
use crate::transport::channel::{ChannelPublisher, ChannelSubscriber};
use kestrel_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Session lifecycle change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// First socket of the session is open
    Connected,
    /// A later socket is open after a loss
    Reconnected,
    Authenticated,
    Disconnected { reason: String },
}

/// Failure while handling a push, surfaced to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub channel: Option<String>,
    pub message: String,
    pub timestamp: Timestamp,
}

impl ErrorEvent {
    pub fn new(channel: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.map(str::to_string),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

pub type EventPublisher<M> = Box<dyn Publisher<M> + Send + Sync>;

/// Publishers the session writes to
pub struct SessionEvents {
    pub book: EventPublisher<OrderBookUpdate>,
    pub trades: EventPublisher<TradeMessage>,
    pub ticker: EventPublisher<TickerMessage>,
    pub index: EventPublisher<IndexPriceMessage>,
    pub orders: EventPublisher<OrderMessage>,
    pub user_trades: EventPublisher<UserTradeMessage>,
    pub portfolio: EventPublisher<PortfolioMessage>,
    pub status: EventPublisher<SessionStatus>,
    pub errors: EventPublisher<ErrorEvent>,
}

/// Consumer side of [`SessionEvents::channels`]
pub struct SessionFeeds {
    pub book: ChannelSubscriber<OrderBookUpdate>,
    pub trades: ChannelSubscriber<TradeMessage>,
    pub ticker: ChannelSubscriber<TickerMessage>,
    pub index: ChannelSubscriber<IndexPriceMessage>,
    pub orders: ChannelSubscriber<OrderMessage>,
    pub user_trades: ChannelSubscriber<UserTradeMessage>,
    pub portfolio: ChannelSubscriber<PortfolioMessage>,
    pub status: ChannelSubscriber<SessionStatus>,
    pub errors: ChannelSubscriber<ErrorEvent>,
}

impl SessionEvents {
    /// Broadcast channel per topic, each holding up to `capacity` events
    pub fn channels(capacity: usize) -> (Self, SessionFeeds) {
        let (book, book_rx) = ChannelPublisher::pair(capacity);
        let (trades, trades_rx) = ChannelPublisher::pair(capacity);
        let (ticker, ticker_rx) = ChannelPublisher::pair(capacity);
        let (index, index_rx) = ChannelPublisher::pair(capacity);
        let (orders, orders_rx) = ChannelPublisher::pair(capacity);
        let (user_trades, user_trades_rx) = ChannelPublisher::pair(capacity);
        let (portfolio, portfolio_rx) = ChannelPublisher::pair(capacity);
        let (status, status_rx) = ChannelPublisher::pair(capacity);
        let (errors, errors_rx) = ChannelPublisher::pair(capacity);

        let events = Self {
            book: Box::new(book),
            trades: Box::new(trades),
            ticker: Box::new(ticker),
            index: Box::new(index),
            orders: Box::new(orders),
            user_trades: Box::new(user_trades),
            portfolio: Box::new(portfolio),
            status: Box::new(status),
            errors: Box::new(errors),
        };
        let feeds = SessionFeeds {
            book: book_rx,
            trades: trades_rx,
            ticker: ticker_rx,
            index: index_rx,
            orders: orders_rx,
            user_trades: user_trades_rx,
            portfolio: portfolio_rx,
            status: status_rx,
            errors: errors_rx,
        };
        (events, feeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Subscriber;

    #[tokio::test]
    async fn test_channels_are_independent() {
        let (events, mut feeds) = SessionEvents::channels(8);

        events.status.publish(&SessionStatus::Authenticated).await.unwrap();
        events
            .errors
            .publish(&ErrorEvent::new(Some("ticker.BTC-PERPETUAL.100ms"), "boom"))
            .await
            .unwrap();

        assert_eq!(feeds.status.next().await.unwrap(), SessionStatus::Authenticated);
        assert_eq!(feeds.errors.next().await.unwrap().message, "boom");
        assert!(feeds.orders.try_next().unwrap().is_none());
    }
}
