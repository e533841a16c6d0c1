//! Single consumer of inbound frames.
//!
//! Frames are handled strictly in arrival order. Replies are routed by their
//! well-known request id, pushes by channel prefix.

use super::channel::{ChannelTopic, channel_symbol};
use super::context::SessionContext;
use crate::error::TransportError;
use crate::messages::rpc::{AuthResult, decode_result, parse_frame};
use crate::messages::{
    IndexPriceMessage, InboundFrame, OrderBookUpdate, OrderMessage, PortfolioMessage,
    RequestKind, RpcError, TickerMessage, TradeMessage, UserTradeMessage,
};
use crate::transport::Subjects;
use log::{debug, error, info, trace, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
enum PushError {
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("delivery failed: {0}")]
    Delivery(#[from] TransportError),
}

pub struct MessageDispatcher {
    ctx: Arc<SessionContext>,
}

impl MessageDispatcher {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Handle one text frame. Never fails: problems are logged and, for
    /// pushes, reported on the error topic.
    pub async fn handle_frame(&self, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping unparseable frame: {}", e);
                return;
            }
        };

        match frame {
            InboundFrame::Response { id, result, error } => match RequestKind::from_id(id) {
                Some(kind) => self.on_response(kind, result, error).await,
                None => debug!("Reply with unexpected id {}", id),
            },
            InboundFrame::Notification { channel, data } => {
                self.on_notification(&channel, data).await
            }
            InboundFrame::Heartbeat { kind } => {
                if let Err(e) = self.ctx.heartbeat.on_heartbeat(kind, &self.ctx.outbound) {
                    warn!("Failed to answer heartbeat: {}", e);
                }
            }
            InboundFrame::Unknown(value) => trace!("Unhandled frame: {}", value),
        }
    }

    async fn on_response(&self, kind: RequestKind, result: Option<Value>, error: Option<RpcError>) {
        let ctx = &self.ctx;
        match (kind, error) {
            (RequestKind::Subscribe, Some(err)) => {
                // Stays Subscribing, the driver resends after the ack timeout
                warn!("Subscribe rejected: {} - {}", err.code, err.message);
            }
            (RequestKind::Subscribe, None) => match decode_result::<Vec<String>>(result) {
                Ok(channels) => {
                    let moved = ctx.registry.mark_subscribed(&channels);
                    debug!("Subscribe ack for {} channels ({} new)", channels.len(), moved);
                }
                Err(e) => warn!("Malformed subscribe ack: {}", e),
            },

            (RequestKind::Unsubscribe, Some(err)) => {
                warn!("Unsubscribe rejected: {} - {}", err.code, err.message)
            }
            (RequestKind::Unsubscribe, None) => debug!("Unsubscribe ack"),

            (RequestKind::Authenticate, Some(err)) => ctx.on_auth_failed(err.code, err.message).await,
            (RequestKind::Authenticate, None) => match decode_result::<AuthResult>(result) {
                Ok(auth) => ctx.on_authenticated(auth).await,
                Err(e) => ctx.on_auth_failed(0, format!("malformed auth result: {}", e)).await,
            },

            (RequestKind::RefreshToken, Some(err)) => {
                warn!("Token refresh rejected: {} - {}, retrying", err.code, err.message);
                if let Err(e) = ctx.auth.refresh(&ctx.outbound) {
                    warn!("Token refresh not resent: {}", e);
                }
            }
            (RequestKind::RefreshToken, None) => match decode_result::<AuthResult>(result) {
                Ok(auth) => {
                    ctx.auth.store(auth);
                    info!("Access token refreshed");
                }
                Err(e) => warn!("Malformed refresh result: {}", e),
            },

            (RequestKind::SetHeartbeat, Some(err)) => {
                warn!("set_heartbeat rejected: {} - {}, retrying", err.code, err.message);
                if let Err(e) = ctx.heartbeat.configure(&ctx.outbound) {
                    warn!("set_heartbeat not resent: {}", e);
                }
            }
            (RequestKind::SetHeartbeat, None) => debug!("Heartbeat configured"),

            (RequestKind::Test, Some(err)) => {
                warn!("Test probe rejected: {} - {}, retrying", err.code, err.message);
                if let Err(e) = ctx.heartbeat.probe(&ctx.outbound) {
                    warn!("Test probe not resent: {}", e);
                }
            }
            (RequestKind::Test, None) => trace!("Test ack"),
        }
    }

    async fn on_notification(&self, channel: &str, data: Value) {
        if !self.ctx.registry.contains(channel) {
            debug!("Dropping push for unknown channel {}", channel);
            return;
        }
        let Some(topic) = ChannelTopic::parse(channel) else {
            warn!("No handler for channel {}", channel);
            return;
        };

        if let Err(e) = self.route(topic, channel, data).await {
            error!("Failed to process push on {}: {}", channel, e);
            self.ctx.report_error(Some(channel), e.to_string()).await;
        }
    }

    async fn route(&self, topic: ChannelTopic, channel: &str, data: Value) -> Result<(), PushError> {
        let events = &self.ctx.events;
        match topic {
            ChannelTopic::Book => {
                let update = OrderBookUpdate::from_payload(&data)?;
                let subject = Subjects::book(update.instrument());
                events.book.publish_to(&subject, &update).await?;
            }
            ChannelTopic::Trades => {
                let subject = Subjects::trades(channel_symbol(channel));
                for trade in one_or_many::<TradeMessage>(data)? {
                    events.trades.publish_to(&subject, &trade).await?;
                }
            }
            ChannelTopic::Ticker => {
                let ticker: TickerMessage = serde_json::from_value(data)?;
                let subject = Subjects::ticker(&ticker.instrument);
                events.ticker.publish_to(&subject, &ticker).await?;
            }
            ChannelTopic::Index => {
                let index: IndexPriceMessage = serde_json::from_value(data)?;
                let subject = Subjects::index(&index.index_name);
                events.index.publish_to(&subject, &index).await?;
            }
            ChannelTopic::UserOrders => {
                for order in one_or_many::<OrderMessage>(data)? {
                    events.orders.publish_to(Subjects::ORDERS, &order).await?;
                }
            }
            ChannelTopic::UserTrades => {
                for trade in one_or_many::<UserTradeMessage>(data)? {
                    events.user_trades.publish_to(Subjects::USER_TRADES, &trade).await?;
                }
            }
            ChannelTopic::UserPortfolio => {
                let portfolio: PortfolioMessage = serde_json::from_value(data)?;
                let subject = Subjects::portfolio(&portfolio.currency);
                events.portfolio.publish_to(&subject, &portfolio).await?;
            }
        }
        Ok(())
    }

    /// Consume frames until the queue closes or the session shuts down
    pub fn spawn(self, mut frames: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        let mut shutdown = self.ctx.shutdown_signal();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = frames.recv() => match frame {
                        Some(text) => self.handle_frame(&text).await,
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Dispatcher stopped");
        })
    }
}

/// Pushes carry either one object or an array of them
fn one_or_many<T: DeserializeOwned>(data: Value) -> Result<Vec<T>, serde_json::Error> {
    match data {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::deribit::ws::context::tests::{auth_result, sent_methods, test_context};
    use crate::adapters::deribit::ws::registry::ChannelState;
    use crate::adapters::deribit::ws::state::ConnectionState;
    use crate::transport::Subscriber;
    use kestrel_core::OrderPrice;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_test_ack_without_error_is_ignored() {
        let (ctx, mut rx, _feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));

        dispatcher
            .handle_frame(r#"{"jsonrpc":"2.0","id":6,"result":{"version":"1.2.26"}}"#)
            .await;
        assert!(sent_methods(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_ack_with_error_resends_once() {
        let (ctx, mut rx, _feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));

        dispatcher
            .handle_frame(r#"{"jsonrpc":"2.0","id":6,"error":{"code":10028,"message":"too_many_requests"}}"#)
            .await;
        assert_eq!(sent_methods(&mut rx), vec!["public/test"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_ack_authenticates() {
        let (ctx, mut rx, mut feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));

        let frame = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": serde_json::to_value(auth_result()).unwrap()
        });
        dispatcher.handle_frame(&frame.to_string()).await;

        assert!(ctx.connection.is_authenticated());
        assert_eq!(ctx.auth.current().unwrap().access_token, "access");
        assert_eq!(sent_methods(&mut rx), vec!["public/set_heartbeat"]);
        assert_eq!(
            feeds.status.next().await.unwrap(),
            crate::adapters::deribit::events::SessionStatus::Authenticated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_disconnects() {
        let (ctx, _rx, _feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));

        dispatcher
            .handle_frame(r#"{"jsonrpc":"2.0","id":3,"error":{"code":13004,"message":"invalid_credentials"}}"#)
            .await;
        assert_eq!(ctx.connection.get(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_resends_refresh() {
        let (ctx, mut rx, _feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));
        ctx.auth.store(auth_result());

        dispatcher
            .handle_frame(r#"{"jsonrpc":"2.0","id":4,"error":{"code":13009,"message":"unauthorized"}}"#)
            .await;
        assert_eq!(sent_methods(&mut rx), vec!["public/auth"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_ack_marks_channels() {
        let (ctx, _rx, _feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));
        let names = vec![
            "ticker.BTC-PERPETUAL.100ms".to_string(),
            "trades.BTC-PERPETUAL.100ms".to_string(),
        ];
        for name in &names {
            ctx.registry.upsert(name, "BTC-PERPETUAL");
        }
        ctx.registry.mark_subscribing(&names, Instant::now());

        let frame = json!({"jsonrpc": "2.0", "id": 1, "result": ["ticker.BTC-PERPETUAL.100ms"]});
        dispatcher.handle_frame(&frame.to_string()).await;

        assert_eq!(
            ctx.registry.state("ticker.BTC-PERPETUAL.100ms"),
            Some(ChannelState::Subscribed)
        );
        assert_eq!(
            ctx.registry.state("trades.BTC-PERPETUAL.100ms"),
            Some(ChannelState::Subscribing)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_test_request_answered() {
        let (ctx, mut rx, _feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));

        dispatcher
            .handle_frame(r#"{"jsonrpc":"2.0","method":"heartbeat","params":{"type":"test_request"}}"#)
            .await;
        assert_eq!(sent_methods(&mut rx), vec!["public/test"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_channel_dropped() {
        let (ctx, _rx, mut feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));

        let frame = json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {"channel": "ticker.ETH-PERPETUAL.100ms", "data": {}}
        });
        dispatcher.handle_frame(&frame.to_string()).await;

        assert!(feeds.ticker.try_next().unwrap().is_none());
        assert!(feeds.errors.try_next().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_push_with_market_sentinel() {
        let (ctx, _rx, mut feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));
        ctx.registry.upsert("user.orders.any.any.raw", "");

        let frame = json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {
                "channel": "user.orders.any.any.raw",
                "data": {
                    "order_id": "ETH-1",
                    "instrument_name": "ETH-PERPETUAL",
                    "direction": "buy",
                    "order_type": "market",
                    "order_state": "filled",
                    "price": "market_price",
                    "amount": 10,
                    "filled_amount": 10,
                    "average_price": 2001.5,
                    "creation_timestamp": 1_700_000_000_000u64,
                    "last_update_timestamp": 1_700_000_000_100u64
                }
            }
        });
        dispatcher.handle_frame(&frame.to_string()).await;

        let order = feeds.orders.try_next().unwrap().unwrap();
        assert_eq!(order.price, OrderPrice::Market);
        assert_eq!(order.price.value(), Decimal::ZERO);
        assert_eq!(order.average_price, Some(dec!(2001.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trades_push_fans_out() {
        let (ctx, _rx, mut feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));
        ctx.registry.upsert("trades.BTC-PERPETUAL.100ms", "BTC-PERPETUAL");

        let trade = |id: &str, price: f64| {
            json!({
                "trade_id": id,
                "instrument_name": "BTC-PERPETUAL",
                "price": price,
                "amount": 10.0,
                "direction": "sell",
                "timestamp": 1_700_000_000_000u64
            })
        };
        let frame = json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {
                "channel": "trades.BTC-PERPETUAL.100ms",
                "data": [trade("1", 42000.0), trade("2", 41999.5)]
            }
        });
        dispatcher.handle_frame(&frame.to_string()).await;

        assert_eq!(feeds.trades.try_next().unwrap().unwrap().trade_id, "1");
        assert_eq!(feeds.trades.try_next().unwrap().unwrap().price, dec!(41999.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_push_reported() {
        let (ctx, mut rx, mut feeds, _shutdown) = test_context();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx));
        ctx.registry.upsert("ticker.BTC-PERPETUAL.100ms", "BTC-PERPETUAL");

        let bad = json!({
            "jsonrpc": "2.0",
            "method": "subscription",
            "params": {"channel": "ticker.BTC-PERPETUAL.100ms", "data": {"oops": true}}
        });
        dispatcher.handle_frame(&bad.to_string()).await;
        dispatcher.handle_frame("{not json").await;

        let error = feeds.errors.try_next().unwrap().unwrap();
        assert_eq!(error.channel.as_deref(), Some("ticker.BTC-PERPETUAL.100ms"));

        // The next frame is still handled
        dispatcher
            .handle_frame(r#"{"jsonrpc":"2.0","id":6,"error":{"code":1,"message":"x"}}"#)
            .await;
        assert_eq!(sent_methods(&mut rx), vec!["public/test"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_token_lifetime_keeps_dispatcher_alive() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Info)
            .try_init();
        let (ctx, mut rx, _feeds, shutdown) = test_context();
        let (frames, queue) = mpsc::unbounded_channel();
        let handle = MessageDispatcher::new(Arc::clone(&ctx)).spawn(queue);

        frames
            .send(r#"{"jsonrpc":"2.0","id":3,"result":{"access_token":"a","refresh_token":"r","expires_in":10000000000000}}"#.to_string())
            .unwrap();
        frames
            .send(r#"{"jsonrpc":"2.0","id":6,"error":{"code":1,"message":"x"}}"#.to_string())
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(!handle.is_finished());
        assert!(ctx.connection.is_authenticated());
        assert_eq!(ctx.auth.current().unwrap().expires_at(), None);
        assert_eq!(
            sent_methods(&mut rx),
            vec!["public/set_heartbeat", "public/test"]
        );

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }
}
