//! Integration test: DeribitSession <-> mock exchange
//!
//! Drives the full session lifecycle against an in-process WebSocket server:
//! connect -> authenticate -> subscribe -> push -> server drops the socket ->
//! watchdog reconnects -> channels are subscribed again.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use kestrel_gateway::{
    ConnectivityConfig, Credentials, DeribitSession, SessionEvents, SessionStatus, Subscriber,
    adapters::deribit::ws::ChannelState,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const TICKER_CHANNEL: &str = "ticker.BTC-PERPETUAL.100ms";

/// Mock venue: answers the session's requests and remembers what it saw
#[derive(Default)]
struct MockExchange {
    connections: AtomicUsize,
    auth_requests: AtomicUsize,
    subscribed: Mutex<Vec<String>>,
}

async fn ws_handler(ws: WebSocketUpgrade, State(exchange): State<Arc<MockExchange>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, exchange))
}

fn reply(id: &Value, result: Value) -> Message {
    Message::Text(json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string().into())
}

fn ticker_push(mark_price: f64) -> Message {
    let push = json!({
        "jsonrpc": "2.0",
        "method": "subscription",
        "params": {
            "channel": TICKER_CHANNEL,
            "data": {
                "instrument_name": "BTC-PERPETUAL",
                "timestamp": 1_700_000_000_000u64,
                "best_bid_price": 41999.5,
                "best_ask_price": 42000.5,
                "mark_price": mark_price
            }
        }
    });
    Message::Text(push.to_string().into())
}

async fn serve_socket(socket: WebSocket, exchange: Arc<MockExchange>) {
    let connection = exchange.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let id = &request["id"];

        let response = match request["method"].as_str().unwrap_or_default() {
            "public/auth" => {
                exchange.auth_requests.fetch_add(1, Ordering::SeqCst);
                reply(
                    id,
                    json!({
                        "access_token": format!("access-{}", connection),
                        "refresh_token": format!("refresh-{}", connection),
                        "expires_in": 900,
                        "scope": "connection",
                        "token_type": "bearer"
                    }),
                )
            }
            "public/set_heartbeat" => reply(id, json!("ok")),
            "public/test" => reply(id, json!({"version": "1.2.26"})),
            "public/subscribe" | "private/subscribe" => {
                let channels = request["params"]["channels"].clone();
                if let Some(names) = channels.as_array() {
                    exchange
                        .subscribed
                        .lock()
                        .extend(names.iter().filter_map(|n| n.as_str().map(str::to_string)));
                }
                if sender.send(reply(id, channels)).await.is_err() {
                    return;
                }

                let mark_price = if connection == 1 { 42000.0 } else { 42100.0 };
                if sender.send(ticker_push(mark_price)).await.is_err() {
                    return;
                }
                if connection == 1 {
                    // Drop the first connection right after the first push
                    let _ = sender.send(Message::Close(None)).await;
                    return;
                }
                continue;
            }
            _ => continue,
        };

        if sender.send(response).await.is_err() {
            return;
        }
    }
}

async fn start_mock_exchange() -> (String, Arc<MockExchange>) {
    let exchange = Arc::new(MockExchange::default());
    let app = Router::new()
        .route("/ws/api/v2", get(ws_handler))
        .with_state(Arc::clone(&exchange));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}/ws/api/v2", addr), exchange)
}

fn test_config(ws_url: String) -> ConnectivityConfig {
    let mut config = ConnectivityConfig {
        credentials: Credentials::new("test-client", "test-secret"),
        ..ConnectivityConfig::default()
    };
    config.session.ws_url = ws_url;
    config.session.connect_timeout_ms = 2_000;
    config.session.watchdog_interval_ms = 100;
    config.session.subscription_cycle_ms = 50;
    config.session.subscription_batch_pause_ms = 10;
    config.session.test_interval_ms = 200;
    config
}

/// Read status events until `wanted` shows up
async fn wait_for_status<S>(feed: &mut S, wanted: fn(&SessionStatus) -> bool)
where
    S: Subscriber<SessionStatus>,
{
    timeout(WAIT, async {
        loop {
            let status = feed.next().await.expect("status feed closed");
            if wanted(&status) {
                return;
            }
        }
    })
    .await
    .expect("status not seen in time");
}

#[tokio::test]
async fn test_session_survives_server_disconnect() {
    let _ = env_logger::try_init();

    let (ws_url, exchange) = start_mock_exchange().await;
    let config = test_config(ws_url);
    let (events, mut feeds) = SessionEvents::channels(config.session.event_capacity);

    let session = DeribitSession::start(&config, events)
        .await
        .expect("session should start");
    session.subscribe_ticker("BTC-PERPETUAL");

    // === First connection ===
    wait_for_status(&mut feeds.status, |s| *s == SessionStatus::Connected).await;
    wait_for_status(&mut feeds.status, |s| *s == SessionStatus::Authenticated).await;

    let first = timeout(WAIT, feeds.ticker.next())
        .await
        .expect("no ticker in time")
        .unwrap();
    assert_eq!(first.instrument, "BTC-PERPETUAL");
    assert_eq!(first.mark_price, dec!(42000));
    assert_eq!(first.mid_price(), Some(dec!(42000)));

    // === Server drops the socket, watchdog reconnects ===
    wait_for_status(&mut feeds.status, |s| {
        matches!(s, SessionStatus::Disconnected { .. })
    })
    .await;
    wait_for_status(&mut feeds.status, |s| *s == SessionStatus::Reconnected).await;
    wait_for_status(&mut feeds.status, |s| *s == SessionStatus::Authenticated).await;

    let second = timeout(WAIT, feeds.ticker.next())
        .await
        .expect("no ticker after reconnect")
        .unwrap();
    assert_eq!(second.mark_price, dec!(42100));

    // The channel is acknowledged again, and registered once
    timeout(WAIT, async {
        while session
            .channels()
            .iter()
            .any(|c| c.state != ChannelState::Subscribed)
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("channel not resubscribed");

    let channels = session.channels();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, TICKER_CHANNEL);
    assert!(session.is_authenticated());
    assert_eq!(session.auth_token().unwrap().access_token, "access-2");

    assert_eq!(exchange.connections.load(Ordering::SeqCst), 2);
    assert_eq!(exchange.auth_requests.load(Ordering::SeqCst), 2);
    assert_eq!(
        exchange
            .subscribed
            .lock()
            .iter()
            .filter(|name| name.as_str() == TICKER_CHANNEL)
            .count(),
        2
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_unsubscribe_stops_tracking() {
    let _ = env_logger::try_init();

    let (ws_url, _exchange) = start_mock_exchange().await;
    let config = test_config(ws_url);
    let (events, mut feeds) = SessionEvents::channels(64);

    let session = DeribitSession::start(&config, events).await.unwrap();
    wait_for_status(&mut feeds.status, |s| *s == SessionStatus::Authenticated).await;

    session.subscribe_account();
    session.subscribe_index("btc_usd");
    let names: Vec<String> = session.channels().into_iter().map(|c| c.name).collect();
    assert_eq!(
        names,
        vec![
            "deribit_price_index.btc_usd",
            "user.orders.any.any.raw",
            "user.portfolio.btc",
            "user.trades.any.any.raw",
        ]
    );

    session
        .unsubscribe(&["deribit_price_index.btc_usd".to_string()])
        .unwrap();
    assert_eq!(session.channels().len(), 3);

    session.shutdown().await;
}
