//! Socket ownership: connect, read/write pumps and the watchdog

use super::context::SessionContext;
use super::state::ConnectionState;
use crate::adapters::deribit::events::SessionStatus;
use crate::error::SessionError;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// How long the writer may take to flush and send the close frame
const CLOSE_GRACE: Duration = Duration::from_secs(1);

struct SocketTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Keeps one logical connection open.
///
/// Inbound text frames from every socket go to the same queue, so the
/// dispatcher sees them in receive order across reconnects.
pub struct ConnectionSupervisor {
    ctx: Arc<SessionContext>,
    frames: mpsc::UnboundedSender<String>,
    reconnect_lock: tokio::sync::Mutex<()>,
    socket: Mutex<Option<SocketTasks>>,
    connects: AtomicU64,
}

impl ConnectionSupervisor {
    pub(crate) fn new(ctx: Arc<SessionContext>, frames: mpsc::UnboundedSender<String>) -> Self {
        Self {
            ctx,
            frames,
            reconnect_lock: tokio::sync::Mutex::new(()),
            socket: Mutex::new(None),
            connects: AtomicU64::new(0),
        }
    }

    /// Open the socket and send the auth grant. Fails if the handshake does
    /// not finish within `connect_timeout`.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let _guard = self.reconnect_lock.lock().await;
        self.open().await
    }

    /// Reopen the connection unless it is healthy or the session is shutting
    /// down. Returns whether a new socket was opened.
    pub async fn reconnect(&self) -> Result<bool, SessionError> {
        let _guard = self.reconnect_lock.lock().await;
        if self.ctx.is_shutting_down() {
            debug!("Shutting down, not reconnecting");
            return Ok(false);
        }
        let Some(issue) = self.health_issue() else {
            return Ok(false);
        };
        warn!("Reconnecting: {}", issue);
        self.teardown(&issue).await;
        self.open().await?;
        Ok(true)
    }

    /// Close the current socket, if any
    pub async fn close(&self) {
        let _guard = self.reconnect_lock.lock().await;
        self.teardown("closed locally").await;
    }

    pub fn is_healthy(&self) -> bool {
        self.health_issue().is_none()
    }

    fn health_issue(&self) -> Option<String> {
        let ctx = &self.ctx;
        match ctx.connection.get() {
            ConnectionState::Disconnected => return Some("not connected".to_string()),
            ConnectionState::Connecting => return Some("connect did not finish".to_string()),
            ConnectionState::Connected | ConnectionState::Authenticated => {}
        }
        if !ctx.outbound.is_attached() {
            return Some("socket writer closed".to_string());
        }
        let idle = ctx.connection.idle_for();
        if idle > ctx.config.stale_after() {
            return Some(format!("no inbound frame for {:?}", idle));
        }
        None
    }

    async fn open(&self) -> Result<(), SessionError> {
        let ctx = &self.ctx;
        let url = ctx.config.ws_url.as_str();
        let limit = ctx.config.connect_timeout();

        ctx.connection.set(ConnectionState::Connecting);
        info!("Connecting to {}", url);
        let stream = match timeout(limit, connect_async(url)).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                ctx.connection.set(ConnectionState::Disconnected);
                error!("Connect to {} failed: {}", url, e);
                return Err(e.into());
            }
            Err(_) => {
                ctx.connection.set(ConnectionState::Disconnected);
                error!("Connect to {} timed out after {:?}", url, limit);
                return Err(SessionError::ConnectTimeout(limit));
            }
        };

        let epoch = ctx.connection.next_epoch();
        let (sink, source) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        ctx.outbound.attach(tx);
        ctx.connection.touch();
        ctx.connection.set(ConnectionState::Connected);

        let tasks = SocketTasks {
            writer: tokio::spawn(write_loop(sink, rx)),
            reader: tokio::spawn(read_loop(source, self.frames.clone(), Arc::clone(ctx), epoch)),
        };
        if let Some(stale) = self.socket.lock().replace(tasks) {
            stale.reader.abort();
            stale.writer.abort();
        }

        let status = if self.connects.fetch_add(1, Ordering::AcqRel) == 0 {
            SessionStatus::Connected
        } else {
            SessionStatus::Reconnected
        };
        info!("Connected to {} (connection {})", url, epoch);
        ctx.publish_status(status).await;

        ctx.auth.authenticate(&ctx.outbound)
    }

    async fn teardown(&self, reason: &str) {
        let tasks = self.socket.lock().take();
        // Detaches the writer queue, the writer then sends the close frame
        self.ctx.drop_connection(reason).await;

        if let Some(tasks) = tasks {
            tasks.reader.abort();
            let writer = tasks.writer.abort_handle();
            if timeout(CLOSE_GRACE, tasks.writer).await.is_err() {
                debug!("Socket writer did not finish, aborting");
                writer.abort();
            }
        }
    }

    /// Check health every `watchdog_interval` and reconnect when needed.
    /// A failed reconnect is retried on the next tick.
    pub fn spawn_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let mut shutdown = self.ctx.shutdown_signal();
        let period = self.ctx.config.watchdog_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if supervisor.is_healthy() {
                            continue;
                        }
                        match supervisor.reconnect().await {
                            Ok(true) => info!("Reconnected"),
                            Ok(false) => {}
                            Err(e) => error!("Reconnect failed: {}", e),
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Watchdog stopped");
        })
    }
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<String>)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(text) = rx.recv().await {
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            warn!("Socket write failed: {}", e);
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!("Socket close failed: {}", e);
    }
}

async fn read_loop<St>(
    mut source: St,
    frames: mpsc::UnboundedSender<String>,
    ctx: Arc<SessionContext>,
    epoch: u64,
) where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let reason = loop {
        match source.next().await {
            Some(Ok(message)) => {
                ctx.connection.touch();
                match message {
                    Message::Text(text) => {
                        if frames.send(text.as_str().to_owned()).is_err() {
                            break "dispatcher stopped".to_string();
                        }
                    }
                    Message::Close(Some(frame)) => {
                        break format!(
                            "closed by server ({}: {})",
                            u16::from(frame.code),
                            frame.reason.as_str()
                        );
                    }
                    Message::Close(None) => break "closed by server".to_string(),
                    other => trace!("Ignoring {:?} frame", other),
                }
            }
            Some(Err(e)) => break format!("read failed: {}", e),
            None => break "stream ended".to_string(),
        }
    };
    ctx.on_disconnected(epoch, reason).await;
}
