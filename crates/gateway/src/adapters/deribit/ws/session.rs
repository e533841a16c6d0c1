//! Session facade wiring every WebSocket component together

use super::auth::AuthToken;
use super::channel::{ChannelName, is_private_channel};
use super::context::SessionContext;
use super::dispatcher::MessageDispatcher;
use super::driver::SubscriptionDriver;
use super::registry::Channel;
use super::state::ConnectionState;
use super::supervisor::ConnectionSupervisor;
use crate::adapters::deribit::events::SessionEvents;
use crate::config::ConnectivityConfig;
use crate::error::SessionError;
use crate::messages::RpcRequest;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Update interval requested for market data channels
const MARKET_DATA_INTERVAL: &str = "100ms";

/// An authenticated, self-healing Deribit WebSocket session.
///
/// Callers declare the channels they want; the session keeps them subscribed
/// across reconnects and publishes every push on `events`.
pub struct DeribitSession {
    ctx: Arc<SessionContext>,
    supervisor: Arc<ConnectionSupervisor>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl DeribitSession {
    /// Connect, authenticate and start the background tasks.
    ///
    /// Fails on an invalid config or if the first connect does not succeed;
    /// later losses are repaired by the watchdog.
    pub async fn start(
        config: &ConnectivityConfig,
        events: SessionEvents,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        if config.credentials.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(SessionContext::new(
            config.session.clone(),
            config.credentials.clone(),
            events,
            shutdown_rx,
        ));

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let dispatcher = MessageDispatcher::new(Arc::clone(&ctx)).spawn(frames_rx);
        let supervisor = Arc::new(ConnectionSupervisor::new(Arc::clone(&ctx), frames_tx));

        if let Err(e) = supervisor.connect().await {
            let _ = shutdown_tx.send(true);
            if let Err(join) = dispatcher.await {
                debug!("Dispatcher ended abnormally: {}", join);
            }
            return Err(e);
        }

        let watchdog = supervisor.spawn_watchdog();
        let driver = SubscriptionDriver::new(Arc::clone(&ctx)).spawn();
        info!("Session started against {}", ctx.config.ws_url);

        Ok(Self {
            ctx,
            supervisor,
            shutdown_tx,
            tasks: vec![dispatcher, watchdog, driver],
        })
    }

    pub fn status(&self) -> ConnectionState {
        self.ctx.connection.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.ctx.connection.is_authenticated()
    }

    /// Current token, if authenticated
    pub fn auth_token(&self) -> Option<Arc<AuthToken>> {
        self.ctx.auth.current()
    }

    /// Desired channels and their state
    pub fn channels(&self) -> Vec<Channel> {
        self.ctx.registry.snapshot()
    }

    /// Declare a channel. An existing channel is forced to resubscribe.
    /// Account channels pass an empty `symbol`.
    pub fn subscribe(&self, name: &str, symbol: &str) {
        debug!("Channel {} requested", name);
        self.ctx.registry.upsert(name, symbol);
    }

    pub fn subscribe_book(&self, instrument: &str, depth: u32) {
        self.subscribe(
            &ChannelName::book(instrument, "none", depth, MARKET_DATA_INTERVAL),
            instrument,
        );
    }

    pub fn subscribe_trades(&self, instrument: &str) {
        self.subscribe(&ChannelName::trades(instrument, MARKET_DATA_INTERVAL), instrument);
    }

    pub fn subscribe_ticker(&self, instrument: &str) {
        self.subscribe(&ChannelName::ticker(instrument, MARKET_DATA_INTERVAL), instrument);
    }

    /// Index price, e.g. `btc_usd`
    pub fn subscribe_index(&self, index_name: &str) {
        self.subscribe(&ChannelName::index(index_name), index_name);
    }

    /// Order, fill and portfolio streams for the configured currencies
    pub fn subscribe_account(&self) {
        self.subscribe(&ChannelName::user_orders(), "");
        self.subscribe(&ChannelName::user_trades(), "");
        for currency in &self.ctx.config.portfolio_currencies {
            self.subscribe(&ChannelName::user_portfolio(currency), "");
        }
    }

    /// Stop following channels. They are dropped from the registry at once;
    /// the unsubscribe request is best effort while disconnected.
    pub fn unsubscribe(&self, names: &[String]) -> Result<(), SessionError> {
        let removed = self.ctx.registry.remove(names);
        if removed.is_empty() {
            return Ok(());
        }

        let (private, public): (Vec<String>, Vec<String>) = removed
            .into_iter()
            .partition(|name| is_private_channel(name));

        for (is_private, batch) in [(true, private), (false, public)] {
            if batch.is_empty() {
                continue;
            }
            match self.ctx.outbound.send(&RpcRequest::unsubscribe(is_private, &batch)) {
                Ok(()) => info!("Unsubscribing from {} channels", batch.len()),
                Err(SessionError::NotConnected) => {
                    debug!("Not connected, {} channels dropped locally", batch.len())
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Stop every background task, close the socket and wait for the tasks
    pub async fn shutdown(self) {
        info!("Shutting down session");
        let _ = self.shutdown_tx.send(true);
        self.supervisor.close().await;
        self.ctx.cancel_timers();

        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Session task failed: {}", e);
            }
        }
        info!("Session stopped");
    }
}
