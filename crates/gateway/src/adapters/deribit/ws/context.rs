//! State shared by every task of one session

use super::auth::AuthSession;
use super::heartbeat::HeartbeatMonitor;
use super::outbound::Outbound;
use super::registry::ChannelRegistry;
use super::state::{ConnectionState, ConnectionTracker};
use crate::adapters::deribit::events::{ErrorEvent, SessionEvents, SessionStatus};
use crate::config::{Credentials, SessionConfig};
use crate::error::SessionError;
use crate::messages::rpc::AuthResult;
use crate::transport::Subjects;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// A periodic task that is replaced, not duplicated, when re-armed
#[derive(Debug, Default)]
struct TimerSlot(Mutex<Option<JoinHandle<()>>>);

impl TimerSlot {
    fn arm(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.0.lock().replace(handle) {
            previous.abort();
        }
    }

    fn cancel(&self) {
        if let Some(handle) = self.0.lock().take() {
            handle.abort();
        }
    }
}

pub(crate) struct SessionContext {
    pub(crate) config: SessionConfig,
    pub(crate) registry: ChannelRegistry,
    pub(crate) outbound: Outbound,
    pub(crate) auth: AuthSession,
    pub(crate) heartbeat: HeartbeatMonitor,
    pub(crate) connection: ConnectionTracker,
    pub(crate) events: SessionEvents,
    shutdown: watch::Receiver<bool>,
    refresh_timer: TimerSlot,
    probe_timer: TimerSlot,
}

impl SessionContext {
    pub(crate) fn new(
        config: SessionConfig,
        credentials: Credentials,
        events: SessionEvents,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval_secs),
            config,
            registry: ChannelRegistry::new(),
            outbound: Outbound::new(),
            auth: AuthSession::new(credentials),
            connection: ConnectionTracker::new(),
            events,
            shutdown,
            refresh_timer: TimerSlot::default(),
            probe_timer: TimerSlot::default(),
        }
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) async fn publish_status(&self, status: SessionStatus) {
        if let Err(e) = self.events.status.publish_to(Subjects::STATUS, &status).await {
            debug!("Status {:?} not delivered: {}", status, e);
        }
    }

    pub(crate) async fn report_error(&self, channel: Option<&str>, message: impl Into<String>) {
        let event = ErrorEvent::new(channel, message);
        if let Err(e) = self.events.errors.publish_to(Subjects::ERRORS, &event).await {
            debug!("Error event not delivered: {}", e);
        }
    }

    /// Auth ack: store the token, queue every channel again and start the
    /// refresh and probe timers
    pub(crate) async fn on_authenticated(self: &Arc<Self>, result: AuthResult) {
        self.auth.store(result);
        self.connection.set(ConnectionState::Authenticated);
        self.registry.reset_all();
        info!(
            "Authenticated, {} channels queued for subscription",
            self.registry.len()
        );

        if let Err(e) = self.heartbeat.configure(&self.outbound) {
            warn!("Failed to send set_heartbeat: {}", e);
        }
        self.arm_timers();
        self.publish_status(SessionStatus::Authenticated).await;
    }

    /// Auth rejected: drop the socket so the watchdog starts over
    pub(crate) async fn on_auth_failed(&self, code: i64, message: String) {
        let err = SessionError::AuthenticationFailed { code, message };
        error!("{}", err);
        self.report_error(None, err.to_string()).await;
        self.drop_connection("authentication failed").await;
    }

    /// Socket `epoch` ended. Ignored if a newer socket already replaced it.
    pub(crate) async fn on_disconnected(&self, epoch: u64, reason: String) {
        if epoch != self.connection.epoch() {
            debug!("Ignoring close of superseded connection {}", epoch);
            return;
        }
        self.drop_connection(&reason).await;
    }

    pub(crate) async fn drop_connection(&self, reason: &str) {
        let previous = self.connection.swap(ConnectionState::Disconnected);
        self.auth.invalidate();
        self.outbound.detach();
        self.cancel_timers();

        if previous != ConnectionState::Disconnected {
            warn!("Disconnected: {}", reason);
            self.publish_status(SessionStatus::Disconnected {
                reason: reason.to_string(),
            })
            .await;
        }
    }

    fn arm_timers(self: &Arc<Self>) {
        let refresh = self.spawn_periodic(self.config.refresh_interval(), |ctx| {
            info!("Refreshing access token");
            ctx.auth.refresh(&ctx.outbound).map(|_| ())
        });
        self.refresh_timer.arm(refresh);

        let probe = self.spawn_periodic(self.config.test_interval(), |ctx| {
            ctx.heartbeat.probe(&ctx.outbound)
        });
        self.probe_timer.arm(probe);
    }

    pub(crate) fn cancel_timers(&self) {
        self.refresh_timer.cancel();
        self.probe_timer.cancel();
    }

    /// Run `action` every `period`, first run one period from now
    fn spawn_periodic<F>(self: &Arc<Self>, period: Duration, action: F) -> JoinHandle<()>
    where
        F: Fn(&SessionContext) -> Result<(), SessionError> + Send + 'static,
    {
        let ctx = Arc::clone(self);
        let mut shutdown = self.shutdown_signal();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = action(ctx.as_ref()) {
                            debug!("Timer action skipped: {}", e);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::deribit::events::SessionFeeds;
    use crate::adapters::deribit::ws::registry::ChannelState;
    use crate::transport::Subscriber;
    use tokio::sync::mpsc;

    /// Context with an attached in-memory socket, returning the frames it sends
    pub(crate) fn test_context() -> (
        Arc<SessionContext>,
        mpsc::UnboundedReceiver<String>,
        SessionFeeds,
        watch::Sender<bool>,
    ) {
        let (events, feeds) = SessionEvents::channels(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(SessionContext::new(
            SessionConfig::default(),
            Credentials::new("client", "secret"),
            events,
            shutdown_rx,
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        ctx.outbound.attach(tx);
        ctx.connection.set(ConnectionState::Connected);
        (ctx, rx, feeds, shutdown_tx)
    }

    pub(crate) fn auth_result() -> AuthResult {
        AuthResult {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 900,
            scope: String::new(),
            token_type: "bearer".to_string(),
        }
    }

    pub(crate) fn sent_methods(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut methods = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            methods.push(value["method"].as_str().unwrap_or_default().to_string());
        }
        methods
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_resets_and_arms_timers() {
        let (ctx, mut rx, mut feeds, _shutdown) = test_context();
        ctx.registry.upsert("ticker.BTC-PERPETUAL.100ms", "BTC-PERPETUAL");
        ctx.registry.mark_subscribing(
            &["ticker.BTC-PERPETUAL.100ms".to_string()],
            Instant::now(),
        );

        ctx.on_authenticated(auth_result()).await;

        assert!(ctx.connection.is_authenticated());
        assert_eq!(
            ctx.registry.state("ticker.BTC-PERPETUAL.100ms"),
            Some(ChannelState::Reset)
        );
        assert_eq!(sent_methods(&mut rx), vec!["public/set_heartbeat"]);
        assert_eq!(feeds.status.next().await.unwrap(), SessionStatus::Authenticated);

        // Probe every 2s, refresh every 5 minutes
        tokio::time::sleep(Duration::from_millis(4_100)).await;
        assert_eq!(sent_methods(&mut rx), vec!["public/test", "public/test"]);

        tokio::time::sleep(Duration::from_secs(300)).await;
        let methods = sent_methods(&mut rx);
        assert!(methods.contains(&"public/auth".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_drops_connection() {
        let (ctx, mut rx, mut feeds, _shutdown) = test_context();

        ctx.on_auth_failed(13004, "invalid_credentials".to_string()).await;

        assert_eq!(ctx.connection.get(), ConnectionState::Disconnected);
        assert!(!ctx.outbound.is_attached());
        assert!(feeds.errors.next().await.unwrap().message.contains("13004"));
        assert!(matches!(
            feeds.status.next().await.unwrap(),
            SessionStatus::Disconnected { .. }
        ));
        assert!(sent_methods(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_stale_epoch_ignored() {
        let (ctx, _rx, _feeds, _shutdown) = test_context();
        ctx.connection.next_epoch();
        ctx.connection.next_epoch();

        ctx.on_disconnected(1, "old socket".to_string()).await;
        assert_eq!(ctx.connection.get(), ConnectionState::Connected);

        ctx.on_disconnected(2, "current socket".to_string()).await;
        assert_eq!(ctx.connection.get(), ConnectionState::Disconnected);
    }
}
