//! Reconciles desired subscriptions with what was sent.
//!
//! One polling loop covers first requests, resubscription after a reset and
//! subscribes whose ack never came back.

use super::channel::is_private_channel;
use super::context::SessionContext;
use super::registry::Channel;
use crate::error::SessionError;
use crate::messages::RpcRequest;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct SubscriptionDriver {
    ctx: Arc<SessionContext>,
}

impl SubscriptionDriver {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Send subscribe requests for every due channel. Returns the number of
    /// requests sent.
    pub async fn run_cycle(&self) -> usize {
        if !self.ctx.connection.is_authenticated() {
            return 0;
        }

        let config = &self.ctx.config;
        let due = self
            .ctx
            .registry
            .due(Instant::now(), config.subscribe_ack_timeout());
        if due.is_empty() {
            return 0;
        }

        let (account, market): (Vec<Channel>, Vec<Channel>) =
            due.into_iter().partition(Channel::is_account);
        let mut sent = 0;

        // Account streams are separate calls with fixed names
        for channel in &account {
            match self.send(true, std::slice::from_ref(&channel.name)) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("Subscribe for {} not sent: {}", channel.name, e);
                    return sent;
                }
            }
        }

        let (private, public): (Vec<String>, Vec<String>) = market
            .into_iter()
            .map(|channel| channel.name)
            .partition(|name| is_private_channel(name));

        let batches: Vec<(bool, &[String])> = private
            .chunks(config.max_channels_per_subscribe)
            .map(|batch| (true, batch))
            .chain(
                public
                    .chunks(config.max_channels_per_subscribe)
                    .map(|batch| (false, batch)),
            )
            .collect();

        for (i, (is_private, batch)) in batches.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(config.subscription_batch_pause()).await;
                if !self.ctx.connection.is_authenticated() {
                    debug!("Session lost mid-cycle, {} batches left", batches.len() - i);
                    break;
                }
            }
            match self.send(*is_private, batch) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("Subscribe batch of {} not sent: {}", batch.len(), e);
                    break;
                }
            }
        }
        sent
    }

    /// Channels are marked before the request is queued so an immediate ack
    /// finds them in flight. A request that is not sent is retried once the
    /// ack timeout passes, or after the next authentication.
    fn send(&self, private: bool, channels: &[String]) -> Result<(), SessionError> {
        self.ctx.registry.mark_subscribing(channels, Instant::now());
        self.ctx
            .outbound
            .send(&RpcRequest::subscribe(private, channels))?;
        info!("Subscribing to {} channels", channels.len());
        Ok(())
    }

    /// Run cycles until shutdown, waiting `subscription_cycle` after each one ends
    pub fn spawn(self) -> JoinHandle<()> {
        let mut shutdown = self.ctx.shutdown_signal();
        let pause = self.ctx.config.subscription_cycle();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.run_cycle() => {}
                    _ = shutdown.changed() => break,
                }
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Subscription driver stopped");
        })
    }
}
