//! Desired subscriptions and their per-channel state
//!
//! Read and written by the subscription driver and the dispatcher. Every
//! operation takes the single lock once, so a batch of names always moves
//! between states together.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Needs a subscribe request
    Reset,
    /// Request sent, ack pending
    Subscribing,
    /// Acknowledged by the venue
    Subscribed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    /// Empty for account channels
    pub symbol: String,
    pub state: ChannelState,
    pub last_sent_at: Option<Instant>,
}

impl Channel {
    fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            state: ChannelState::Reset,
            last_sent_at: None,
        }
    }

    /// Account channels are subscribed one per request
    pub fn is_account(&self) -> bool {
        self.symbol.is_empty()
    }

    /// Reset, or subscribing with no ack for longer than `ack_timeout`
    pub fn is_due(&self, now: Instant, ack_timeout: Duration) -> bool {
        match self.state {
            ChannelState::Reset => true,
            ChannelState::Subscribing => self
                .last_sent_at
                .is_none_or(|sent| now.saturating_duration_since(sent) > ack_timeout),
            ChannelState::Subscribed => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel in `Reset`, or force an existing one back to `Reset`
    pub fn upsert(&self, name: &str, symbol: &str) {
        let mut channels = self.channels.lock();
        channels
            .entry(name.to_string())
            .and_modify(|channel| {
                channel.state = ChannelState::Reset;
                channel.symbol = symbol.to_string();
            })
            .or_insert_with(|| Channel::new(name, symbol));
    }

    /// Record that a request carrying `names` went out at `now`.
    ///
    /// Channels already acknowledged are left alone.
    pub fn mark_subscribing(&self, names: &[String], now: Instant) {
        let mut channels = self.channels.lock();
        for name in names {
            if let Some(channel) = channels.get_mut(name)
                && channel.state != ChannelState::Subscribed
            {
                channel.state = ChannelState::Subscribing;
                channel.last_sent_at = Some(now);
            }
        }
    }

    /// Apply a subscribe ack. Returns how many channels moved to `Subscribed`.
    ///
    /// Only channels with a request in flight move; an ack that arrives after
    /// a reset belongs to the previous connection.
    pub fn mark_subscribed(&self, names: &[String]) -> usize {
        let mut channels = self.channels.lock();
        let mut moved = 0;
        for name in names {
            if let Some(channel) = channels.get_mut(name)
                && channel.state == ChannelState::Subscribing
            {
                channel.state = ChannelState::Subscribed;
                moved += 1;
            }
        }
        moved
    }

    /// Force every channel back to `Reset`
    pub fn reset_all(&self) {
        let mut channels = self.channels.lock();
        for channel in channels.values_mut() {
            channel.state = ChannelState::Reset;
            channel.last_sent_at = None;
        }
    }

    /// Forget channels. Returns the names that were present.
    pub fn remove(&self, names: &[String]) -> Vec<String> {
        let mut channels = self.channels.lock();
        names
            .iter()
            .filter(|name| channels.remove(name.as_str()).is_some())
            .cloned()
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<ChannelState> {
        self.channels.lock().get(name).map(|channel| channel.state)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Copies of all channels, sorted by name
    pub fn snapshot(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.lock().values().cloned().collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    /// Channels that need a subscribe request, sorted by name
    pub fn due(&self, now: Instant, ack_timeout: Duration) -> Vec<Channel> {
        let mut due: Vec<Channel> = self
            .channels
            .lock()
            .values()
            .filter(|channel| channel.is_due(now, ack_timeout))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.name.cmp(&b.name));
        due
    }
}
