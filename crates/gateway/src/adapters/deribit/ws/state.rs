use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Connection lifecycle. Only `Authenticated` permits subscription traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    /// Socket open, auth pending
    Connected = 2,
    Authenticated = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Authenticated,
            _ => Self::Disconnected,
        }
    }
}

/// Shared view of the current connection
#[derive(Debug)]
pub struct ConnectionTracker {
    state: AtomicU8,
    last_frame: Mutex<Instant>,
    /// Bumped on every new socket so late events from an old one are ignored
    epoch: AtomicU64,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            last_frame: Mutex::new(Instant::now()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Set a new state, returning the previous one
    pub fn swap(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.state.swap(state as u8, Ordering::AcqRel))
    }

    pub fn is_authenticated(&self) -> bool {
        self.get() == ConnectionState::Authenticated
    }

    /// Record an inbound frame
    pub fn touch(&self) {
        *self.last_frame.lock() = Instant::now();
    }

    /// Time since the last inbound frame
    pub fn idle_for(&self) -> Duration {
        self.last_frame.lock().elapsed()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Start a new connection epoch and return it
    pub fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }
}
