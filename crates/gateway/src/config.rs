//! Connectivity configuration
//!
//! Loaded from JSON. Every timing knob has a default, so a file holding only
//! credentials is a valid config.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound the venue accepts for channels in one subscribe call
pub const MAX_CHANNELS_PER_SUBSCRIBE: usize = 100;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub rest: RestConfig,

    /// Instruments whose market data the runner subscribes to
    #[serde(default)]
    pub instruments: Vec<String>,
}

/// API key pair, used for the WebSocket grant and REST basic auth
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_empty() || self.client_secret.is_empty()
    }
}

// Keeps the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// WebSocket session timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    /// Silence longer than this marks the connection stale
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Interval requested from the server via `public/set_heartbeat`
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Period of the local `public/test` probe
    #[serde(default = "default_test_interval_ms")]
    pub test_interval_ms: u64,

    #[serde(default = "default_subscription_cycle_ms")]
    pub subscription_cycle_ms: u64,

    #[serde(default = "default_subscription_batch_pause_ms")]
    pub subscription_batch_pause_ms: u64,

    /// A subscribe without an ack for this long is sent again
    #[serde(default = "default_subscribe_ack_timeout_ms")]
    pub subscribe_ack_timeout_ms: u64,

    #[serde(default = "default_max_channels_per_subscribe")]
    pub max_channels_per_subscribe: usize,

    /// Currencies whose `user.portfolio` channel is subscribed
    #[serde(default = "default_portfolio_currencies")]
    pub portfolio_currencies: Vec<String>,

    /// Capacity of each event topic
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_ws_url() -> String {
    "wss://www.deribit.com/ws/api/v2".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_watchdog_interval_ms() -> u64 {
    5_000
}

fn default_stale_after_ms() -> u64 {
    120_000
}

fn default_refresh_interval_ms() -> u64 {
    300_000
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_test_interval_ms() -> u64 {
    2_000
}

fn default_subscription_cycle_ms() -> u64 {
    3_000
}

fn default_subscription_batch_pause_ms() -> u64 {
    1_000
}

fn default_subscribe_ack_timeout_ms() -> u64 {
    10_000
}

fn default_max_channels_per_subscribe() -> usize {
    MAX_CHANNELS_PER_SUBSCRIBE
}

fn default_portfolio_currencies() -> Vec<String> {
    vec!["BTC".to_string()]
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            test_interval_ms: default_test_interval_ms(),
            subscription_cycle_ms: default_subscription_cycle_ms(),
            subscription_batch_pause_ms: default_subscription_batch_pause_ms(),
            subscribe_ack_timeout_ms: default_subscribe_ack_timeout_ms(),
            max_channels_per_subscribe: default_max_channels_per_subscribe(),
            portfolio_currencies: default_portfolio_currencies(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn test_interval(&self) -> Duration {
        Duration::from_millis(self.test_interval_ms)
    }

    pub fn subscription_cycle(&self) -> Duration {
        Duration::from_millis(self.subscription_cycle_ms)
    }

    pub fn subscription_batch_pause(&self) -> Duration {
        Duration::from_millis(self.subscription_batch_pause_ms)
    }

    pub fn subscribe_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_ack_timeout_ms)
    }
}

/// REST client limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Retries after an HTTP 429 before giving up
    #[serde(default = "default_max_429_retries")]
    pub max_429_retries: u32,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_rest_url() -> String {
    "https://www.deribit.com".to_string()
}

fn default_requests_per_second() -> u32 {
    20
}

fn default_max_429_retries() -> u32 {
    10
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            requests_per_second: default_requests_per_second(),
            max_429_retries: default_max_429_retries(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl RestConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ConnectivityConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall a loop or break the venue's limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = &self.session;
        let intervals = [
            ("connect_timeout_ms", session.connect_timeout_ms),
            ("watchdog_interval_ms", session.watchdog_interval_ms),
            ("stale_after_ms", session.stale_after_ms),
            ("refresh_interval_ms", session.refresh_interval_ms),
            ("heartbeat_interval_secs", session.heartbeat_interval_secs),
            ("test_interval_ms", session.test_interval_ms),
            ("subscription_cycle_ms", session.subscription_cycle_ms),
            ("subscribe_ack_timeout_ms", session.subscribe_ack_timeout_ms),
            ("request_timeout_ms", self.rest.request_timeout_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }

        if session.max_channels_per_subscribe == 0
            || session.max_channels_per_subscribe > MAX_CHANNELS_PER_SUBSCRIBE
        {
            return Err(ConfigError::Invalid(format!(
                "max_channels_per_subscribe must be within 1..={}",
                MAX_CHANNELS_PER_SUBSCRIBE
            )));
        }
        if session.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".into()));
        }
        if self.rest.requests_per_second == 0 {
            return Err(ConfigError::Invalid(
                "requests_per_second must be positive".into(),
            ));
        }
        Ok(())
    }
}
