//! Error types for the gateway crate

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the typed event fan-out
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Subscriber lagged, {0} messages dropped")]
    Lagged(u64),
}

/// WebSocket session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection not open after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Authentication failed: {code} - {message}")]
    AuthenticationFailed { code: i64, message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Client credentials are not configured")]
    MissingCredentials,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// REST client errors
#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {code} - {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Gateway-level errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
