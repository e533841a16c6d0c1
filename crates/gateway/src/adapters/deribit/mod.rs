//! Deribit connectivity
//!
//! `ws` keeps an authenticated streaming session alive and publishes every
//! push as a typed event; `rest` covers request/response calls.

pub mod events;
pub mod rest;
pub mod ws;

pub use events::{ErrorEvent, SessionEvents, SessionFeeds, SessionStatus};
pub use rest::{RateLimiter, RestClient};
pub use ws::DeribitSession;
