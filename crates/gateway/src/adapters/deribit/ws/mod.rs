//! Deribit WebSocket session
//!
//! ```text
//!  socket ──reader──► frame queue ──► MessageDispatcher ──► SessionEvents
//!    ▲                                   │
//!    └──writer◄── Outbound ◄─────────────┴── SubscriptionDriver, timers
//! ```
//!
//! `ConnectionSupervisor` owns the socket and its watchdog. Every task shares
//! one `SessionContext`.

pub mod auth;
pub mod channel;
mod context;
pub mod dispatcher;
pub mod driver;
pub mod heartbeat;
pub mod outbound;
pub mod registry;
pub mod session;
pub mod state;
pub mod supervisor;

pub use auth::{AuthSession, AuthToken};
pub use channel::{ChannelName, ChannelTopic};
pub use registry::{Channel, ChannelRegistry, ChannelState};
pub use session::DeribitSession;
pub use state::ConnectionState;
