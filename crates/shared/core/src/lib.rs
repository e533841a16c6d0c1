//! Kestrel Core Domain
//!
//! Pure domain types shared by the connectivity layer and its consumers.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{OrderKind, OrderState, Side, TimeInForce};
pub use values::{MARKET_PRICE_SENTINEL, OrderPrice, Price, Quantity, Timestamp, timestamp_from_millis};
