//! Typed event transport
//!
//! The session hands every parsed event to a `Publisher`; downstream
//! consumers (order management, strategies) read them through a `Subscriber`.
//! Only the tokio broadcast implementation exists today, the traits keep the
//! session independent of it.

pub mod channel;
pub mod config;

pub use config::Subjects;

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// Publisher - sends messages to a subject/channel
#[async_trait]
pub trait Publisher<M>: Send + Sync
where
    M: Serialize + Send + Sync,
{
    /// Publish a message
    async fn publish(&self, msg: &M) -> Result<(), TransportError>;

    /// Publish a message tagged with a logical subject
    async fn publish_to(&self, subject: &str, msg: &M) -> Result<(), TransportError> {
        // Channel transport has one queue per topic, the subject is informational
        let _ = subject;
        self.publish(msg).await
    }
}

/// Subscriber - receives messages from a subject pattern
#[async_trait]
pub trait Subscriber<M>: Send
where
    M: DeserializeOwned + Send,
{
    /// Wait for the next message
    async fn next(&mut self) -> Result<M, TransportError>;

    /// Try to receive without blocking (returns None if no message available)
    fn try_next(&mut self) -> Result<Option<M>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ensure traits are object-safe
    fn _assert_publisher_object_safe(_: &dyn Publisher<String>) {}
    fn _assert_subscriber_object_safe(_: &mut dyn Subscriber<String>) {}
}
