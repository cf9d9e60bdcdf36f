//! The [`Broker`] contract every backend (in-memory, Redis Streams)
//! implements.

use async_trait::async_trait;
use modkit_errors::ErrorValue;

/// Opaque identifier for a produced message, scoped to the topic it was
/// produced on. Backends are free to choose their own format (Redis
/// Streams uses `"<millis>-<seq>"`, the in-memory backend a monotonic
/// counter).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message delivered to a consumer group, with the number of times it
/// has been delivered so callers can apply their own poison-message
/// policy.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub payload: Vec<u8>,
    pub delivery_count: u32,
}

/// A message broker topic abstraction over competing-consumer groups.
///
/// Every backend guarantees at-least-once delivery within a group: a
/// message stays pending until [`Broker::ack`] is called for its id, and
/// an unacknowledged message becomes eligible for redelivery to another
/// consumer in the same group after the backend's processing timeout
/// elapses.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Appends `payload` to `topic`, returning the id assigned to it.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] tagged with [`crate::error::ERR_PRODUCE_FAILED`]
    /// if the backend rejects the write.
    async fn produce(&self, topic: &str, payload: &[u8]) -> Result<MessageId, ErrorValue>;

    /// Delivers up to `max_messages` pending messages from `topic` to
    /// `consumer` within `group`, creating the group on first use if it
    /// doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] tagged with [`crate::error::ERR_CONSUME_FAILED`]
    /// if the backend cannot read from the topic.
    async fn consume(&self, topic: &str, group: &str, consumer: &str, max_messages: usize) -> Result<Vec<Message>, ErrorValue>;

    /// Acknowledges `id` on `topic` for `group`, removing it from the
    /// group's pending set.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] tagged with [`crate::error::ERR_ACK_FAILED`]
    /// if the backend cannot record the acknowledgement.
    async fn ack(&self, topic: &str, group: &str, id: &MessageId) -> Result<(), ErrorValue>;

    /// Releases any resources held by the broker (connections, background
    /// tasks). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorValue`] if the backend fails to shut down cleanly.
    async fn close(&self) -> Result<(), ErrorValue>;
}
