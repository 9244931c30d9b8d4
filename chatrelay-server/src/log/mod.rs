//! The durable-log contract the pipeline is built against.
//!
//! The log is an append-only, multi-consumer-group stream: publishing puts an
//! opaque payload on a topic; each named consumer group reads the topic at
//! its own position and acknowledges messages individually. Two groups on
//! the same topic never interfere, which is what lets the live fan-out and
//! the history writer consume the same stream independently.
//!
//! Delivery is at-least-once per group: a [`LogMessage`] dropped without
//! [`LogMessage::ack`] counts as a negative acknowledgment and is
//! redelivered.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod memory;

/// Topic carrying accepted message envelopes.
pub const MSG_SENT_TOPIC: &str = "msg_sent";
/// Topic carrying stored-message confirmations.
pub const MSG_STORED_TOPIC: &str = "msg_stored";

/// Consumer group feeding connected live viewers.
pub const LIVE_GROUP: &str = "live";
/// Consumer group feeding the history writer.
pub const HISTORY_GROUP: &str = "history";

/// Errors surfaced by the log client.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },
    #[error("failed subscribe {topic} as {group}: {reason}")]
    Subscribe {
        topic: String,
        group: String,
        reason: String,
    },
}

/// Per-delivery acknowledgment hook owned by a [`LogMessage`].
pub trait AckToken: Send {
    /// Marks the delivery as processed for its consumer group.
    fn ack(&mut self);
    /// Returns the delivery to its group for redelivery.
    fn nack(&mut self);
}

/// One delivered message: an opaque payload plus its acknowledgment state.
///
/// Dropping the message without calling [`LogMessage::ack`] nacks it, so a
/// handler that bails out on a transient failure gets the message again.
pub struct LogMessage {
    payload: Vec<u8>,
    acked: bool,
    token: Box<dyn AckToken>,
}

impl LogMessage {
    pub fn new(payload: Vec<u8>, token: Box<dyn AckToken>) -> Self {
        Self {
            payload,
            acked: false,
            token,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledges the delivery for this consumer group.
    pub fn ack(mut self) {
        self.acked = true;
        self.token.ack();
    }
}

impl Drop for LogMessage {
    fn drop(&mut self) {
        if !self.acked {
            self.token.nack();
        }
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessage")
            .field("payload_len", &self.payload.len())
            .field("acked", &self.acked)
            .finish()
    }
}

/// The ordered channel of messages a consumer group receives.
#[async_trait]
pub trait LogStream: Send {
    /// Receives the next message, or `None` once the log is closed.
    async fn recv(&mut self) -> Option<LogMessage>;
}

pub type Subscription = Box<dyn LogStream>;

/// Client handle to the durable log, safe for concurrent use.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an opaque payload to a topic.
    ///
    /// # Errors
    /// Returns [`LogError::Publish`] when the append cannot be accepted.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), LogError>;

    /// Joins a consumer group on a topic, creating the group at the current
    /// end of the stream if it does not exist yet.
    ///
    /// # Errors
    /// Returns [`LogError::Subscribe`] when the group cannot be joined.
    async fn subscribe(&self, group: &str, topic: &str) -> Result<Subscription, LogError>;
}
