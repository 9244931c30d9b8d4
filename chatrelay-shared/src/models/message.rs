use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::Session;

/// The sender identity stamped on every relayed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatUser {
    /// Identity ID from the authenticated session.
    pub id: String,
    /// Email from the authenticated session.
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Inbound WebSocket frame on the ingestion endpoint.
///
/// `pending_id` is chosen by the client and opaque to the server; it is
/// echoed unchanged through the pipeline so the client can reconcile its
/// optimistic render with the durable confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendFrame {
    pub pending_id: String,
    pub msg: String,
}

/// Event published to the durable log for every accepted submission.
///
/// Immutable once created; it is superseded, not mutated, by the
/// [`StoredMessage`] the history writer derives from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub pending_id: String,
    pub room_id: String,
    pub msg: String,
    pub user: ChatUser,
    pub created_at: DateTime<Utc>,
}

impl MessageEnvelope {
    /// Builds an envelope for a submission, stamping the sender from the
    /// connection's session and `created_at` from the wall clock at receipt.
    pub fn new(frame: SendFrame, room_id: impl Into<String>, session: &Session) -> Self {
        Self {
            pending_id: frame.pending_id,
            room_id: room_id.into(),
            msg: frame.msg,
            user: ChatUser {
                id: session.identity_id.clone(),
                email: session.email.clone(),
                first_name: session.first_name.clone(),
                last_name: session.last_name.clone(),
            },
            created_at: Utc::now(),
        }
    }

    /// Checks the fields the history writer requires before persisting.
    ///
    /// # Errors
    /// Returns a description of the first missing or empty required field.
    pub fn validate(&self) -> Result<(), String> {
        if self.room_id.is_empty() {
            return Err("room id is empty".into());
        }
        if self.msg.is_empty() {
            return Err("msg is empty".into());
        }
        if self.created_at.timestamp_millis() == 0 {
            return Err("created at is zero".into());
        }
        if self.user.id.is_empty() {
            return Err("user id is empty".into());
        }
        if self.user.email.is_empty() {
            return Err("user email is empty".into());
        }
        Ok(())
    }
}

/// Envelope plus the server-assigned message ID.
///
/// `msg_id` is a UUIDv7: globally unique, monotonically increasing with
/// time, and the descending sort key in the history store. It is assigned
/// exactly once, by the history writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    #[serde(rename = "msg_id")]
    pub message_id: Uuid,
    #[serde(flatten)]
    pub envelope: MessageEnvelope,
}

impl StoredMessage {
    pub fn new(message_id: Uuid, envelope: MessageEnvelope) -> Self {
        Self {
            message_id,
            envelope,
        }
    }
}

/// One page of history, ascending chronological order within the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub page: Vec<StoredMessage>,
    /// Opaque continuation token; empty when there is no further history.
    pub next_page_token: String,
}
