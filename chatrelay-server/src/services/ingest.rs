//! Message ingestion: one loop per sender connection.
//!
//! Each accepted frame becomes one immutable [`MessageEnvelope`] published to
//! the `msg_sent` topic. "Sent" means accepted for publish; no per-frame
//! response goes back over the wire.

use axum::extract::ws::{Message, WebSocket};
use shared::{ChatError, MessageEnvelope, SendFrame, Session};
use std::sync::Arc;
use tracing::{debug, error};

use crate::log::{EventLog, MSG_SENT_TOPIC};

/// Ingestion state for one sender connection, bound to one authenticated
/// identity and one room.
pub struct MessageIngest {
    log: Arc<dyn EventLog>,
    room_id: String,
    session: Session,
}

impl MessageIngest {
    pub fn new(log: Arc<dyn EventLog>, room_id: String, session: Session) -> Self {
        Self {
            log,
            room_id,
            session,
        }
    }

    /// Validates one frame and publishes its envelope.
    ///
    /// # Errors
    /// [`ChatError::InvalidInput`] for empty text (the connection should
    /// continue), [`ChatError::TransientLog`] when the publish fails (the
    /// connection should close).
    pub async fn publish(&self, frame: SendFrame) -> Result<MessageEnvelope, ChatError> {
        if frame.msg.trim().is_empty() {
            return Err(ChatError::InvalidInput("msg is empty".into()));
        }
        let envelope = MessageEnvelope::new(frame, self.room_id.clone(), &self.session);
        let payload = serde_json::to_vec(&envelope)
            .map_err(|err| ChatError::InvalidInput(format!("failed encode evt: {err}")))?;
        self.log
            .publish(MSG_SENT_TOPIC, payload)
            .await
            .map_err(|err| ChatError::TransientLog(err.to_string()))?;
        Ok(envelope)
    }

    /// Drives the connection until the client closes, a frame fails to
    /// decode, or a publish fails.
    pub async fn run(self, mut socket: WebSocket) {
        while let Some(frame) = socket.recv().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return,
                Ok(_) => continue,
                Err(err) => {
                    debug!(error = %err, "failed receive ws evt");
                    return;
                }
            };

            let frame: SendFrame = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(error = %err, "failed decode ws evt");
                    return;
                }
            };

            debug!(room_id = %self.room_id, pending_id = %frame.pending_id, "received ws evt");
            match self.publish(frame).await {
                Ok(_) => {}
                Err(ChatError::InvalidInput(reason)) => {
                    debug!(reason, "rejected ws evt");
                }
                Err(err) => {
                    error!(error = %err, "failed publish evt");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogStream, memory::MemoryEventLog};

    fn session() -> Session {
        Session {
            identity_id: "u-1".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    fn ingest(log: Arc<MemoryEventLog>) -> MessageIngest {
        MessageIngest::new(log, "room-1".into(), session())
    }

    #[tokio::test]
    async fn publishes_envelope_with_session_identity() {
        let log = Arc::new(MemoryEventLog::new());
        let mut sub = log.subscribe("test", MSG_SENT_TOPIC).await.unwrap();

        let envelope = ingest(log.clone())
            .publish(SendFrame {
                pending_id: "p1".into(),
                msg: "hi".into(),
            })
            .await
            .unwrap();
        assert_eq!(envelope.pending_id, "p1");
        assert_eq!(envelope.user.email, "ada@example.com");

        let msg = sub.recv().await.unwrap();
        let published: MessageEnvelope = serde_json::from_slice(msg.payload()).unwrap();
        assert_eq!(published, envelope);
        msg.ack();
    }

    #[tokio::test]
    async fn rejects_empty_and_blank_text() {
        let log = Arc::new(MemoryEventLog::new());
        let ingest = ingest(log);
        for msg in ["", "   ", "\n\t"] {
            let err = ingest
                .publish(SendFrame {
                    pending_id: "p1".into(),
                    msg: msg.into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn pending_id_is_echoed_untouched() {
        let log = Arc::new(MemoryEventLog::new());
        let opaque = "client-chose-this-\u{1f980}";
        let envelope = ingest(log)
            .publish(SendFrame {
                pending_id: opaque.into(),
                msg: "hello".into(),
            })
            .await
            .unwrap();
        assert_eq!(envelope.pending_id, opaque);
    }
}
