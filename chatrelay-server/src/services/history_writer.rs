//! History writer: consumer group `history` on the `msg_sent` topic.
//!
//! For each delivery: decode the envelope, validate it, assign the canonical
//! `msg_id`, insert, then publish a stored-message confirmation to
//! `msg_stored`. Undecodable or invalid envelopes are poison: acknowledged
//! and reported, never retried, so a single bad payload cannot stall the
//! stream. A failed insert is transient: the delivery is dropped unacked and
//! the log redelivers it. The insert is the durability boundary; the
//! confirmation publish is best-effort notification.
//!
//! Redelivery after a crash between insert and ack assigns a fresh `msg_id`
//! and produces a duplicate row. That is the accepted at-least-once
//! semantics of the persisted history.

use shared::{MessageEnvelope, StoredMessage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::log::{
    EventLog, HISTORY_GROUP, LogError, LogMessage, MSG_SENT_TOPIC, MSG_STORED_TOPIC,
};
use crate::store::HistoryStore;

pub struct HistoryWriter {
    log: Arc<dyn EventLog>,
    store: Arc<dyn HistoryStore>,
}

/// Outcome of handling one delivery, for observability and tests.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Inserted and acknowledged.
    Stored,
    /// Poison message: acknowledged and dropped.
    Poisoned,
    /// Transient storage failure: left unacked for redelivery.
    Retrying,
}

impl HistoryWriter {
    pub fn new(log: Arc<dyn EventLog>, store: Arc<dyn HistoryStore>) -> Self {
        Self { log, store }
    }

    /// Consumes the `history` group until shutdown.
    ///
    /// # Errors
    /// Returns [`LogError`] when the subscription cannot be established.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), LogError> {
        let mut sub = self.log.subscribe(HISTORY_GROUP, MSG_SENT_TOPIC).await?;
        info!(topic = MSG_SENT_TOPIC, group = HISTORY_GROUP, "history writer running");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                msg = sub.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg).await;
                }
            }
        }
        info!("history writer stopped");
        Ok(())
    }

    /// Processes one delivery end to end.
    pub async fn handle(&self, msg: LogMessage) -> WriteOutcome {
        let envelope: MessageEnvelope = match serde_json::from_slice(msg.payload()) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(error = %err, "failed decode msg - skip");
                msg.ack();
                return WriteOutcome::Poisoned;
            }
        };

        if let Err(reason) = envelope.validate() {
            error!(reason, "failed write history - skip");
            msg.ack();
            return WriteOutcome::Poisoned;
        }

        let stored = StoredMessage::new(Uuid::now_v7(), envelope);
        if let Err(err) = self.store.insert(&stored).await {
            // Dropping the message unacked hands it back to the log.
            error!(error = %err, "failed insert into history");
            return WriteOutcome::Retrying;
        }

        match serde_json::to_vec(&stored) {
            Ok(payload) => {
                if let Err(err) = self.log.publish(MSG_STORED_TOPIC, payload).await {
                    warn!(error = %err, "failed publish stored evt");
                }
            }
            Err(err) => warn!(error = %err, "failed encode stored evt"),
        }

        msg.ack();
        WriteOutcome::Stored
    }
}
