//! The history store contract: append-only message rows keyed by
//! `(room_id, msg_id)` with a descending, token-resumable scan.

use async_trait::async_trait;
use shared::StoredMessage;
use thiserror::Error;

pub mod memory;
pub mod postgres;

/// Errors surfaced by a history store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The resume token does not decode to a scan position for this store.
    #[error("resume token does not match a scan position")]
    InvalidResumeToken,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// One descending scan batch plus the native position to resume below.
#[derive(Debug)]
pub struct ScanPage {
    /// Rows ordered by `msg_id` descending (newest first).
    pub rows: Vec<StoredMessage>,
    /// Raw resume position for the next scan; `None` at the end of history.
    pub resume: Option<Vec<u8>>,
}

/// Store handle shared by the history writer and loader, safe for
/// concurrent use.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one stored message. Rows are never updated or deleted.
    ///
    /// # Errors
    /// Returns a [`StoreError`] on I/O failure; the caller treats this as
    /// transient and relies on log redelivery.
    async fn insert(&self, row: &StoredMessage) -> Result<(), StoreError>;

    /// Scans a room's rows newest-first, resuming strictly below `resume`
    /// when present, bounded to `limit` rows.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidResumeToken`] for an unparsable resume
    /// position, or a transient error on I/O failure.
    async fn scan_desc(
        &self,
        room_id: &str,
        resume: Option<&[u8]>,
        limit: u16,
    ) -> Result<ScanPage, StoreError>;
}

pub(crate) fn parse_resume(resume: Option<&[u8]>) -> Result<Option<uuid::Uuid>, StoreError> {
    resume
        .map(|bytes| uuid::Uuid::from_slice(bytes).map_err(|_| StoreError::InvalidResumeToken))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resume_roundtrips_uuid_bytes() {
        let id = uuid::Uuid::now_v7();
        let parsed = parse_resume(Some(id.as_bytes().as_slice())).unwrap();
        assert_eq!(parsed, Some(id));
        assert_eq!(parse_resume(None).unwrap(), None);
    }

    #[test]
    fn parse_resume_rejects_wrong_length() {
        assert!(matches!(
            parse_resume(Some(b"short")),
            Err(StoreError::InvalidResumeToken)
        ));
    }
}
