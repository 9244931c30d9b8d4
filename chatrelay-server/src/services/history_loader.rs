//! History loader: read path over the history store.
//!
//! Translates the client-facing pagination contract (base64 page token,
//! clamped page size) into a store scan and back. The token is decoded
//! before any store call, so a malformed token never costs a query.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shared::{ChatError, StoredMessage};
use std::sync::Arc;
use tracing::debug;

use crate::store::{HistoryStore, StoreError};

pub const DEFAULT_PAGE_SIZE: i64 = 30;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Validated pagination parameters for one history read.
#[derive(Debug, PartialEq, Eq)]
pub struct Pagination {
    resume: Option<Vec<u8>>,
    size: u16,
}

impl Pagination {
    /// Clamps the requested size and decodes the opaque page token.
    ///
    /// # Errors
    /// [`ChatError::InvalidInput`] when the token is not valid base64.
    pub fn new(token: &str, size: i64) -> Result<Self, ChatError> {
        let size = if size < 1 {
            DEFAULT_PAGE_SIZE
        } else if size > MAX_PAGE_SIZE {
            MAX_PAGE_SIZE
        } else {
            size
        };

        let resume = if token.is_empty() {
            None
        } else {
            let bytes = STANDARD
                .decode(token)
                .map_err(|_| ChatError::InvalidInput("invalid page token".into()))?;
            Some(bytes)
        };

        Ok(Self {
            resume,
            size: u16::try_from(size).unwrap_or(u16::MAX),
        })
    }
}

pub struct HistoryLoader {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLoader {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Loads one page newest-first and the token for the next page, empty
    /// when the room's history is exhausted.
    ///
    /// # Errors
    /// [`ChatError::InvalidInput`] when the store rejects the resume bytes,
    /// [`ChatError::TransientStorage`] for any other store failure.
    pub async fn load(
        &self,
        room_id: &str,
        pagination: &Pagination,
    ) -> Result<(Vec<StoredMessage>, String), ChatError> {
        let page = self
            .store
            .scan_desc(room_id, pagination.resume.as_deref(), pagination.size)
            .await
            .map_err(|err| match err {
                StoreError::InvalidResumeToken => {
                    ChatError::InvalidInput("invalid page token".into())
                }
                err => ChatError::TransientStorage(err.to_string()),
            })?;

        debug!(room_id, rows = page.rows.len(), "loaded history page");
        let next = page
            .resume
            .map(|bytes| STANDARD.encode(bytes))
            .unwrap_or_default();
        Ok((page.rows, next))
    }
}
