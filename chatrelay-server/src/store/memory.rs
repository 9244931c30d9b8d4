//! In-memory history store for tests and single-process development.
//!
//! A `BTreeMap` keyed by `(room_id, msg_id)` gives the same ordering the
//! Postgres backend derives from its primary key, so the descending keyset
//! scan and resume-token behavior match exactly. Not durable.

use async_trait::async_trait;
use shared::StoredMessage;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{HistoryStore, ScanPage, StoreError, parse_resume};

#[derive(Default)]
pub struct MemoryHistoryStore {
    rows: RwLock<BTreeMap<(String, Uuid), StoredMessage>>,
    fail_inserts: AtomicBool,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent inserts fail with a transient error, to exercise
    /// the redelivery path.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert(&self, row: &StoredMessage) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert fault injected".into()));
        }
        self.rows.write().await.insert(
            (row.envelope.room_id.clone(), row.message_id),
            row.clone(),
        );
        Ok(())
    }

    async fn scan_desc(
        &self,
        room_id: &str,
        resume: Option<&[u8]>,
        limit: u16,
    ) -> Result<ScanPage, StoreError> {
        let before = parse_resume(resume)?;

        let rows = self.rows.read().await;
        let page: Vec<StoredMessage> = rows
            .range((room_id.to_string(), Uuid::nil())..=(room_id.to_string(), Uuid::max()))
            .rev()
            .filter(|((_, id), _)| before.is_none_or(|bound| *id < bound))
            .take(usize::from(limit))
            .map(|(_, row)| row.clone())
            .collect();

        let resume = if page.len() == usize::from(limit) {
            page.last().map(|row| row.message_id.as_bytes().to_vec())
        } else {
            None
        };

        Ok(ScanPage { rows: page, resume })
    }
}
