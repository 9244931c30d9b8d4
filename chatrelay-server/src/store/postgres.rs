//! Postgres implementation of the history store.
//!
//! Rows are keyed by `(room_id, msg_id)`; `msg_id` is a UUIDv7, so the
//! primary-key order is also time order and a descending keyset scan on it
//! implements the newest-first page. The native resume position is the raw
//! bytes of the last scanned `msg_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{ChatUser, MessageEnvelope, StoredMessage};
use sqlx::PgPool;
use uuid::Uuid;

use super::{HistoryStore, ScanPage, StoreError, parse_resume};

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS chat_history (
    room_id         TEXT NOT NULL,
    msg_id          UUID NOT NULL,
    pending_id      TEXT NOT NULL,
    msg             TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    user_email      TEXT NOT NULL,
    user_first_name TEXT NOT NULL DEFAULT '',
    user_last_name  TEXT NOT NULL DEFAULT '',
    created_at      TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (room_id, msg_id)
)";

/// History store backed by a shared [`PgPool`].
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the history table when it does not exist yet.
    ///
    /// # Errors
    /// Returns the database error when the DDL cannot be applied.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    room_id: String,
    msg_id: Uuid,
    pending_id: String,
    msg: String,
    user_id: String,
    user_email: String,
    user_first_name: String,
    user_last_name: String,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for StoredMessage {
    fn from(row: HistoryRow) -> Self {
        StoredMessage {
            message_id: row.msg_id,
            envelope: MessageEnvelope {
                pending_id: row.pending_id,
                room_id: row.room_id,
                msg: row.msg,
                user: ChatUser {
                    id: row.user_id,
                    email: row.user_email,
                    first_name: row.user_first_name,
                    last_name: row.user_last_name,
                },
                created_at: row.created_at,
            },
        }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn insert(&self, row: &StoredMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_history \
             (room_id, msg_id, pending_id, msg, user_id, user_email, user_first_name, user_last_name, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&row.envelope.room_id)
        .bind(row.message_id)
        .bind(&row.envelope.pending_id)
        .bind(&row.envelope.msg)
        .bind(&row.envelope.user.id)
        .bind(&row.envelope.user.email)
        .bind(&row.envelope.user.first_name)
        .bind(&row.envelope.user.last_name)
        .bind(row.envelope.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn scan_desc(
        &self,
        room_id: &str,
        resume: Option<&[u8]>,
        limit: u16,
    ) -> Result<ScanPage, StoreError> {
        let before = parse_resume(resume)?;

        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT room_id, msg_id, pending_id, msg, user_id, user_email, \
                    user_first_name, user_last_name, created_at \
             FROM chat_history \
             WHERE room_id = $1 AND ($2::uuid IS NULL OR msg_id < $2) \
             ORDER BY msg_id DESC \
             LIMIT $3",
        )
        .bind(room_id)
        .bind(before)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let resume = if rows.len() == usize::from(limit) {
            rows.last()
                .map(|row| row.msg_id.as_bytes().to_vec())
        } else {
            None
        };

        Ok(ScanPage {
            rows: rows.into_iter().map(StoredMessage::from).collect(),
            resume,
        })
    }
}
