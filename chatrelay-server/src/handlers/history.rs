use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::HistoryPage;
use tracing::debug;

use crate::app_state::AppState;
use crate::http::AppResult;
use crate::middleware::CurrentSession;
use crate::services::history_loader::Pagination;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub page_token: String,
    /// Zero (absent) falls back to the default page size.
    #[serde(default)]
    pub page_size: i64,
}

/// `GET /{room_id}` returning one page of the room's history, oldest first
/// within the page, newest page first.
pub async fn get_history(
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> AppResult<Json<HistoryPage>> {
    debug!(room_id, identity = %session.identity_id, "loading history");
    let pagination = Pagination::new(&query.page_token, query.page_size)?;
    let (mut page, next_page_token) = state.loader.load(&room_id, &pagination).await?;
    // The store scans newest-first; readers want ascending order in a page.
    page.reverse();
    Ok(Json(HistoryPage {
        page,
        next_page_token,
    }))
}
