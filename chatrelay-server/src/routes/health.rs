use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::log::memory::MemoryEventLog;
    use crate::services::fanout::LiveFanout;
    use crate::store::memory::MemoryHistoryStore;

    #[tokio::test]
    async fn health_returns_ok_without_a_session() {
        let state = AppState::new(
            Arc::new(MemoryEventLog::new()),
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(LiveFanout::new(16)),
        );
        let app = create_health_router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
