use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use shared::ChatError;
use thiserror::Error;

use super::problem::ProblemDetails;

pub type AppResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let details = self.details;

        let mut problem = ProblemDetails::new(self.status, self.code, self.message);
        if let Some(details) = details {
            problem = problem.with_details(details);
        }

        problem.into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidInput(message) => Self::bad_request(message),
            ChatError::Unauthorized(message) => Self::unauthorized(message),
            ChatError::TransientStorage(message) | ChatError::TransientLog(message) => {
                Self::internal_server_error(message)
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal_server_error(value.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err
                .code()
                .unwrap_or_else(|| std::borrow::Cow::Borrowed("unknown"));
            let message = format!("database error {code}");
            return Self::internal_server_error(message)
                .with_details(json!({ "sqlstate": code, "message": db_err.message() }));
        }

        Self::internal_server_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http::header::CONTENT_TYPE;
    use serde_json::Value;

    #[test]
    fn new_sets_fields_and_allows_details() {
        let error = ApiError::unauthorized("nope").with_details(json!({ "reason": "no session" }));
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.code, "unauthorized");
        assert!(
            error
                .details
                .as_ref()
                .is_some_and(|details| details["reason"] == Value::from("no session"))
        );
    }

    #[tokio::test]
    async fn into_response_serializes_problem_details() {
        let response = ApiError::bad_request("invalid page token")
            .with_details(json!({ "param": "page_token" }))
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body to bytes");
        let json: Value =
            serde_json::from_slice(&bytes).expect("problem details deserializes to json");
        assert_eq!(json["code"], "invalid_input");
        assert_eq!(json["message"], "invalid page token");
        assert_eq!(json["details"]["param"], "page_token");
    }

    #[test]
    fn chat_errors_map_to_matching_status_codes() {
        let invalid = ApiError::from(ChatError::InvalidInput("bad".into()));
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

        let unauthorized = ApiError::from(ChatError::Unauthorized("no session".into()));
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

        let storage = ApiError::from(ChatError::TransientStorage("down".into()));
        assert_eq!(storage.status, StatusCode::INTERNAL_SERVER_ERROR);

        let log = ApiError::from(ChatError::TransientLog("down".into()));
        assert_eq!(log.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn database_errors_are_internal() {
        let db = ApiError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(db.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
