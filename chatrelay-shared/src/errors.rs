//! Domain error taxonomy shared across the pipeline.
//!
//! The split matters for retry behavior: [`ChatError::InvalidInput`] and
//! [`ChatError::Unauthorized`] are terminal and user-visible, while the
//! transient variants are retried by the caller or by log redelivery.

use thiserror::Error;

/// Errors surfaced by the message pipeline and its read path.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The input data is invalid (bad page token, empty message text).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller is not correctly authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A store insert or query failed for an infrastructural reason.
    #[error("transient storage failure: {0}")]
    TransientStorage(String),

    /// A durable-log publish or subscribe failed for an infrastructural reason.
    #[error("transient log failure: {0}")]
    TransientLog(String),
}

impl ChatError {
    /// Whether retrying the same operation can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChatError::TransientStorage(_) | ChatError::TransientLog(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ChatError::TransientStorage("io".into()).is_transient());
        assert!(ChatError::TransientLog("io".into()).is_transient());
        assert!(!ChatError::InvalidInput("bad token".into()).is_transient());
        assert!(!ChatError::Unauthorized("no session".into()).is_transient());
    }

    #[test]
    fn display_includes_cause() {
        let err = ChatError::InvalidInput("page token is not base64".into());
        assert_eq!(err.to_string(), "invalid input: page token is not base64");
    }
}
