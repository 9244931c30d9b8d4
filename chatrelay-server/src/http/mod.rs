//! HTTP error surface: RFC 7807 problem responses.

pub mod error;
pub mod problem;

pub use error::{ApiError, AppResult};
pub use problem::ProblemDetails;
