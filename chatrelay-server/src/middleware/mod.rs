pub mod auth;

pub use auth::{CurrentSession, session_middleware};
