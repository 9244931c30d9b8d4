#![cfg_attr(not(test), forbid(unsafe_code))]

//! Shared building blocks for the chatrelay services: wire models, the typed
//! session schema, configuration, and the domain error taxonomy.

pub mod config;
pub mod errors;
pub mod models;
pub mod session;

pub use errors::ChatError;
pub use models::message::{ChatUser, HistoryPage, MessageEnvelope, SendFrame, StoredMessage};
pub use session::Session;
