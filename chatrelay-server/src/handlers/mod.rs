//! Request handlers for the room endpoints.

pub mod history;
pub mod live;
pub mod send;
