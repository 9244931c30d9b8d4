#![cfg_attr(not(test), forbid(unsafe_code))]

//! chatrelay server library: the message-distribution pipeline (ingestion,
//! live fan-out, history writer, history loader) and its HTTP/WS surface.

pub mod app_state;
pub mod handlers;
pub mod http;
pub mod log;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
