//! Wire models exchanged between clients, the durable log, and the store.

pub mod message;
