//! The pipeline components: ingestion, live fan-out, history writer, and
//! history loader.

pub mod fanout;
pub mod history_loader;
pub mod history_writer;
pub mod ingest;
