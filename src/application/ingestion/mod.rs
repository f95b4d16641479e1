//! Message-bus ingestion: decoding and the decode → persist → broadcast flow

pub mod decoder;
pub mod pipeline;

pub use decoder::{decode_heartbeat, DecodeError};
pub use pipeline::{IngestOutcome, IngestionPipeline};
