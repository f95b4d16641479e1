//! Heartbeat records: list, lookup, create, delete, count, time range

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
