//! Heartbeat aggregate
//!
//! Contains the live `HeartbeatEvent`, the persisted `HeartbeatRecord`
//! and the repository interface.

pub mod model;
pub mod repository;

pub use model::{HeartbeatEvent, HeartbeatRecord, NewHeartbeat};
pub use repository::HeartbeatRepository;
