//! Domain layer - heartbeat types and the persistence contract

pub mod heartbeat;

pub use heartbeat::{HeartbeatEvent, HeartbeatRecord, HeartbeatRepository, NewHeartbeat};

pub use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
