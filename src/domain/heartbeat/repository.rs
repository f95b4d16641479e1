//! Heartbeat repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{HeartbeatRecord, NewHeartbeat};
use crate::domain::DomainResult;

/// Durable heartbeat store. Each call is atomic on its own; callers add no
/// locking around it.
#[async_trait]
pub trait HeartbeatRepository: Send + Sync {
    /// Persist a heartbeat and return it with its assigned id.
    async fn save(&self, heartbeat: NewHeartbeat) -> DomainResult<HeartbeatRecord>;
    async fn find_all(&self) -> DomainResult<Vec<HeartbeatRecord>>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<HeartbeatRecord>>;
    /// Fails with `DomainError::NotFound` when no heartbeat has this id.
    async fn delete_by_id(&self, id: i32) -> DomainResult<()>;
    async fn count(&self) -> DomainResult<u64>;
    /// Heartbeats with `start <= timestamp <= end`, oldest first.
    async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<HeartbeatRecord>>;
}
