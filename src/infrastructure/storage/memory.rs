//! In-memory heartbeat store

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::{
    DomainError, DomainResult, HeartbeatRecord, HeartbeatRepository, NewHeartbeat,
};

/// In-memory storage for development and testing
pub struct InMemoryHeartbeatRepository {
    heartbeats: DashMap<i32, HeartbeatRecord>,
    id_counter: AtomicI32,
}

impl InMemoryHeartbeatRepository {
    pub fn new() -> Self {
        Self {
            heartbeats: DashMap::new(),
            id_counter: AtomicI32::new(1),
        }
    }

    fn sorted(&self, mut records: Vec<HeartbeatRecord>) -> Vec<HeartbeatRecord> {
        records.sort_by_key(|r| r.heartbeat_id);
        records
    }
}

impl Default for InMemoryHeartbeatRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeartbeatRepository for InMemoryHeartbeatRepository {
    async fn save(&self, heartbeat: NewHeartbeat) -> DomainResult<HeartbeatRecord> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let record = heartbeat.with_id(id);
        self.heartbeats.insert(id, record.clone());
        Ok(record)
    }

    async fn find_all(&self) -> DomainResult<Vec<HeartbeatRecord>> {
        let all = self.heartbeats.iter().map(|e| e.value().clone()).collect();
        Ok(self.sorted(all))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<HeartbeatRecord>> {
        Ok(self.heartbeats.get(&id).map(|r| r.clone()))
    }

    async fn delete_by_id(&self, id: i32) -> DomainResult<()> {
        self.heartbeats
            .remove(&id)
            .ok_or_else(|| DomainError::heartbeat_not_found(id))?;
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.heartbeats.len() as u64)
    }

    async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<HeartbeatRecord>> {
        let mut matching: Vec<HeartbeatRecord> = self
            .heartbeats
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.heartbeat_id.cmp(&b.heartbeat_id))
        });
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(at: DateTime<Utc>) -> NewHeartbeat {
        NewHeartbeat {
            timestamp: at,
            cpu_usage: 10.0,
            gpu_usage: 5.0,
            memory_usage: 40.0,
            temperature: 55.0,
            last_inference_time: None,
            inference_fps: 30.0,
            inference_success_rate: 0.98,
        }
    }

    #[tokio::test]
    async fn save_assigns_increasing_ids() {
        let repo = InMemoryHeartbeatRepository::new();
        let now = Utc::now();

        let first = repo.save(sample(now)).await.unwrap();
        let second = repo.save(sample(now)).await.unwrap();

        assert_eq!(first.heartbeat_id, 1);
        assert_eq!(second.heartbeat_id, 2);
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let repo = InMemoryHeartbeatRepository::new();
        let saved = repo.save(sample(Utc::now())).await.unwrap();

        repo.delete_by_id(saved.heartbeat_id).await.unwrap();
        assert!(repo.find_by_id(saved.heartbeat_id).await.unwrap().is_none());

        let err = repo.delete_by_id(saved.heartbeat_id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn find_between_is_inclusive_and_ordered() {
        let repo = InMemoryHeartbeatRepository::new();
        let base = Utc::now();

        repo.save(sample(base + Duration::seconds(20))).await.unwrap();
        repo.save(sample(base)).await.unwrap();
        repo.save(sample(base + Duration::seconds(10))).await.unwrap();
        repo.save(sample(base + Duration::seconds(60))).await.unwrap();

        let found = repo
            .find_between(base, base + Duration::seconds(20))
            .await
            .unwrap();
        let stamps: Vec<_> = found.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            stamps,
            vec![base, base + Duration::seconds(10), base + Duration::seconds(20)]
        );
    }
}
