//! SeaORM implementation of HeartbeatRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use crate::domain::{DomainError, DomainResult, HeartbeatRecord, HeartbeatRepository, NewHeartbeat};
use crate::infrastructure::database::entities::heartbeat;
use crate::shared::errors::InfraError;

fn db_err(e: sea_orm::DbErr) -> DomainError {
    InfraError::Database(e).into()
}

fn entity_to_domain(m: heartbeat::Model) -> HeartbeatRecord {
    HeartbeatRecord {
        heartbeat_id: m.heartbeat_id,
        timestamp: m.timestamp,
        cpu_usage: m.cpu_usage,
        gpu_usage: m.gpu_usage,
        memory_usage: m.memory_usage,
        temperature: m.temperature,
        last_inference_time: m.last_inference_time,
        inference_fps: m.inference_fps,
        inference_success_rate: m.inference_success_rate,
    }
}

pub struct SeaOrmHeartbeatRepository {
    db: DatabaseConnection,
}

impl SeaOrmHeartbeatRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HeartbeatRepository for SeaOrmHeartbeatRepository {
    async fn save(&self, h: NewHeartbeat) -> DomainResult<HeartbeatRecord> {
        let model = heartbeat::ActiveModel {
            heartbeat_id: NotSet,
            timestamp: Set(h.timestamp),
            cpu_usage: Set(h.cpu_usage),
            gpu_usage: Set(h.gpu_usage),
            memory_usage: Set(h.memory_usage),
            temperature: Set(h.temperature),
            last_inference_time: Set(h.last_inference_time),
            inference_fps: Set(h.inference_fps),
            inference_success_rate: Set(h.inference_success_rate),
        };
        let saved = model.insert(&self.db).await.map_err(db_err)?;
        debug!(heartbeat_id = saved.heartbeat_id, "Heartbeat saved");
        Ok(entity_to_domain(saved))
    }

    async fn find_all(&self) -> DomainResult<Vec<HeartbeatRecord>> {
        let models = heartbeat::Entity::find()
            .order_by_asc(heartbeat::Column::HeartbeatId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(entity_to_domain).collect())
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<HeartbeatRecord>> {
        let model = heartbeat::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(entity_to_domain))
    }

    async fn delete_by_id(&self, id: i32) -> DomainResult<()> {
        let result = heartbeat::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(DomainError::heartbeat_not_found(id));
        }
        debug!(heartbeat_id = id, "Heartbeat deleted");
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        heartbeat::Entity::find()
            .count(&self.db)
            .await
            .map_err(db_err)
    }

    async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<HeartbeatRecord>> {
        let models = heartbeat::Entity::find()
            .filter(heartbeat::Column::Timestamp.gte(start))
            .filter(heartbeat::Column::Timestamp.lte(end))
            .order_by_asc(heartbeat::Column::Timestamp)
            .order_by_asc(heartbeat::Column::HeartbeatId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(entity_to_domain).collect())
    }
}
