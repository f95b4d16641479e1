//! Heartbeat entity

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One stored device heartbeat
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "heartbeats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub heartbeat_id: i32,

    /// Server-side capture time
    pub timestamp: DateTime<Utc>,

    pub cpu_usage: f32,
    pub gpu_usage: f32,
    pub memory_usage: f32,
    pub temperature: f32,

    /// Time of the device's last inference, when it reports one
    pub last_inference_time: Option<DateTime<Utc>>,

    pub inference_fps: f32,
    pub inference_success_rate: f32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
