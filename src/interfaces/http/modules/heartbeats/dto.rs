//! Heartbeat REST DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::domain::{HeartbeatRecord, NewHeartbeat};

/// Stored heartbeat as returned by the read endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatDto {
    pub heartbeat_id: i32,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f32,
    pub gpu_usage: f32,
    pub memory_usage: f32,
    pub temperature: f32,
    pub last_inference_time: Option<DateTime<Utc>>,
    pub inference_fps: f32,
    pub inference_success_rate: f32,
}

impl From<HeartbeatRecord> for HeartbeatDto {
    fn from(r: HeartbeatRecord) -> Self {
        Self {
            heartbeat_id: r.heartbeat_id,
            timestamp: r.timestamp,
            cpu_usage: r.cpu_usage,
            gpu_usage: r.gpu_usage,
            memory_usage: r.memory_usage,
            temperature: r.temperature,
            last_inference_time: r.last_inference_time,
            inference_fps: r.inference_fps,
            inference_success_rate: r.inference_success_rate,
        }
    }
}

/// Manually recorded heartbeat. The server stamps it on arrival. Values
/// are stored as reported; `inferenceSuccessRate` is usually a percentage.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHeartbeatRequest {
    #[validate(custom(function = "finite"))]
    pub cpu_usage: f32,
    #[validate(custom(function = "finite"))]
    pub gpu_usage: f32,
    #[validate(custom(function = "finite"))]
    pub memory_usage: f32,
    #[validate(custom(function = "finite"))]
    pub temperature: f32,
    pub last_inference_time: Option<DateTime<Utc>>,
    #[validate(custom(function = "finite"))]
    pub inference_fps: f32,
    #[validate(custom(function = "finite"))]
    pub inference_success_rate: f32,
}

fn finite(value: f32) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        let mut err = ValidationError::new("finite");
        err.message = Some("must be a finite number".into());
        Err(err)
    }
}

impl CreateHeartbeatRequest {
    pub fn into_new_heartbeat(self, received_at: DateTime<Utc>) -> NewHeartbeat {
        NewHeartbeat {
            timestamp: received_at,
            cpu_usage: self.cpu_usage,
            gpu_usage: self.gpu_usage,
            memory_usage: self.memory_usage,
            temperature: self.temperature,
            last_inference_time: self.last_inference_time,
            inference_fps: self.inference_fps,
            inference_success_rate: self.inference_success_rate,
        }
    }
}

/// Inclusive time window for `/heartbeats/range`
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeParams {
    /// RFC 3339 lower bound
    pub start: DateTime<Utc>,
    /// RFC 3339 upper bound
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}
