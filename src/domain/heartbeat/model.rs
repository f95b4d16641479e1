//! Heartbeat domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry sample as received from a device.
///
/// This is the shape pushed to live subscribers. It is never mutated after
/// the ingestion adapter builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatEvent {
    pub cpu_usage: f32,
    pub gpu_usage: f32,
    pub memory_usage: f32,
    pub temperature: f32,
    /// Inference throughput in frames per second
    pub inference_fps: f32,
    /// Fraction of successful inferences, 0.0–1.0
    pub inference_success_rate: f32,
    /// Server-side capture time
    pub timestamp: DateTime<Utc>,
}

impl HeartbeatEvent {
    /// Build the record to hand to the store. The store assigns the id.
    pub fn to_new_heartbeat(&self) -> NewHeartbeat {
        NewHeartbeat {
            timestamp: self.timestamp,
            cpu_usage: self.cpu_usage,
            gpu_usage: self.gpu_usage,
            memory_usage: self.memory_usage,
            temperature: self.temperature,
            last_inference_time: None,
            inference_fps: self.inference_fps,
            inference_success_rate: self.inference_success_rate,
        }
    }
}

/// A heartbeat that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewHeartbeat {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f32,
    pub gpu_usage: f32,
    pub memory_usage: f32,
    pub temperature: f32,
    pub last_inference_time: Option<DateTime<Utc>>,
    pub inference_fps: f32,
    pub inference_success_rate: f32,
}

impl NewHeartbeat {
    pub fn with_id(self, heartbeat_id: i32) -> HeartbeatRecord {
        HeartbeatRecord {
            heartbeat_id,
            timestamp: self.timestamp,
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

/// Persisted heartbeat, as returned by the store and the REST read path
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatRecord {
    /// Store-assigned identifier
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
