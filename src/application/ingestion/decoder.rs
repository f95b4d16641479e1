//! Heartbeat payload decoding
//!
//! Turns a raw message-bus payload into a `HeartbeatEvent`. Every numeric
//! field is required and must be finite; values are otherwise taken as the
//! device reports them. The capture timestamp is assigned here, on arrival.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::HeartbeatEvent;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed heartbeat JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Wire shape published by devices
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatPayload {
    cpu_usage: f32,
    gpu_usage: f32,
    memory_usage: f32,
    temperature: f32,
    inference_fps: f32,
    inference_success_rate: f32,
}

/// Decode a payload, stamping it with the current time.
pub fn decode_heartbeat(payload: &[u8]) -> Result<HeartbeatEvent, DecodeError> {
    decode_heartbeat_at(payload, Utc::now())
}

pub fn decode_heartbeat_at(
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Result<HeartbeatEvent, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let p: HeartbeatPayload = serde_json::from_str(text)?;

    let fields = [
        ("cpuUsage", p.cpu_usage),
        ("gpuUsage", p.gpu_usage),
        ("memoryUsage", p.memory_usage),
        ("temperature", p.temperature),
        ("inferenceFps", p.inference_fps),
        ("inferenceSuccessRate", p.inference_success_rate),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(DecodeError::InvalidField {
                field,
                reason: "must be a finite number",
            });
        }
    }

    Ok(HeartbeatEvent {
        cpu_usage: p.cpu_usage,
        gpu_usage: p.gpu_usage,
        memory_usage: p.memory_usage,
        temperature: p.temperature,
        inference_fps: p.inference_fps,
        inference_success_rate: p.inference_success_rate,
        timestamp: received_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "cpuUsage": 10, "gpuUsage": 5, "memoryUsage": 40,
        "temperature": 55, "inferenceFps": 30, "inferenceSuccessRate": 0.98
    }"#;

    #[test]
    fn decodes_a_complete_payload() {
        let now = Utc::now();
        let event = decode_heartbeat_at(VALID.as_bytes(), now).unwrap();

        assert_eq!(event.cpu_usage, 10.0);
        assert_eq!(event.gpu_usage, 5.0);
        assert_eq!(event.memory_usage, 40.0);
        assert_eq!(event.temperature, 55.0);
        assert_eq!(event.inference_fps, 30.0);
        assert!((event.inference_success_rate - 0.98).abs() < f32::EPSILON);
        assert_eq!(event.timestamp, now);
    }

    #[test]
    fn ignores_unknown_fields() {
        let payload = r#"{"cpuUsage":1,"gpuUsage":1,"memoryUsage":1,"temperature":1,
            "inferenceFps":1,"inferenceSuccessRate":1,"deviceId":"cam-7"}"#;
        assert!(decode_heartbeat(payload.as_bytes()).is_ok());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = decode_heartbeat(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn rejects_missing_field() {
        let payload = r#"{"cpuUsage":1,"gpuUsage":1,"memoryUsage":1,"temperature":1,"inferenceFps":1}"#;
        let err = decode_heartbeat(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.to_string().contains("inferenceSuccessRate"));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let payload = r#"{"cpuUsage":"high","gpuUsage":1,"memoryUsage":1,"temperature":1,
            "inferenceFps":1,"inferenceSuccessRate":1}"#;
        assert!(matches!(
            decode_heartbeat(payload.as_bytes()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn accepts_device_reported_percentages() {
        // Devices report the success rate as a percentage of frames
        let payload = r#"{"cpuUsage":63.2,"gpuUsage":71,"memoryUsage":48,"temperature":-4.5,
            "inferenceFps":24,"inferenceSuccessRate":87.5}"#;
        let event = decode_heartbeat(payload.as_bytes()).unwrap();
        assert_eq!(event.inference_success_rate, 87.5);
        assert_eq!(event.temperature, -4.5);
    }

    #[test]
    fn rejects_non_finite_values() {
        // serde_json cannot parse NaN, but an overflowing literal becomes inf
        let payload = r#"{"cpuUsage":1e40,"gpuUsage":1,"memoryUsage":1,"temperature":1,
            "inferenceFps":1,"inferenceSuccessRate":1}"#;
        let err = decode_heartbeat(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "cpuUsage", .. }));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = decode_heartbeat(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8(_)));
    }
}
