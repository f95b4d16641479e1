//! Health check handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::broadcast::SharedBroadcastHub;
use crate::domain::HeartbeatRepository;

#[derive(Clone)]
pub struct HealthState {
    pub repository: Arc<dyn HeartbeatRepository>,
    pub hub: SharedBroadcastHub,
    pub started_at: Arc<Instant>,
}

/// Service health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: ComponentHealth,
    /// Live SSE subscribers
    pub active_streams: usize,
    pub stored_heartbeats: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    // A count doubles as the storage ping
    let probe_start = Instant::now();
    let (storage, stored) = match state.repository.count().await {
        Ok(count) => (
            ComponentHealth {
                status: "ok".to_string(),
                latency_ms: Some(probe_start.elapsed().as_millis() as u64),
            },
            Some(count),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health probe failed");
            (
                ComponentHealth {
                    status: "error".to_string(),
                    latency_ms: None,
                },
                None,
            )
        }
    };

    let (http_status, status) = if stored.is_some() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            storage,
            active_streams: state.hub.count(),
            stored_heartbeats: stored,
        }),
    )
}
