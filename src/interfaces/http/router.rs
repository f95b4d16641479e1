//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::FromRef, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::broadcast::SharedBroadcastHub;
use crate::config::StreamingConfig;
use crate::domain::HeartbeatRepository;

use super::modules::health::{self, HealthState};
use super::modules::heartbeats::{self, HeartbeatState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::stream::{self, StreamState};

/// Everything the handlers need. Each handler extracts its own slice via
/// `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn HeartbeatRepository>,
    pub hub: SharedBroadcastHub,
    pub streaming: StreamingConfig,
    pub started_at: Arc<Instant>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn HeartbeatRepository>,
        hub: SharedBroadcastHub,
        streaming: StreamingConfig,
    ) -> Self {
        Self {
            repository,
            hub,
            streaming,
            started_at: Arc::new(Instant::now()),
        }
    }
}

impl FromRef<AppState> for HeartbeatState {
    fn from_ref(s: &AppState) -> Self {
        HeartbeatState {
            repository: Arc::clone(&s.repository),
        }
    }
}

impl FromRef<AppState> for StreamState {
    fn from_ref(s: &AppState) -> Self {
        StreamState {
            hub: s.hub.clone(),
            streaming: s.streaming.clone(),
        }
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(s: &AppState) -> Self {
        HealthState {
            repository: Arc::clone(&s.repository),
            hub: s.hub.clone(),
            started_at: s.started_at.clone(),
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        heartbeats::list_heartbeats,
        heartbeats::count_heartbeats,
        heartbeats::get_heartbeat,
        heartbeats::create_heartbeat,
        heartbeats::delete_heartbeat,
        heartbeats::heartbeats_between,
        heartbeats::monitoring_heartbeats,
        stream::stream_heartbeats,
    ),
    components(schemas(
        heartbeats::HeartbeatDto,
        heartbeats::CreateHeartbeatRequest,
        heartbeats::CountResponse,
        health::HealthResponse,
        health::ComponentHealth,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Heartbeats", description = "Stored device heartbeats and the live stream"),
    ),
    info(
        title = "Heartbeat Hub API",
        description = "Device heartbeat storage and live fan-out for the alert dashboard",
    )
)]
pub struct ApiDoc;

/// Build the HTTP router. `/metrics` is only mounted when a Prometheus
/// recorder is installed.
pub fn create_api_router(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check))
        .route(
            "/heartbeats",
            get(heartbeats::list_heartbeats).post(heartbeats::create_heartbeat),
        )
        .route("/heartbeats/count", get(heartbeats::count_heartbeats))
        .route("/heartbeats/range", get(heartbeats::heartbeats_between))
        .route("/heartbeats/stream", get(stream::stream_heartbeats))
        // Path used by existing dashboard builds
        .route("/heartbeats/heartbeat/stream", get(stream::stream_heartbeats))
        .route(
            "/heartbeats/{id}",
            get(heartbeats::get_heartbeat).delete(heartbeats::delete_heartbeat),
        )
        .route("/api/monitoring", get(heartbeats::monitoring_heartbeats))
        .with_state(state);

    if let Some(handle) = prometheus {
        let metrics_routes = Router::new()
            .route("/metrics", get(prometheus_metrics))
            .with_state(MetricsState { handle });
        router = router.merge(metrics_routes);
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
