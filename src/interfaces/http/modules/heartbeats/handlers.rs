//! Heartbeat REST API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use super::dto::{CountResponse, CreateHeartbeatRequest, HeartbeatDto, RangeParams};
use crate::domain::HeartbeatRepository;
use crate::interfaces::http::common::{
    api_error, domain_error, ApiError, ApiResponse, ValidatedJson,
};

#[derive(Clone)]
pub struct HeartbeatState {
    pub repository: Arc<dyn HeartbeatRepository>,
}

fn to_dtos(records: Vec<crate::domain::HeartbeatRecord>) -> Vec<HeartbeatDto> {
    records.into_iter().map(Into::into).collect()
}

#[utoipa::path(
    get,
    path = "/heartbeats",
    tag = "Heartbeats",
    responses(
        (status = 200, description = "All stored heartbeats", body = ApiResponse<Vec<HeartbeatDto>>)
    )
)]
pub async fn list_heartbeats(
    State(state): State<HeartbeatState>,
) -> Result<Json<ApiResponse<Vec<HeartbeatDto>>>, ApiError> {
    let records = state
        .repository
        .find_all()
        .await
        .map_err(|e| domain_error(e, "Failed to list heartbeats"))?;
    Ok(Json(ApiResponse::success(to_dtos(records))))
}

#[utoipa::path(
    get,
    path = "/heartbeats/count",
    tag = "Heartbeats",
    responses(
        (status = 200, description = "Number of stored heartbeats", body = ApiResponse<CountResponse>)
    )
)]
pub async fn count_heartbeats(
    State(state): State<HeartbeatState>,
) -> Result<Json<ApiResponse<CountResponse>>, ApiError> {
    let count = state
        .repository
        .count()
        .await
        .map_err(|e| domain_error(e, "Failed to count heartbeats"))?;
    Ok(Json(ApiResponse::success(CountResponse { count })))
}

#[utoipa::path(
    get,
    path = "/heartbeats/{id}",
    tag = "Heartbeats",
    params(("id" = i32, Path, description = "Heartbeat ID")),
    responses(
        (status = 200, description = "Heartbeat details", body = ApiResponse<HeartbeatDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_heartbeat(
    State(state): State<HeartbeatState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<HeartbeatDto>>, ApiError> {
    match state.repository.find_by_id(id).await {
        Ok(Some(record)) => Ok(Json(ApiResponse::success(record.into()))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Heartbeat {} not found", id),
        )),
        Err(e) => Err(domain_error(e, "Failed to get heartbeat")),
    }
}

/// Stores the heartbeat only. Live subscribers are fed from the message
/// bus, not from this endpoint.
#[utoipa::path(
    post,
    path = "/heartbeats",
    tag = "Heartbeats",
    request_body = CreateHeartbeatRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<HeartbeatDto>),
        (status = 400, description = "Malformed body"),
        (status = 422, description = "Field validation failed")
    )
)]
pub async fn create_heartbeat(
    State(state): State<HeartbeatState>,
    ValidatedJson(request): ValidatedJson<CreateHeartbeatRequest>,
) -> Result<(StatusCode, Json<ApiResponse<HeartbeatDto>>), ApiError> {
    let record = state
        .repository
        .save(request.into_new_heartbeat(Utc::now()))
        .await
        .map_err(|e| domain_error(e, "Failed to save heartbeat"))?;

    info!(heartbeat_id = record.heartbeat_id, "Heartbeat created via REST");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}

#[utoipa::path(
    delete,
    path = "/heartbeats/{id}",
    tag = "Heartbeats",
    params(("id" = i32, Path, description = "Heartbeat ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_heartbeat(
    State(state): State<HeartbeatState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .repository
        .delete_by_id(id)
        .await
        .map_err(|e| domain_error(e, "Failed to delete heartbeat"))?;

    info!(heartbeat_id = id, "Heartbeat deleted");
    Ok(Json(ApiResponse::success(())))
}

#[utoipa::path(
    get,
    path = "/heartbeats/range",
    tag = "Heartbeats",
    params(RangeParams),
    responses(
        (status = 200, description = "Heartbeats captured within [start, end], oldest first", body = ApiResponse<Vec<HeartbeatDto>>),
        (status = 400, description = "start is after end")
    )
)]
pub async fn heartbeats_between(
    State(state): State<HeartbeatState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<ApiResponse<Vec<HeartbeatDto>>>, ApiError> {
    if params.start > params.end {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "start must not be after end",
        ));
    }

    let records = state
        .repository
        .find_between(params.start, params.end)
        .await
        .map_err(|e| domain_error(e, "Failed to query heartbeats"))?;
    Ok(Json(ApiResponse::success(to_dtos(records))))
}

/// Dashboard monitoring view: every stored heartbeat
#[utoipa::path(
    get,
    path = "/api/monitoring",
    tag = "Heartbeats",
    responses(
        (status = 200, description = "Heartbeats for the monitoring view", body = ApiResponse<Vec<HeartbeatDto>>)
    )
)]
pub async fn monitoring_heartbeats(
    State(state): State<HeartbeatState>,
) -> Result<Json<ApiResponse<Vec<HeartbeatDto>>>, ApiError> {
    let records = state
        .repository
        .find_all()
        .await
        .map_err(|e| domain_error(e, "Failed to load monitoring data"))?;
    Ok(Json(ApiResponse::success(to_dtos(records))))
}
