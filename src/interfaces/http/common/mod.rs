//! Shared HTTP building blocks

pub mod validated_json;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::DomainError;

pub use validated_json::ValidatedJson;

/// Response envelope used by every REST endpoint.
///
/// Success: `{"success": true, "data": {...}}`,
/// failure: `{"success": false, "data": null, "error": "..."}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

/// Map a domain failure onto an HTTP status. `context` prefixes storage
/// errors so the log line and the response say which operation failed.
pub fn domain_error(e: DomainError, context: &str) -> ApiError {
    match e {
        DomainError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        DomainError::Validation(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        DomainError::Storage(_) => {
            tracing::error!(error = %e, "{}", context);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}: {}", context, e),
            )
        }
    }
}
