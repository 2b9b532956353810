//! API error types with HTTP response mapping.

use allocation::AllocationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// No usable actor on the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, message(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, message(msg)),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, message(msg)),
            ApiError::Allocation(err) => allocation_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn message(msg: String) -> serde_json::Value {
    serde_json::json!({ "error": msg })
}

fn allocation_error_to_response(err: AllocationError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        AllocationError::Validation(_) => StatusCode::BAD_REQUEST,
        AllocationError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        AllocationError::Conflict {
            slice_key,
            unit_ids,
        } => {
            let body = serde_json::json!({
                "error": err.to_string(),
                "slice_key": slice_key,
                "unit_ids": unit_ids,
            });
            return (StatusCode::CONFLICT, body);
        }
        AllocationError::InvalidStateTransition(_) | AllocationError::AlreadyRefunded => {
            StatusCode::CONFLICT
        }
        AllocationError::NotFound(_) => StatusCode::NOT_FOUND,
        AllocationError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AllocationError::Internal(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, message(err.to_string()))
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Allocation(err.into())
    }
}

impl From<domain::LayoutError> for ApiError {
    fn from(err: domain::LayoutError) -> Self {
        ApiError::Allocation(err.into())
    }
}
