//! API Error Handling
//!
//! Maps domain errors onto HTTP statuses: Validation -> 400, NotFound ->
//! 404, Conflict and InvalidTransition -> 409. Asynchronous outcomes are
//! never errors on this surface; they live on the job record.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use gantry_core::domain::error::JobError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match &err {
            JobError::Validation(_) => ApiError::BadRequest(err.to_string()),
            JobError::NotFound(_) => ApiError::NotFound(err.to_string()),
            JobError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            JobError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
