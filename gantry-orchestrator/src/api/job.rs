//! Job API Handlers
//!
//! HTTP endpoints for the job lifecycle.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use gantry_core::domain::job::Job;
use gantry_core::dto::job::{CancelAllResponse, CancelScope, CreateJob, JobFilter};

use crate::api::error::ApiResult;
use crate::service::job_service;
use crate::service::job::JobContext;

/// POST /job/create
/// Create a new job; returns it in `pending` without waiting for work.
pub async fn create_job(
    State(ctx): State<Arc<JobContext>>,
    Json(req): Json<CreateJob>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Creating {} job for {}", req.kind, req.resource_ref);

    let job = job_service::submit(&ctx, req)?;
    Ok(Json(job))
}

/// GET /job/{id}
pub async fn get_job(
    State(ctx): State<Arc<JobContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = job_service::get_job(&ctx, id)?;
    Ok(Json(job))
}

/// GET /job/list
/// List jobs, most recent first, filtered by resource/kind/status.
pub async fn list_jobs(
    State(ctx): State<Arc<JobContext>>,
    Query(filter): Query<JobFilter>,
) -> ApiResult<Json<Vec<Job>>> {
    tracing::debug!("Listing jobs");

    let jobs = job_service::list_jobs(&ctx, &filter);
    Ok(Json(jobs))
}

/// POST /job/{id}/cancel
/// Request early termination. The returned snapshot may still read
/// `running` while the worker tears down.
pub async fn cancel_job(
    State(ctx): State<Arc<JobContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Cancelling job: {}", id);

    let job = job_service::cancel(&ctx, id)?;
    Ok(Json(job))
}

/// POST /job/cancel-all
/// Cancel every active job matching the scope; returns the count.
pub async fn cancel_all_jobs(
    State(ctx): State<Arc<JobContext>>,
    Json(scope): Json<CancelScope>,
) -> ApiResult<Json<CancelAllResponse>> {
    tracing::info!("Cancelling all jobs in scope");

    let cancelled = job_service::cancel_all(&ctx, &scope);
    Ok(Json(CancelAllResponse { cancelled }))
}

/// POST /job/{id}/retry
/// Re-submit a failed job's inputs as a new job.
pub async fn retry_job(
    State(ctx): State<Arc<JobContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::info!("Retrying job: {}", id);

    let job = job_service::retry(&ctx, id)?;
    Ok(Json(job))
}
