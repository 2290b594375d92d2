//! API Module
//!
//! HTTP API layer for the orchestrator.

pub mod error;
pub mod health;
pub mod job;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::job::JobContext;

/// Create the main API router with all endpoints
pub fn create_router(ctx: Arc<JobContext>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/job/create", post(job::create_job))
        .route("/job/list", get(job::list_jobs))
        .route("/job/cancel-all", post(job::cancel_all_jobs))
        .route("/job/{id}", get(job::get_job))
        .route("/job/{id}/cancel", post(job::cancel_job))
        .route("/job/{id}/retry", post(job::retry_job))
        // Add state and middleware
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
