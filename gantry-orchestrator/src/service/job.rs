//! Job Service
//!
//! Business logic for the job lifecycle: submission, observation,
//! cancellation, bulk cancellation, and retry.

use std::sync::Arc;

use uuid::Uuid;

use gantry_core::domain::error::JobError;
use gantry_core::domain::job::{Job, JobStatus};
use gantry_core::dto::job::{CancelScope, CreateJob, JobFilter};

use crate::executor::ExecutorSupervisor;
use crate::registry::JobRegistry;

/// Shared handles injected into every request handler. Constructed once
/// per process in `main`.
#[derive(Clone)]
pub struct JobContext {
    pub registry: Arc<JobRegistry>,
    pub supervisor: Arc<ExecutorSupervisor>,
}

/// Create a job and hand it to its worker.
///
/// Returns the pending job immediately; completion is observed through
/// `get`/`list`, never awaited here.
pub fn submit(ctx: &JobContext, req: CreateJob) -> Result<Job, JobError> {
    let job = ctx.registry.create(req, None)?;
    ctx.supervisor.spawn(job.clone());
    Ok(job)
}

pub fn get_job(ctx: &JobContext, id: Uuid) -> Result<Job, JobError> {
    ctx.registry.get(id)
}

pub fn list_jobs(ctx: &JobContext, filter: &JobFilter) -> Vec<Job> {
    ctx.registry.list(filter)
}

/// Request early termination of a pending or running job.
///
/// Pending jobs settle as `cancelled` before this returns. Running jobs
/// are signalled; the worker records `cancelled` once it acknowledges,
/// so the returned snapshot may still read `running`.
pub fn cancel(ctx: &JobContext, id: Uuid) -> Result<Job, JobError> {
    match ctx.registry.cancel_pending(id)? {
        Some(job) => {
            // Never started; stand the worker down if one was spawned.
            ctx.supervisor.request_cancel(id);
            Ok(job)
        }
        None => {
            let signalled = ctx.supervisor.request_cancel(id);
            tracing::info!("Job {} cancellation requested", id);
            let job = ctx.registry.get(id)?;
            if !signalled && job.status.is_terminal() {
                // The worker settled between the snapshot and the signal.
                return Err(JobError::InvalidTransition {
                    id,
                    from: job.status,
                    to: JobStatus::Cancelled,
                });
            }
            Ok(job)
        }
    }
}

/// Cancel every active job matching the scope.
///
/// Each cancellation is independent: a job that settles concurrently is
/// skipped and does not block the rest. Returns the count actually
/// cancelled.
pub fn cancel_all(ctx: &JobContext, scope: &CancelScope) -> usize {
    let targets: Vec<Job> = ctx
        .registry
        .list(&JobFilter::default())
        .into_iter()
        .filter(|j| j.is_active() && scope.matches(j))
        .collect();

    let mut cancelled = 0;
    for job in targets {
        match cancel(ctx, job.id) {
            Ok(_) => cancelled += 1,
            Err(err) => tracing::debug!("Job {} not cancelled: {}", job.id, err),
        }
    }
    tracing::info!("Cancelled {} job(s) in scope", cancelled);
    cancelled
}

/// Re-attempt a failed unit of work as a fresh job.
///
/// The new job carries the source's kind, resource, and input, with
/// `retry_of` pointing back. It goes through the ordinary create path,
/// so an active exclusive job for the same resource still conflicts.
pub fn retry(ctx: &JobContext, id: Uuid) -> Result<Job, JobError> {
    let source = ctx.registry.get(id)?;
    if !source.status.is_retriable() {
        return Err(JobError::InvalidTransition {
            id,
            from: source.status,
            to: JobStatus::Pending,
        });
    }

    let job = ctx.registry.create(
        CreateJob {
            kind: source.kind,
            resource_ref: source.resource_ref,
            input: source.input,
            triggered_by: source.triggered_by,
        },
        Some(source.id),
    )?;
    ctx.supervisor.spawn(job.clone());

    tracing::info!("Job {} retried as {}", id, job.id);
    Ok(job)
}
