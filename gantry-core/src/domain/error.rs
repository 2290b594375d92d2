//! Domain error types
//!
//! Synchronous failures of registry operations. Asynchronous outcomes
//! (a job failing, erroring, or timing out) are never errors on this
//! surface; they are recorded on the job itself.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::job::{JobKind, JobStatus};

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    /// An active exclusive job already holds the target resource.
    #[error("an active {kind} job already exists for {resource_ref}")]
    Conflict { kind: JobKind, resource_ref: String },

    /// The requested operation is not valid for the job's current status.
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// Malformed input at create time; no job was allocated.
    #[error("{0}")]
    Validation(String),
}
