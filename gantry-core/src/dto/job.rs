//! Job DTOs for the orchestrator API

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobKind, JobStatus};

/// Request to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub kind: JobKind,
    pub resource_ref: String,
    /// Kind-specific parameters, validated against the kind at create time.
    #[serde(default)]
    pub input: serde_json::Value,
    pub triggered_by: String,
}

/// Listing filter. All fields are conjunctive; absent fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    pub resource_ref: Option<String>,
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.resource_ref
            .as_deref()
            .is_none_or(|r| r == job.resource_ref)
            && self.kind.is_none_or(|k| k == job.kind)
            && self.status.is_none_or(|s| s == job.status)
    }
}

/// Scope for bulk cancellation. All fields are conjunctive; an empty
/// scope matches every active job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelScope {
    pub triggered_by: Option<String>,
    pub resource_ref: Option<String>,
    pub kind: Option<JobKind>,
}

impl CancelScope {
    pub fn matches(&self, job: &Job) -> bool {
        self.triggered_by
            .as_deref()
            .is_none_or(|t| t == job.triggered_by)
            && self
                .resource_ref
                .as_deref()
                .is_none_or(|r| r == job.resource_ref)
            && self.kind.is_none_or(|k| k == job.kind)
    }
}

/// Response to a bulk cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAllResponse {
    /// Jobs actually moved toward `cancelled` by this request.
    pub cancelled: usize,
}
