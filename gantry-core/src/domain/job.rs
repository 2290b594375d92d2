//! Job domain types
//!
//! The Job is the central entity of the system: a tracked unit of
//! asynchronous work with a typed kind, a target resource, and a
//! lifecycle status that only ever moves toward a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payload::{
    AiAnalyzeParams, DockerBuildParams, PackageInstallParams, RunParams,
};

/// Job execution record
///
/// Owned by the registry; `input` is immutable for the lifetime of the
/// job, `result` is populated only on `completed`, `error_message` only
/// on `failed`/`error`/`timed_out`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    /// Identifier of the entity the job operates on (repository id,
    /// environment id, report id).
    pub resource_ref: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Kind-specific parameters, opaque to the registry.
    pub input: serde_json::Value,
    /// Kind-specific payload, present only on successful completion.
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Identity of the initiating actor, for audit and scoped cancellation.
    pub triggered_by: String,
    /// Back-reference to the job this one retries. Chains are acyclic:
    /// every retry is a fresh job with a fresh id.
    pub retry_of: Option<Uuid>,
}

impl Job {
    /// True while the job still occupies its exclusivity slot.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// The closed set of work kinds the system knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Execute a test suite inside a repository checkout.
    Run,
    /// Install or upgrade a package into an environment.
    PackageInstall,
    /// Build a container image for an environment.
    DockerBuild,
    /// Ask an analysis provider to explain a failed report.
    AiAnalyze,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Run => "run",
            JobKind::PackageInstall => "package_install",
            JobKind::DockerBuild => "docker_build",
            JobKind::AiAnalyze => "ai_analyze",
        }
    }

    /// Key under which at most one active job may exist, or `None` for
    /// resource-shared kinds.
    ///
    /// Runs are shared: many may be active per repository. Package
    /// installs are exclusive per environment and package name, builds
    /// per environment, analyses per report.
    pub fn exclusivity_key(&self, resource_ref: &str, input: &serde_json::Value) -> Option<String> {
        match self {
            JobKind::Run => None,
            JobKind::PackageInstall => {
                let package = input.get("name").and_then(|v| v.as_str()).unwrap_or("");
                Some(format!("package_install/{resource_ref}/{package}"))
            }
            JobKind::DockerBuild => Some(format!("docker_build/{resource_ref}")),
            JobKind::AiAnalyze => Some(format!("ai_analyze/{resource_ref}")),
        }
    }

    /// Checks that `input` carries the parameters this kind requires.
    ///
    /// Rejection here means no job is ever allocated.
    pub fn validate_input(&self, input: &serde_json::Value) -> Result<(), String> {
        let checked = match self {
            JobKind::Run => serde_json::from_value::<RunParams>(input.clone()).map(|_| ()),
            JobKind::PackageInstall => {
                serde_json::from_value::<PackageInstallParams>(input.clone()).map(|_| ())
            }
            JobKind::DockerBuild => {
                serde_json::from_value::<DockerBuildParams>(input.clone()).map(|_| ())
            }
            JobKind::AiAnalyze => {
                serde_json::from_value::<AiAnalyzeParams>(input.clone()).map(|_| ())
            }
        };
        checked.map_err(|e| format!("invalid {} input: {}", self.as_str(), e))
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status
///
/// `Pending` and `Running` are the only non-terminal states; everything
/// else is terminal and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Error,
    Cancelled,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
            JobStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// The edges of the status state machine. Everything not listed is
    /// an invalid transition, including any move out of a terminal state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Error)
                | (Running, Cancelled)
                | (Running, TimedOut)
        )
    }

    /// Statuses a job must be in for a retry to be meaningful.
    pub fn is_retriable(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Error | JobStatus::TimedOut)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
