//! Job Executor
//!
//! One executor per job kind, all implementing the same contract. The
//! supervisor owns the dispatch table and drives each job through the
//! registry: one spawned task per active job, exactly one terminal
//! transition per job, ever.

pub mod analysis;
pub mod docker;
pub mod package;
pub mod run;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use gantry_core::domain::job::{Job, JobKind, JobStatus};

use crate::registry::{JobRegistry, Outcome};

/// How a unit of work ended short of success.
#[derive(Debug)]
pub enum ExecuteError {
    /// The operation ran and reported a domain-level failure (tests
    /// failed, install rejected, provider returned an error). Recoverable
    /// via retry.
    Failed(String),
    /// The executor itself could not complete (process would not spawn,
    /// network unreachable). Recoverable via retry.
    Infra(String),
}

/// Contract every kind-specific executor implements.
///
/// `execute` is invoked exactly once per job, off the caller's request
/// path. The cancellation token is the teardown signal for whatever the
/// executor has in flight.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ExecuteError>;

    /// Deadline after which a running job is forced into `timed_out`.
    fn timeout(&self) -> Duration;
}

/// Dispatch table, one executor per kind.
pub struct ExecutorSet {
    pub run: Arc<dyn JobExecutor>,
    pub package_install: Arc<dyn JobExecutor>,
    pub docker_build: Arc<dyn JobExecutor>,
    pub ai_analyze: Arc<dyn JobExecutor>,
}

impl ExecutorSet {
    pub fn for_kind(&self, kind: JobKind) -> Arc<dyn JobExecutor> {
        match kind {
            JobKind::Run => Arc::clone(&self.run),
            JobKind::PackageInstall => Arc::clone(&self.package_install),
            JobKind::DockerBuild => Arc::clone(&self.docker_build),
            JobKind::AiAnalyze => Arc::clone(&self.ai_analyze),
        }
    }
}

/// Owns the worker tasks and their cancellation tokens.
///
/// The supervisor is the only writer of terminal status: workers report
/// completion, failure, timeout, and acknowledged cancellation through
/// the registry's `transition`.
pub struct ExecutorSupervisor {
    registry: Arc<JobRegistry>,
    executors: ExecutorSet,
    tokens: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl ExecutorSupervisor {
    pub fn new(registry: Arc<JobRegistry>, executors: ExecutorSet) -> Self {
        Self {
            registry,
            executors,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a worker task for a freshly created job.
    pub fn spawn(&self, job: Job) {
        let token = CancellationToken::new();
        self.tokens.lock().unwrap().insert(job.id, token.clone());

        let registry = Arc::clone(&self.registry);
        let executor = self.executors.for_kind(job.kind);
        let tokens = Arc::clone(&self.tokens);
        let id = job.id;
        tokio::spawn(async move {
            drive(&registry, executor, id, &token).await;
            tokens.lock().unwrap().remove(&id);
        });
    }

    /// Signal the worker for `id` to stop. Best effort: returns false if
    /// no worker is tracked (job already settled).
    pub fn request_cancel(&self, id: Uuid) -> bool {
        match self.tokens.lock().unwrap().get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

async fn drive(
    registry: &JobRegistry,
    executor: Arc<dyn JobExecutor>,
    id: Uuid,
    token: &CancellationToken,
) {
    // Claim the job. A failure here means it was cancelled while still
    // pending; the worker stands down without touching it.
    let job = match registry.transition(id, JobStatus::Running, Outcome::None) {
        Ok(job) => job,
        Err(err) => {
            tracing::debug!("Job {} never started: {}", id, err);
            return;
        }
    };

    let deadline = executor.timeout();
    let execution = executor.execute(&job, token);
    tokio::pin!(execution);

    let (status, outcome) = tokio::select! {
        _ = token.cancelled() => (JobStatus::Cancelled, Outcome::None),
        finished = tokio::time::timeout(deadline, &mut execution) => match finished {
            Ok(Ok(result)) => (JobStatus::Completed, Outcome::Result(result)),
            Ok(Err(ExecuteError::Failed(message))) => {
                (JobStatus::Failed, Outcome::ErrorMessage(message))
            }
            Ok(Err(ExecuteError::Infra(message))) => {
                (JobStatus::Error, Outcome::ErrorMessage(message))
            }
            Err(_) => {
                // Tear down whatever the executor left in flight.
                token.cancel();
                (
                    JobStatus::TimedOut,
                    Outcome::ErrorMessage(format!(
                        "deadline of {}s exceeded",
                        deadline.as_secs()
                    )),
                )
            }
        },
    };

    if let Err(err) = registry.transition(id, status, outcome) {
        tracing::warn!("Job {} already settled: {}", id, err);
    }
}

/// Last `lines` lines of a process stream, for error messages that stay
/// readable without carrying the whole log.
pub(crate) fn output_tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
