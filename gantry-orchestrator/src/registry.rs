//! Job Registry
//!
//! The single source of truth for job existence and status. Constructed
//! once per process and injected into every other component; nothing
//! else is permitted to mutate a job record.
//!
//! All transitions are serialized under one lock, and the exclusivity
//! check for resource-exclusive kinds happens in the same critical
//! section as the insert, so two concurrent `create` calls can never
//! both observe "no active job" for the same key.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use gantry_core::domain::error::JobError;
use gantry_core::domain::job::{Job, JobStatus};
use gantry_core::dto::job::{CreateJob, JobFilter};

/// Snapshot notification emitted after every registry mutation.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job: Job,
    /// `None` for creation, the prior status for transitions.
    pub previous: Option<JobStatus>,
}

/// What a transition carries into the job record.
///
/// The registry only honors `Result` on the edge into `completed` and
/// `ErrorMessage` on edges into `failed`/`error`/`timed_out`.
#[derive(Debug, Clone)]
pub enum Outcome {
    None,
    Result(serde_json::Value),
    ErrorMessage(String),
}

pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, Job>>,
    events: broadcast::Sender<JobEvent>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            jobs: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to job lifecycle notifications.
    ///
    /// Lossy under backpressure (broadcast semantics); the authoritative
    /// state is always `get`/`list`.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Allocate a new pending job.
    ///
    /// Fails with `Validation` if the input does not match the kind, and
    /// with `Conflict` if an active job already holds the exclusivity
    /// key. `retry_of` is set by the retry path only.
    pub fn create(&self, req: CreateJob, retry_of: Option<Uuid>) -> Result<Job, JobError> {
        if req.resource_ref.is_empty() {
            return Err(JobError::Validation("resource_ref must not be empty".into()));
        }
        if req.triggered_by.is_empty() {
            return Err(JobError::Validation("triggered_by must not be empty".into()));
        }
        req.kind
            .validate_input(&req.input)
            .map_err(JobError::Validation)?;

        let mut jobs = self.jobs.lock().unwrap();

        // Check-then-insert under the same lock.
        if let Some(key) = req.kind.exclusivity_key(&req.resource_ref, &req.input) {
            let occupied = jobs.values().any(|j| {
                j.is_active()
                    && j.kind.exclusivity_key(&j.resource_ref, &j.input).as_deref()
                        == Some(key.as_str())
            });
            if occupied {
                return Err(JobError::Conflict {
                    kind: req.kind,
                    resource_ref: req.resource_ref,
                });
            }
        }

        let job = Job {
            id: Uuid::new_v4(),
            kind: req.kind,
            resource_ref: req.resource_ref,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            input: req.input,
            result: None,
            error_message: None,
            triggered_by: req.triggered_by,
            retry_of,
        };
        jobs.insert(job.id, job.clone());
        drop(jobs);

        tracing::info!(
            "Job {} created: kind={} resource={}",
            job.id,
            job.kind,
            job.resource_ref
        );
        let _ = self.events.send(JobEvent {
            job: job.clone(),
            previous: None,
        });

        Ok(job)
    }

    pub fn get(&self, id: Uuid) -> Result<Job, JobError> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    /// List jobs matching the filter, most recent first.
    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matched
    }

    /// Number of pending/running jobs matching the filter.
    pub fn active_count(&self, filter: &JobFilter) -> usize {
        let jobs = self.jobs.lock().unwrap();
        jobs.values()
            .filter(|j| j.is_active() && filter.matches(j))
            .count()
    }

    /// The only mutator. Enforces the state machine, stamps timestamps,
    /// and records the outcome on the appropriate edges.
    pub fn transition(
        &self,
        id: Uuid,
        new_status: JobStatus,
        outcome: Outcome,
    ) -> Result<Job, JobError> {
        let (job, previous) = {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
            let previous = Self::apply(job, new_status, outcome)?;
            (job.clone(), previous)
        };

        tracing::info!("Job {} transitioned: {} -> {}", id, previous, new_status);
        let _ = self.events.send(JobEvent {
            job: job.clone(),
            previous: Some(previous),
        });
        Ok(job)
    }

    /// Cancel a job only if it is still pending.
    ///
    /// Decides the pending-vs-running race under the registry lock:
    /// returns the cancelled job if it never started, `None` if it is
    /// running (the worker must acknowledge), and `InvalidTransition`
    /// if it is already terminal.
    pub fn cancel_pending(&self, id: Uuid) -> Result<Option<Job>, JobError> {
        let (job, previous) = {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
            match job.status {
                JobStatus::Pending => {
                    let previous = Self::apply(job, JobStatus::Cancelled, Outcome::None)?;
                    (job.clone(), previous)
                }
                JobStatus::Running => return Ok(None),
                from => {
                    return Err(JobError::InvalidTransition {
                        id,
                        from,
                        to: JobStatus::Cancelled,
                    });
                }
            }
        };

        tracing::info!("Job {} cancelled before start", id);
        let _ = self.events.send(JobEvent {
            job: job.clone(),
            previous: Some(previous),
        });
        Ok(Some(job))
    }

    fn apply(job: &mut Job, new_status: JobStatus, outcome: Outcome) -> Result<JobStatus, JobError> {
        if !job.status.can_transition_to(new_status) {
            return Err(JobError::InvalidTransition {
                id: job.id,
                from: job.status,
                to: new_status,
            });
        }

        let previous = job.status;
        job.status = new_status;

        let now = Utc::now();
        if new_status == JobStatus::Running {
            job.started_at = Some(now);
        }
        if new_status.is_terminal() {
            job.completed_at = Some(now);
        }

        match outcome {
            Outcome::Result(value) if new_status == JobStatus::Completed => {
                job.result = Some(value);
            }
            Outcome::ErrorMessage(message)
                if matches!(
                    new_status,
                    JobStatus::Failed | JobStatus::Error | JobStatus::TimedOut
                ) =>
            {
                job.error_message = Some(message);
            }
            _ => {}
        }

        Ok(previous)
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::job::JobKind;
    use serde_json::json;

    fn create_req(kind: JobKind, resource: &str, input: serde_json::Value) -> CreateJob {
        CreateJob {
            kind,
            resource_ref: resource.to_string(),
            input,
            triggered_by: "user1".to_string(),
        }
    }

    fn install_req(env: &str, package: &str) -> CreateJob {
        create_req(JobKind::PackageInstall, env, json!({"name": package}))
    }

    #[test]
    fn create_starts_pending() {
        let registry = JobRegistry::new();
        let job = registry.create(install_req("env42", "Browser"), None).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(registry.get(job.id).unwrap().id, job.id);
    }

    #[test]
    fn create_rejects_bad_input() {
        let registry = JobRegistry::new();
        let err = registry
            .create(create_req(JobKind::Run, "repo1", json!({})), None)
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
        assert!(registry.list(&JobFilter::default()).is_empty());
    }

    #[test]
    fn exclusive_kinds_conflict_while_active() {
        let registry = JobRegistry::new();
        let first = registry.create(install_req("env42", "Browser"), None).unwrap();

        let err = registry.create(install_req("env42", "Browser"), None).unwrap_err();
        assert!(matches!(err, JobError::Conflict { .. }));

        // A different package on the same environment is a different slot.
        registry.create(install_req("env42", "requests"), None).unwrap();
        // Same package elsewhere too.
        registry.create(install_req("env7", "Browser"), None).unwrap();

        // Terminal jobs release the slot.
        registry
            .transition(first.id, JobStatus::Running, Outcome::None)
            .unwrap();
        registry
            .transition(first.id, JobStatus::Completed, Outcome::None)
            .unwrap();
        registry.create(install_req("env42", "Browser"), None).unwrap();
    }

    #[test]
    fn run_jobs_do_not_conflict() {
        let registry = JobRegistry::new();
        let input = json!({"target": "tests/basic.robot"});
        registry.create(create_req(JobKind::Run, "repo1", input.clone()), None).unwrap();
        registry.create(create_req(JobKind::Run, "repo1", input), None).unwrap();
    }

    #[test]
    fn concurrent_creates_admit_exactly_one() {
        use std::sync::Arc;

        let registry = Arc::new(JobRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.create(install_req("env42", "Browser"), None))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join())
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn transition_stamps_timestamps_and_payloads() {
        let registry = JobRegistry::new();
        let job = registry.create(install_req("env42", "Browser"), None).unwrap();

        let running = registry
            .transition(job.id, JobStatus::Running, Outcome::None)
            .unwrap();
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let done = registry
            .transition(
                job.id,
                JobStatus::Completed,
                Outcome::Result(json!({"installed_version": "18.0.0"})),
            )
            .unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(done.result.unwrap()["installed_version"], "18.0.0");
        assert!(done.error_message.is_none());
    }

    #[test]
    fn error_message_recorded_on_failure_edges() {
        let registry = JobRegistry::new();
        let job = registry.create(install_req("env42", "Browser"), None).unwrap();
        registry.transition(job.id, JobStatus::Running, Outcome::None).unwrap();
        let failed = registry
            .transition(
                job.id,
                JobStatus::Failed,
                Outcome::ErrorMessage("rate limited".into()),
            )
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("rate limited"));
        assert!(failed.result.is_none());
    }

    #[test]
    fn terminal_jobs_reject_further_transitions() {
        let registry = JobRegistry::new();
        let job = registry.create(install_req("env42", "Browser"), None).unwrap();
        registry.transition(job.id, JobStatus::Running, Outcome::None).unwrap();
        registry.transition(job.id, JobStatus::Completed, Outcome::None).unwrap();

        for to in [
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            let err = registry.transition(job.id, to, Outcome::None).unwrap_err();
            assert!(matches!(err, JobError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn illegal_edges_rejected() {
        let registry = JobRegistry::new();
        let job = registry.create(install_req("env42", "Browser"), None).unwrap();
        // pending -> completed skips running
        let err = registry
            .transition(job.id, JobStatus::Completed, Outcome::None)
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
    }

    #[test]
    fn list_orders_most_recent_first() {
        let registry = JobRegistry::new();
        let input = json!({"target": "tests/basic.robot"});
        let a = registry.create(create_req(JobKind::Run, "repo1", input.clone()), None).unwrap();
        let b = registry.create(create_req(JobKind::Run, "repo1", input.clone()), None).unwrap();
        let c = registry.create(create_req(JobKind::Run, "repo2", input), None).unwrap();

        let all = registry.list(&JobFilter::default());
        assert_eq!(all.len(), 3);
        assert!(all[0].created_at >= all[1].created_at);
        assert!(all[1].created_at >= all[2].created_at);

        let repo1 = registry.list(&JobFilter {
            resource_ref: Some("repo1".to_string()),
            ..Default::default()
        });
        assert_eq!(repo1.len(), 2);
        assert!(repo1.iter().all(|j| j.resource_ref == "repo1"));
        assert!(repo1.iter().any(|j| j.id == a.id));
        assert!(repo1.iter().any(|j| j.id == b.id));
        assert!(!repo1.iter().any(|j| j.id == c.id));
    }

    #[test]
    fn cancel_pending_decides_the_race() {
        let registry = JobRegistry::new();
        let job = registry.create(install_req("env42", "Browser"), None).unwrap();

        let cancelled = registry.cancel_pending(job.id).unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        // Terminal now: a second cancel is invalid.
        let err = registry.cancel_pending(job.id).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));

        // Running jobs are left to the worker.
        let other = registry.create(install_req("env42", "Browser"), None).unwrap();
        registry.transition(other.id, JobStatus::Running, Outcome::None).unwrap();
        assert!(registry.cancel_pending(other.id).unwrap().is_none());
    }

    #[test]
    fn subscribe_sees_transitions() {
        let registry = JobRegistry::new();
        let mut events = registry.subscribe();

        let job = registry.create(install_req("env42", "Browser"), None).unwrap();
        registry.transition(job.id, JobStatus::Running, Outcome::None).unwrap();

        let created = events.try_recv().unwrap();
        assert!(created.previous.is_none());
        let started = events.try_recv().unwrap();
        assert_eq!(started.previous, Some(JobStatus::Pending));
        assert_eq!(started.job.status, JobStatus::Running);
    }

    #[test]
    fn active_count_tracks_lifecycle() {
        let registry = JobRegistry::new();
        let filter = JobFilter {
            resource_ref: Some("env42".to_string()),
            ..Default::default()
        };
        assert_eq!(registry.active_count(&filter), 0);

        let job = registry.create(install_req("env42", "Browser"), None).unwrap();
        assert_eq!(registry.active_count(&filter), 1);

        registry.transition(job.id, JobStatus::Running, Outcome::None).unwrap();
        assert_eq!(registry.active_count(&filter), 1);

        registry.transition(job.id, JobStatus::Completed, Outcome::None).unwrap();
        assert_eq!(registry.active_count(&filter), 0);
    }
}
