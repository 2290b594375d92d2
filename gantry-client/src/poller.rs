//! Status poller
//!
//! Bridges the orchestrator's pull-based status API to callers that want
//! to react to transitions without busy-waiting. Polling start/stop is a
//! first-class operation: a watch is a spawned loop with its own
//! cancellation token, not an ambient timer.
//!
//! The poller is strictly read-only. Its ceiling stops *observation*
//! only; stopping the underlying job is always an explicit cancel call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use gantry_core::domain::job::Job;
use gantry_core::dto::job::JobFilter;

use crate::OrchestratorClient;
use crate::error::Result;

/// Read-only view of job status.
///
/// Implemented by [`OrchestratorClient`]; watch loops depend only on
/// this, so they can be exercised against an in-process source.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn fetch_job(&self, id: Uuid) -> Result<Job>;
    async fn fetch_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;
}

#[async_trait]
impl StatusSource for OrchestratorClient {
    async fn fetch_job(&self, id: Uuid) -> Result<Job> {
        self.get_job(id).await
    }

    async fn fetch_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.list_jobs(filter).await
    }
}

/// Polling cadence and lifetime bounds.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between observations.
    pub interval: Duration,
    /// Hard wall-clock stop for observation, used to bound polling of
    /// jobs whose backend may never report a terminal state.
    pub ceiling: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            ceiling: None,
        }
    }
}

impl PollerConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ceiling: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = Some(ceiling);
        self
    }
}

/// Handle to a single-job watch loop.
///
/// Snapshots arrive through [`recv`](Self::recv); the channel closes
/// after the first terminal snapshot, an explicit [`stop`](Self::stop),
/// or the ceiling.
pub struct JobWatch {
    rx: mpsc::Receiver<Job>,
    stop: CancellationToken,
}

impl JobWatch {
    /// Next observed snapshot, or `None` once the watch has ended.
    pub async fn recv(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    /// End the watch. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

/// Handle to a scope watch loop.
///
/// Each tick emits the full set of jobs matching the filter. When the
/// scope has no active jobs left the loop parks and issues no further
/// requests until [`wake`](Self::wake).
pub struct ScopeWatch {
    rx: mpsc::Receiver<Vec<Job>>,
    stop: CancellationToken,
    wake: Arc<Notify>,
}

impl ScopeWatch {
    pub async fn recv(&mut self) -> Option<Vec<Job>> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Re-arm a parked watch. Callers invoke this after submitting new
    /// work into the scope, so polling resumes within one interval.
    pub fn wake(&self) {
        self.wake.notify_one();
    }
}

/// Watch a single job until it reaches a terminal state.
pub fn watch_job<S: StatusSource>(source: Arc<S>, id: Uuid, config: PollerConfig) -> JobWatch {
    let (tx, rx) = mpsc::channel(16);
    let stop = CancellationToken::new();
    let token = stop.clone();

    tokio::spawn(async move {
        let deadline = config.ceiling.map(|c| Instant::now() + c);
        let mut ticker = time::interval(config.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ceiling_elapsed(deadline) => {
                    debug!("Watch ceiling reached for job {}", id);
                    break;
                }
                _ = ticker.tick() => {}
            }

            match source.fetch_job(id).await {
                Ok(job) => {
                    let terminal = job.status.is_terminal();
                    if tx.send(job).await.is_err() {
                        break;
                    }
                    if terminal {
                        debug!("Job {} reached a terminal state; watch done", id);
                        break;
                    }
                }
                // Transient; the next tick retries.
                Err(err) => warn!("Failed to poll job {}: {}", id, err),
            }
        }
    });

    JobWatch { rx, stop }
}

/// Watch all jobs matching a filter, parking while the scope is quiet.
pub fn watch_scope<S: StatusSource>(
    source: Arc<S>,
    filter: JobFilter,
    config: PollerConfig,
) -> ScopeWatch {
    let (tx, rx) = mpsc::channel(16);
    let stop = CancellationToken::new();
    let token = stop.clone();
    let wake = Arc::new(Notify::new());
    let notify = Arc::clone(&wake);

    tokio::spawn(async move {
        let deadline = config.ceiling.map(|c| Instant::now() + c);
        let mut ticker = time::interval(config.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ceiling_elapsed(deadline) => {
                    debug!("Watch ceiling reached for scope");
                    break;
                }
                _ = ticker.tick() => {}
            }

            match source.fetch_jobs(&filter).await {
                Ok(jobs) => {
                    let active = jobs.iter().filter(|j| j.is_active()).count();
                    if tx.send(jobs).await.is_err() {
                        break;
                    }
                    if active == 0 {
                        debug!("Scope quiet; polling parked");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = ceiling_elapsed(deadline) => break,
                            _ = notify.notified() => ticker.reset(),
                        }
                    }
                }
                Err(err) => warn!("Failed to poll scope: {}", err),
            }
        }
    });

    ScopeWatch { rx, stop, wake }
}

async fn ceiling_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use serde_json::json;

    use gantry_core::domain::job::{JobKind, JobStatus};

    fn job(status: JobStatus) -> Job {
        Job {
            id: Uuid::new_v4(),
            kind: JobKind::Run,
            resource_ref: "repo1".to_string(),
            status,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            input: json!({"target": "tests/basic.robot"}),
            result: None,
            error_message: None,
            triggered_by: "user1".to_string(),
            retry_of: None,
        }
    }

    /// Source that replays a scripted status sequence for one job and
    /// serves a mutable job set for scope watches.
    struct FakeSource {
        script: Mutex<VecDeque<JobStatus>>,
        current: Mutex<Job>,
        scope_jobs: Mutex<Vec<Job>>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn scripted(statuses: Vec<JobStatus>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(statuses.into()),
                current: Mutex::new(job(JobStatus::Pending)),
                scope_jobs: Mutex::new(Vec::new()),
                fetches: AtomicUsize::new(0),
            })
        }

        fn with_scope(jobs: Vec<Job>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                current: Mutex::new(job(JobStatus::Pending)),
                scope_jobs: Mutex::new(jobs),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn set_scope(&self, jobs: Vec<Job>) {
            *self.scope_jobs.lock().unwrap() = jobs;
        }
    }

    #[async_trait]
    impl StatusSource for FakeSource {
        async fn fetch_job(&self, _id: Uuid) -> Result<Job> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut current = self.current.lock().unwrap();
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                current.status = next;
            }
            Ok(current.clone())
        }

        async fn fetch_jobs(&self, _filter: &JobFilter) -> Result<Vec<Job>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.scope_jobs.lock().unwrap().clone())
        }
    }

    fn fast() -> PollerConfig {
        PollerConfig::with_interval(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn job_watch_emits_final_terminal_snapshot_then_stops() {
        let source = FakeSource::scripted(vec![
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
        ]);
        let mut watch = watch_job(Arc::clone(&source), Uuid::new_v4(), fast());

        let mut seen = Vec::new();
        while let Some(snapshot) = watch.recv().await {
            seen.push(snapshot.status);
        }
        assert_eq!(
            seen,
            vec![JobStatus::Pending, JobStatus::Running, JobStatus::Completed]
        );

        // No further observation of a settled job.
        let fetched = source.fetch_count();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetch_count(), fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn job_watch_honors_explicit_stop() {
        let source = FakeSource::scripted(vec![JobStatus::Running]);
        let mut watch = watch_job(Arc::clone(&source), Uuid::new_v4(), fast());

        let first = watch.recv().await.unwrap();
        assert_eq!(first.status, JobStatus::Running);

        watch.stop();
        while watch.recv().await.is_some() {}

        let fetched = source.fetch_count();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetch_count(), fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn job_watch_ceiling_bounds_observation() {
        // The job never settles; the ceiling must end the watch anyway.
        let source = FakeSource::scripted(vec![JobStatus::Running]);
        let config = fast().with_ceiling(Duration::from_secs(12));
        let mut watch = watch_job(Arc::clone(&source), Uuid::new_v4(), config);

        let mut snapshots = 0;
        while watch.recv().await.is_some() {
            snapshots += 1;
        }
        // Ticks at 0s, 5s, 10s; the ceiling fires before 15s.
        assert!(snapshots <= 3, "saw {snapshots} snapshots");

        let fetched = source.fetch_count();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetch_count(), fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn job_watch_retries_after_transient_errors() {
        struct Flaky {
            fetches: AtomicUsize,
        }

        #[async_trait]
        impl StatusSource for Flaky {
            async fn fetch_job(&self, _id: Uuid) -> Result<Job> {
                let n = self.fetches.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(crate::ClientError::ParseError("truncated body".into()))
                } else {
                    Ok(job(JobStatus::Completed))
                }
            }

            async fn fetch_jobs(&self, _filter: &JobFilter) -> Result<Vec<Job>> {
                Ok(Vec::new())
            }
        }

        let source = Arc::new(Flaky {
            fetches: AtomicUsize::new(0),
        });
        let mut watch = watch_job(source, Uuid::new_v4(), fast());

        let snapshot = watch.recv().await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert!(watch.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scope_watch_parks_when_quiet_and_wakes_on_demand() {
        let active = job(JobStatus::Running);
        let source = FakeSource::with_scope(vec![active.clone()]);
        let mut watch = watch_scope(Arc::clone(&source), JobFilter::default(), fast());

        let first = watch.recv().await.unwrap();
        assert_eq!(first.len(), 1);

        // The scope drains; the next snapshot has no active jobs and
        // the watcher parks.
        let mut settled = active;
        settled.status = JobStatus::Completed;
        source.set_scope(vec![settled]);

        let second = watch.recv().await.unwrap();
        assert!(second.iter().all(|j| !j.is_active()));

        let fetched = source.fetch_count();
        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.fetch_count(), fetched, "parked watch kept polling");

        // New work appears; one wake resumes polling within an interval.
        source.set_scope(vec![job(JobStatus::Pending)]);
        watch.wake();

        let resumed = watch.recv().await.unwrap();
        assert_eq!(resumed.iter().filter(|j| j.is_active()).count(), 1);
        assert!(source.fetch_count() > fetched);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_watch_parks_immediately_on_empty_scope() {
        let source = FakeSource::with_scope(Vec::new());
        let mut watch = watch_scope(Arc::clone(&source), JobFilter::default(), fast());

        assert!(watch.recv().await.unwrap().is_empty());

        let fetched = source.fetch_count();
        assert_eq!(fetched, 1);
        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.fetch_count(), fetched);

        watch.stop();
        assert!(watch.recv().await.is_none());
    }
}
