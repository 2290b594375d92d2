//! Test-suite run executor
//!
//! Spawns the external test runner against a repository checkout and
//! maps its exit into the job outcome. The runner itself is opaque: all
//! this executor knows is the convention that a zero exit means every
//! test passed and that the console summary carries the counts.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use gantry_core::domain::job::Job;
use gantry_core::domain::payload::{RunOutcome, RunParams};

use super::{ExecuteError, JobExecutor, output_tail};

pub struct RunExecutor {
    /// Test runner binary, e.g. `robot`.
    command: String,
    /// Root under which each repository's checkout lives.
    workspace_base: PathBuf,
    timeout: Duration,
}

impl RunExecutor {
    pub fn new(command: String, workspace_base: PathBuf, timeout: Duration) -> Self {
        Self {
            command,
            workspace_base,
            timeout,
        }
    }
}

#[async_trait]
impl JobExecutor for RunExecutor {
    async fn execute(
        &self,
        job: &Job,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ExecuteError> {
        let params: RunParams = serde_json::from_value(job.input.clone())
            .map_err(|e| ExecuteError::Infra(format!("invalid run input: {e}")))?;

        let checkout = self.workspace_base.join(&job.resource_ref);
        let output_dir = checkout.join("results").join(job.id.to_string());

        tracing::info!(
            "Running suite {} for repository {} (job {})",
            params.target,
            job.resource_ref,
            job.id
        );

        let output = Command::new(&self.command)
            .arg("--outputdir")
            .arg(&output_dir)
            .arg(&params.target)
            .current_dir(&checkout)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExecuteError::Infra(format!("failed to spawn {}: {e}", self.command))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let summary = parse_summary(&stdout);

        if output.status.success() {
            let mut outcome = summary.unwrap_or(RunOutcome {
                total: 0,
                passed: 0,
                failed: 0,
                output_dir: None,
            });
            outcome.output_dir = Some(output_dir.to_string_lossy().into_owned());
            serde_json::to_value(outcome).map_err(|e| ExecuteError::Infra(e.to_string()))
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            let message = match summary {
                Some(s) if s.failed > 0 => format!("{} of {} tests failed", s.failed, s.total),
                _ => format!(
                    "test runner exited with {}: {}",
                    exit_code,
                    output_tail(&stderr, 20)
                ),
            };
            Err(ExecuteError::Failed(message))
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Pulls the `N tests, N passed, N failed` counts out of the runner's
/// console summary. Scans from the bottom, where the suite totals are.
fn parse_summary(stdout: &str) -> Option<RunOutcome> {
    for line in stdout.lines().rev() {
        let mut total = None;
        let mut passed = None;
        let mut failed = None;
        for part in line.split(',') {
            let mut words = part.split_whitespace();
            let (Some(count), Some(label)) = (words.next(), words.next()) else {
                continue;
            };
            let Ok(count) = count.parse::<u32>() else {
                continue;
            };
            match label.trim_end_matches('.') {
                "test" | "tests" => total = Some(count),
                "passed" => passed = Some(count),
                "failed" => failed = Some(count),
                _ => {}
            }
        }
        if let (Some(total), Some(passed), Some(failed)) = (total, passed, failed) {
            return Some(RunOutcome {
                total,
                passed,
                failed,
                output_dir: None,
            });
        }
    }
    None
}
