//! Container-image build executor
//!
//! Builds an environment's image with the configured container engine
//! (podman by default). The build context is the environment's directory.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use gantry_core::domain::job::Job;
use gantry_core::domain::payload::{BuiltImage, DockerBuildParams};

use super::{ExecuteError, JobExecutor, output_tail};

pub struct DockerBuildExecutor {
    /// Container engine binary, e.g. `podman`.
    engine: String,
    /// Root under which each environment's build context lives.
    environments_base: PathBuf,
    timeout: Duration,
}

impl DockerBuildExecutor {
    pub fn new(engine: String, environments_base: PathBuf, timeout: Duration) -> Self {
        Self {
            engine,
            environments_base,
            timeout,
        }
    }
}

#[async_trait]
impl JobExecutor for DockerBuildExecutor {
    async fn execute(
        &self,
        job: &Job,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ExecuteError> {
        let params: DockerBuildParams = serde_json::from_value(job.input.clone())
            .map_err(|e| ExecuteError::Infra(format!("invalid docker_build input: {e}")))?;

        let context = self.environments_base.join(&job.resource_ref);

        tracing::info!(
            "Building image {} for environment {} (job {})",
            params.image_tag,
            job.resource_ref,
            job.id
        );

        let mut command = Command::new(&self.engine);
        command.arg("build").arg("-t").arg(&params.image_tag);
        if let Some(dockerfile) = &params.dockerfile {
            command.arg("-f").arg(dockerfile);
        }
        command.arg(".").current_dir(&context).kill_on_drop(true);

        let output = command.output().await.map_err(|e| {
            ExecuteError::Infra(format!("failed to spawn {}: {e}", self.engine))
        })?;

        if output.status.success() {
            let built = BuiltImage {
                image_tag: params.image_tag,
            };
            serde_json::to_value(built).map_err(|e| ExecuteError::Infra(e.to_string()))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExecuteError::Failed(format!(
                "image build for {} failed: {}",
                params.image_tag,
                output_tail(&stderr, 20)
            )))
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
