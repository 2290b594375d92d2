//! Package installation executor
//!
//! Installs or upgrades a library into an environment using the
//! environment's own pip. The installed version reported back comes from
//! pip's own output, falling back to the requested pin.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use gantry_core::domain::job::Job;
use gantry_core::domain::payload::{InstalledPackage, PackageInstallParams};

use super::{ExecuteError, JobExecutor, output_tail};

pub struct PackageInstallExecutor {
    /// Name of the pip binary inside each environment, e.g. `pip`.
    pip_command: String,
    /// Root under which each environment lives.
    environments_base: PathBuf,
    timeout: Duration,
}

impl PackageInstallExecutor {
    pub fn new(pip_command: String, environments_base: PathBuf, timeout: Duration) -> Self {
        Self {
            pip_command,
            environments_base,
            timeout,
        }
    }
}

#[async_trait]
impl JobExecutor for PackageInstallExecutor {
    async fn execute(
        &self,
        job: &Job,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ExecuteError> {
        let params: PackageInstallParams = serde_json::from_value(job.input.clone())
            .map_err(|e| ExecuteError::Infra(format!("invalid package_install input: {e}")))?;

        let spec = match &params.version {
            Some(version) => format!("{}=={}", params.name, version),
            None => params.name.clone(),
        };
        let pip = self
            .environments_base
            .join(&job.resource_ref)
            .join("bin")
            .join(&self.pip_command);

        tracing::info!(
            "Installing {} into environment {} (job {})",
            spec,
            job.resource_ref,
            job.id
        );

        let output = Command::new(&pip)
            .arg("install")
            .arg("--upgrade")
            .arg(&spec)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExecuteError::Infra(format!("failed to spawn {}: {e}", pip.display()))
            })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let installed_version = parse_installed_version(&stdout, &params.name)
                .or(params.version.clone())
                .unwrap_or_else(|| "unchanged".to_string());
            let installed = InstalledPackage {
                name: params.name,
                installed_version,
            };
            serde_json::to_value(installed).map_err(|e| ExecuteError::Infra(e.to_string()))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExecuteError::Failed(format!(
                "pip install {} failed: {}",
                spec,
                output_tail(&stderr, 20)
            )))
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Reads the version out of pip's `Successfully installed pkg-1.2.3`
/// line. Package names are compared in pip's normalized form.
fn parse_installed_version(stdout: &str, package: &str) -> Option<String> {
    let prefix = format!("{}-", package.to_ascii_lowercase().replace('_', "-"));
    for line in stdout.lines() {
        let Some(rest) = line.trim().strip_prefix("Successfully installed ") else {
            continue;
        };
        for entry in rest.split_whitespace() {
            let normalized = entry.to_ascii_lowercase().replace('_', "-");
            if let Some(version) = normalized.strip_prefix(&prefix) {
                return Some(version.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_version_from_install_output() {
        let stdout = "\
Collecting Browser==18.0.0
Installing collected packages: Browser
Successfully installed Browser-18.0.0
";
        assert_eq!(
            parse_installed_version(stdout, "Browser").as_deref(),
            Some("18.0.0")
        );
    }

    #[test]
    fn finds_the_target_among_dependencies() {
        let stdout = "Successfully installed grpcio-1.62.0 robot_framework-7.0 wrapt-1.16.0\n";
        assert_eq!(
            parse_installed_version(stdout, "robot-framework").as_deref(),
            Some("7.0")
        );
    }

    #[test]
    fn absent_when_nothing_was_installed() {
        let stdout = "Requirement already satisfied: Browser in ./lib/python3.12/site-packages\n";
        assert_eq!(parse_installed_version(stdout, "Browser"), None);
    }
}
