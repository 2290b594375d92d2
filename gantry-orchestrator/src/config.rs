//! Orchestrator configuration
//!
//! All tool paths, timeouts, and provider settings are configurable via
//! environment variables so deployments can tune them without a rebuild.

use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: String,

    /// Root under which repository checkouts live.
    pub workspace_base: PathBuf,

    /// Root under which environments (and their build contexts) live.
    pub environments_base: PathBuf,

    /// Test runner binary invoked for run jobs.
    pub run_command: String,

    /// Pip binary name inside each environment.
    pub pip_command: String,

    /// Container engine binary for image builds.
    pub container_engine: String,

    /// Per-kind deadlines after which a running job is timed out.
    pub run_timeout: Duration,
    pub package_install_timeout: Duration,
    pub docker_build_timeout: Duration,
    pub ai_analyze_timeout: Duration,

    /// Analysis provider endpoint, key, and default model.
    pub analysis_endpoint: String,
    pub analysis_api_key: String,
    pub analysis_model: String,
}

impl Config {
    /// Creates configuration from environment variables, with defaults
    /// for anything unset.
    ///
    /// Recognized variables:
    /// - GANTRY_BIND_ADDR (default: 0.0.0.0:8080)
    /// - GANTRY_WORKSPACE_BASE (default: /var/lib/gantry/workspaces)
    /// - GANTRY_ENVIRONMENTS_BASE (default: /var/lib/gantry/environments)
    /// - GANTRY_RUN_COMMAND (default: robot)
    /// - GANTRY_PIP_COMMAND (default: pip)
    /// - GANTRY_CONTAINER_ENGINE (default: podman)
    /// - GANTRY_RUN_TIMEOUT (seconds, default: 3600)
    /// - GANTRY_PACKAGE_INSTALL_TIMEOUT (seconds, default: 600)
    /// - GANTRY_DOCKER_BUILD_TIMEOUT (seconds, default: 1800)
    /// - GANTRY_AI_ANALYZE_TIMEOUT (seconds, default: 120)
    /// - GANTRY_ANALYSIS_ENDPOINT (default: http://localhost:9090/v1/analyze)
    /// - GANTRY_ANALYSIS_API_KEY (default: empty)
    /// - GANTRY_ANALYSIS_MODEL (default: gpt-4o-mini)
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("GANTRY_BIND_ADDR", "0.0.0.0:8080"),
            workspace_base: PathBuf::from(env_string(
                "GANTRY_WORKSPACE_BASE",
                "/var/lib/gantry/workspaces",
            )),
            environments_base: PathBuf::from(env_string(
                "GANTRY_ENVIRONMENTS_BASE",
                "/var/lib/gantry/environments",
            )),
            run_command: env_string("GANTRY_RUN_COMMAND", "robot"),
            pip_command: env_string("GANTRY_PIP_COMMAND", "pip"),
            container_engine: env_string("GANTRY_CONTAINER_ENGINE", "podman"),
            run_timeout: env_duration("GANTRY_RUN_TIMEOUT", 3600),
            package_install_timeout: env_duration("GANTRY_PACKAGE_INSTALL_TIMEOUT", 600),
            docker_build_timeout: env_duration("GANTRY_DOCKER_BUILD_TIMEOUT", 1800),
            ai_analyze_timeout: env_duration("GANTRY_AI_ANALYZE_TIMEOUT", 120),
            analysis_endpoint: env_string(
                "GANTRY_ANALYSIS_ENDPOINT",
                "http://localhost:9090/v1/analyze",
            ),
            analysis_api_key: env_string("GANTRY_ANALYSIS_API_KEY", ""),
            analysis_model: env_string("GANTRY_ANALYSIS_MODEL", "gpt-4o-mini"),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.run_command.is_empty()
            || self.pip_command.is_empty()
            || self.container_engine.is_empty()
        {
            anyhow::bail!("tool commands cannot be empty");
        }

        for (name, timeout) in [
            ("run_timeout", self.run_timeout),
            ("package_install_timeout", self.package_install_timeout),
            ("docker_build_timeout", self.docker_build_timeout),
            ("ai_analyze_timeout", self.ai_analyze_timeout),
        ] {
            if timeout.as_secs() == 0 {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if !self.analysis_endpoint.starts_with("http://")
            && !self.analysis_endpoint.starts_with("https://")
        {
            anyhow::bail!("analysis_endpoint must start with http:// or https://");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_duration(name: &str, default_secs: u64) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(default_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::from_env();
        assert!(config.validate().is_ok());
        assert_eq!(config.package_install_timeout, Duration::from_secs(600));
        assert_eq!(config.run_command, "robot");
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::from_env();

        config.run_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
        config.run_timeout = Duration::from_secs(3600);

        config.analysis_endpoint = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.analysis_endpoint = "https://provider.example/v1/analyze".to_string();
        assert!(config.validate().is_ok());

        config.container_engine = String::new();
        assert!(config.validate().is_err());
    }
}
