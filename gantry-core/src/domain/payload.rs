//! Typed per-kind input and result payloads
//!
//! The registry stores `input` and `result` as opaque JSON; these are
//! the shapes the executors read and write through that opacity.

use serde::{Deserialize, Serialize};

/// Parameters for a test-suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Suite path relative to the repository root, e.g. `tests/basic.robot`.
    pub target: String,
}

/// Outcome of a completed test-suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    /// Directory holding the runner's output artifacts, when captured.
    pub output_dir: Option<String>,
}

/// Parameters for a package installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInstallParams {
    pub name: String,
    /// Pin to a specific version; latest when absent.
    pub version: Option<String>,
}

/// Outcome of a completed package installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub installed_version: String,
}

/// Parameters for a container-image build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerBuildParams {
    pub image_tag: String,
    /// Dockerfile path relative to the environment's build context.
    pub dockerfile: Option<String>,
}

/// Outcome of a completed image build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltImage {
    pub image_tag: String,
}

/// Parameters for an AI failure analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalyzeParams {
    /// Provider identifier; the orchestrator's default when absent.
    pub provider: Option<String>,
}

/// Outcome of a completed analysis: the provider's text plus token usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}
