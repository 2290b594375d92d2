//! Gantry HTTP Client
//!
//! A type-safe HTTP client for the Gantry orchestrator API, plus the
//! status poller that bridges the pull-based API to callers that want to
//! react to job transitions.
//!
//! # Example
//!
//! ```no_run
//! use gantry_client::OrchestratorClient;
//! use gantry_core::domain::job::JobKind;
//! use gantry_core::dto::job::CreateJob;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let job = client.create_job(CreateJob {
//!         kind: JobKind::Run,
//!         resource_ref: "repo1".to_string(),
//!         input: serde_json::json!({"target": "tests/basic.robot"}),
//!         triggered_by: "user1".to_string(),
//!     }).await?;
//!
//!     println!("Created job: {}", job.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
pub mod poller;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use poller::{JobWatch, PollerConfig, ScopeWatch, StatusSource, watch_job, watch_scope};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Gantry orchestrator API
///
/// One typed method per endpoint, shared by the CLI and any other
/// consumer of the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a client with a custom reqwest instance, for configuring
    /// timeouts, proxies, or TLS settings.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
