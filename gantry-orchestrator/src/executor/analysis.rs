//! AI failure-analysis executor
//!
//! Asks an analysis provider to explain a failed report. The provider is
//! reached over HTTP; its error bodies (rate limiting included) are
//! surfaced verbatim in the job's error message so the user sees exactly
//! what the provider said.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use gantry_core::domain::job::Job;
use gantry_core::domain::payload::{AiAnalyzeParams, Analysis};

use super::{ExecuteError, JobExecutor};

pub struct AiAnalyzeExecutor {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AiAnalyzeExecutor {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    model: &'a str,
    report_ref: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    text: String,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl JobExecutor for AiAnalyzeExecutor {
    async fn execute(
        &self,
        job: &Job,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ExecuteError> {
        let params: AiAnalyzeParams = serde_json::from_value(job.input.clone())
            .map_err(|e| ExecuteError::Infra(format!("invalid ai_analyze input: {e}")))?;

        tracing::info!("Requesting analysis for report {} (job {})", job.resource_ref, job.id);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&AnalysisRequest {
                model: &self.model,
                report_ref: &job.resource_ref,
                provider: params.provider.as_deref(),
            })
            .send()
            .await
            .map_err(|e| ExecuteError::Infra(format!("analysis provider unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // The provider's message, verbatim, is what the user retries on.
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| format!("provider returned {status}"));
            return Err(ExecuteError::Failed(body));
        }

        let parsed: AnalysisResponse = response.json().await.map_err(|e| {
            ExecuteError::Infra(format!("failed to parse provider response: {e}"))
        })?;

        let usage = parsed.usage.unwrap_or_default();
        let analysis = Analysis {
            text: parsed.text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        };
        serde_json::to_value(analysis).map_err(|e| ExecuteError::Infra(e.to_string()))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
