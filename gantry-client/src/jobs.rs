//! Job-related API endpoints

use uuid::Uuid;

use gantry_core::domain::job::Job;
use gantry_core::dto::job::{CancelAllResponse, CancelScope, CreateJob, JobFilter};

use crate::OrchestratorClient;
use crate::error::Result;

impl OrchestratorClient {
    /// Create a new job
    ///
    /// Returns the job in `pending`; completion is observed by polling.
    pub async fn create_job(&self, req: CreateJob) -> Result<Job> {
        let url = format!("{}/job/create", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/job/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List jobs, most recent first, filtered by resource/kind/status
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let url = format!("{}/job/list", self.base_url);
        let response = self.client.get(&url).query(filter).send().await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a job
    ///
    /// The returned snapshot may still read `running` while the worker
    /// tears down; poll for the `cancelled` transition.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/job/{}/cancel", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel every active job matching the scope
    ///
    /// Returns the count actually cancelled.
    pub async fn cancel_all(&self, scope: &CancelScope) -> Result<CancelAllResponse> {
        let url = format!("{}/job/cancel-all", self.base_url);
        let response = self.client.post(&url).json(scope).send().await?;

        self.handle_response(response).await
    }

    /// Re-submit a failed job's inputs as a new job
    pub async fn retry_job(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/job/{}/retry", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}
