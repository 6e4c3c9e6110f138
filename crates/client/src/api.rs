//! REST client for the pipeline backend's data endpoints.
//!
//! Wraps the `/api/data` routes (job lookup and start, file collections,
//! CSV previews) using [`reqwest`]. Every call is a single request with no
//! retry; callers decide what a failure means.

use std::time::Duration;

use mlpipe_core::files::{CleanedFile, FilePreview, UploadedFile};
use mlpipe_core::job::JobSnapshot;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Route prefix the backend mounts its data router under.
const DATA_PREFIX: [&str; 2] = ["api", "data"];

/// HTTP client for one pipeline backend.
#[derive(Debug, Clone)]
pub struct PipelineApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response of `POST /jobs/clean-data/{file_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: String,
    pub file_id: String,
    #[serde(default)]
    pub message: String,
    /// Always `processing` on success.
    #[serde(default)]
    pub status: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Errors from the pipeline REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Pipeline API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The configured base URL cannot carry a path.
    #[error("Invalid API URL '{0}'")]
    InvalidUrl(String),
}

impl PipelineApiError {
    /// HTTP status, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidUrl(_) => None,
        }
    }
}

impl PipelineApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client whose requests give up after `timeout`.
    pub fn with_timeout(api_url: String, timeout: Duration) -> Result<Self, PipelineApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- jobs ----

    /// Fetch the current state of a job (`GET /jobs/{job_id}`).
    pub async fn get_job(&self, job_id: &str) -> Result<JobSnapshot, PipelineApiError> {
        let url = self.data_url(&["jobs", job_id])?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Start an asynchronous cleaning job for an uploaded file.
    pub async fn start_clean_job(&self, file_id: &str) -> Result<StartJobResponse, PipelineApiError> {
        let url = self.data_url(&["jobs", "clean-data", file_id])?;
        let response = self.client.post(url).send().await?;
        let started: StartJobResponse = Self::parse_response(response).await?;

        tracing::info!(
            job_id = %started.job_id,
            file_id = %started.file_id,
            "Cleaning job started",
        );

        Ok(started)
    }

    /// All jobs for one uploaded file, newest first.
    pub async fn list_jobs_for_file(
        &self,
        file_id: &str,
    ) -> Result<Vec<JobSnapshot>, PipelineApiError> {
        let url = self.data_url(&["jobs", "file", file_id])?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Every job known to the backend, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, PipelineApiError> {
        let url = self.data_url(&["jobs"])?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Remove a job record. Does not stop a running job.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), PipelineApiError> {
        let url = self.data_url(&["jobs", job_id])?;
        let response = self.client.delete(url).send().await?;
        Self::check_status(response).await
    }

    // ---- collections ----

    pub async fn uploaded_files(&self) -> Result<Vec<UploadedFile>, PipelineApiError> {
        let url = self.data_url(&["uploaded-files"])?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    pub async fn cleaned_files(&self) -> Result<Vec<CleanedFile>, PipelineApiError> {
        let url = self.data_url(&["cleaned-files"])?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    // ---- previews ----

    /// First `limit` rows of an uploaded (or cleaned) file, looked up by name.
    pub async fn preview_file(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, PipelineApiError> {
        let url = self.data_url(&["preview-file", filename])?;
        let response = self
            .client
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// First `limit` rows of a cleaned output file.
    pub async fn preview_cleaned(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, PipelineApiError> {
        let url = self.data_url(&["preview-cleaned", filename])?;
        let response = self
            .client
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- misc ----

    pub async fn health(&self) -> Result<HealthResponse, PipelineApiError> {
        let url = self.url(&["health"])?;
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Build `{api_url}/api/data/{segments...}` with each segment escaped.
    fn data_url(&self, segments: &[&str]) -> Result<Url, PipelineApiError> {
        let mut all: Vec<&str> = DATA_PREFIX.to_vec();
        all.extend_from_slice(segments);
        self.url(&all)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, PipelineApiError> {
        let mut url =
            Url::parse(&self.api_url).map_err(|_| PipelineApiError::InvalidUrl(self.api_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| PipelineApiError::InvalidUrl(self.api_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`PipelineApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PipelineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PipelineApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PipelineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), PipelineApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
