//! Backend contract consumed by the watcher and orchestrator.
//!
//! [`JobSource`] is the single endpoint the watcher needs; the orchestrator
//! additionally needs [`PipelineBackend`]. Both are implemented for
//! [`PipelineApi`]; tests supply in-memory fakes.

use async_trait::async_trait;
use mlpipe_client::PipelineApi;
use mlpipe_core::files::{CleanedFile, FilePreview, UploadedFile};
use mlpipe_core::job::JobSnapshot;
use mlpipe_core::types::JobId;

use crate::error::TransportError;

/// Source of job snapshots (`GET /jobs/{id}`).
#[async_trait]
pub trait JobSource: Send + Sync + 'static {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, TransportError>;
}

/// Everything the orchestrator asks of the backend.
///
/// Collection and preview calls are opaque fetch-and-replace reads.
#[async_trait]
pub trait PipelineBackend: JobSource {
    /// Start a cleaning job for an uploaded file and return its id.
    async fn start_clean_job(&self, file_id: &str) -> Result<JobId, TransportError>;

    /// Jobs for one file, newest first.
    async fn jobs_for_file(&self, file_id: &str) -> Result<Vec<JobSnapshot>, TransportError>;

    /// Every job the backend knows about, newest first.
    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, TransportError>;

    /// Remove a job record. A running job keeps running.
    async fn delete_job(&self, job_id: &str) -> Result<(), TransportError>;

    async fn uploaded_files(&self) -> Result<Vec<UploadedFile>, TransportError>;

    async fn cleaned_files(&self) -> Result<Vec<CleanedFile>, TransportError>;

    /// Preview of the job's input file.
    async fn preview_source(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, TransportError>;

    /// Preview of the job's output file.
    async fn preview_output(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, TransportError>;
}

#[async_trait]
impl JobSource for PipelineApi {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, TransportError> {
        Ok(self.get_job(job_id).await?)
    }
}

#[async_trait]
impl PipelineBackend for PipelineApi {
    async fn start_clean_job(&self, file_id: &str) -> Result<JobId, TransportError> {
        Ok(PipelineApi::start_clean_job(self, file_id).await?.job_id)
    }

    async fn jobs_for_file(&self, file_id: &str) -> Result<Vec<JobSnapshot>, TransportError> {
        Ok(self.list_jobs_for_file(file_id).await?)
    }

    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, TransportError> {
        Ok(PipelineApi::list_jobs(self).await?)
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), TransportError> {
        Ok(PipelineApi::delete_job(self, job_id).await?)
    }

    async fn uploaded_files(&self) -> Result<Vec<UploadedFile>, TransportError> {
        Ok(PipelineApi::uploaded_files(self).await?)
    }

    async fn cleaned_files(&self) -> Result<Vec<CleanedFile>, TransportError> {
        Ok(PipelineApi::cleaned_files(self).await?)
    }

    async fn preview_source(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, TransportError> {
        Ok(self.preview_file(filename, limit).await?)
    }

    async fn preview_output(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, TransportError> {
        Ok(self.preview_cleaned(filename, limit).await?)
    }
}
