use mlpipe_client::PipelineApiError;
use mlpipe_core::error::CoreError;
use mlpipe_core::types::JobId;

/// A fetch against the backend failed (network, timeout, non-2xx, bad body).
///
/// Recovered locally: the watcher retries on its next tick and only reports
/// it through the connectivity indicator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status, when the backend answered.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<PipelineApiError> for TransportError {
    fn from(err: PipelineApiError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the job monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The backend reported the job as failed. Terminal, never retried.
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: JobId, message: String },

    /// A post-completion preview could not be loaded. Never fatal.
    #[error("Preview unavailable for '{filename}': {reason}")]
    PreviewUnavailable { filename: String, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}
