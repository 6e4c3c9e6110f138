//! Drive one job from selection to its terminal state.

use std::future::Future;

use mlpipe_core::types::{FileId, JobId};
use mlpipe_monitor::{JobOrchestrator, MonitorError, MonitorEvent, PipelineBackend};
use tokio::sync::broadcast::error::RecvError;

use crate::report;

/// What the binary was asked to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Start a cleaning job for an uploaded file, then watch it.
    Clean { file_id: FileId },
    /// Watch an existing job.
    Job { job_id: JobId },
    /// Watch the newest job still in flight on the backend.
    Latest,
}

impl Target {
    /// Read the target from `CLEAN_FILE_ID` / `WATCH_JOB_ID`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `CLEAN_FILE_ID` wins when both are set; with neither, the newest job in
    /// flight is followed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(file_id) = non_empty("CLEAN_FILE_ID") {
            return Self::Clean { file_id };
        }
        if let Some(job_id) = non_empty("WATCH_JOB_ID") {
            return Self::Job { job_id };
        }
        Self::Latest
    }
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { job_id: JobId },
    Failed { job_id: JobId, message: String },
    /// Stopped before the job reached a terminal state.
    Interrupted,
    /// Asked for the latest job, but every job had already finished.
    NothingInFlight,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed { .. } | Self::NothingInFlight => 0,
            Self::Failed { .. } => 1,
            Self::Interrupted => 130,
        }
    }
}

/// Select the target job and log monitor events until it completes, fails,
/// or `shutdown` resolves.
pub async fn run<B, F>(
    orchestrator: &JobOrchestrator<B>,
    target: Target,
    shutdown: F,
) -> Result<Outcome, MonitorError>
where
    B: PipelineBackend,
    F: Future<Output = ()>,
{
    let mut events = orchestrator.subscribe();

    let job_id = match target {
        Target::Clean { file_id } => orchestrator.start_cleaning(&file_id).await?,
        Target::Job { job_id } => {
            orchestrator.select_job(&job_id).await;
            job_id
        }
        Target::Latest => match orchestrator.resume_latest().await? {
            Some(job_id) => job_id,
            None => {
                tracing::info!("No job in flight; nothing to watch");
                return Ok(Outcome::NothingInFlight);
            }
        },
    };

    tokio::pin!(shutdown);

    loop {
        let received = tokio::select! {
            () = &mut shutdown => {
                tracing::info!(job_id = %job_id, "Interrupted before the job finished");
                return Ok(Outcome::Interrupted);
            }
            received = events.recv() => received,
        };

        match received {
            Ok(event) => {
                report::log_event(&event);
                match event {
                    MonitorEvent::JobCompleted { job_id, .. } => {
                        return Ok(Outcome::Completed { job_id });
                    }
                    MonitorEvent::JobFailed { job_id, message } => {
                        return Ok(Outcome::Failed { job_id, message });
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Monitor event stream lagged");
                if let Some(outcome) = settled_outcome(orchestrator).await {
                    return Ok(outcome);
                }
            }
            Err(RecvError::Closed) => return Ok(Outcome::Interrupted),
        }
    }
}

/// Terminal outcome already recorded in the view, if any.
async fn settled_outcome<B: PipelineBackend>(orchestrator: &JobOrchestrator<B>) -> Option<Outcome> {
    let view = orchestrator.view().await;
    let job_id = view.job_id?;
    if !view.terminal_handled {
        return None;
    }
    Some(match view.failure_notice {
        Some(message) => Outcome::Failed { job_id, message },
        None => Outcome::Completed { job_id },
    })
}
