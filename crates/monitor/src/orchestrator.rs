//! Dashboard-side coordination of the job watcher.
//!
//! The [`JobOrchestrator`] owns the watcher, turns every delivered snapshot
//! into derived step statuses, and runs the one-shot terminal reaction:
//! refreshing the file collections and loading previews when a job
//! completes, or surfacing a failure notice when it fails. All derived
//! state lives in a [`DashboardView`] behind one lock.

use std::sync::{Arc, Weak};

use mlpipe_core::files::{CleanedFile, FilePreview, UploadedFile};
use mlpipe_core::job::{JobKind, JobSnapshot, JobState};
use mlpipe_core::steps::{DerivedStep, StepCatalog};
use mlpipe_core::types::{FileId, JobId};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::PipelineBackend;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::events::{Connectivity, EventBus, MonitorEvent, PreviewSide, WatchEvent};
use crate::watcher::JobWatcher;

/// Notice shown when a failed job carries no message.
const DEFAULT_FAILURE_NOTICE: &str = "El trabajo falló";

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// State of one post-completion preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreviewSlot {
    /// Not requested (no job completed yet, or no filename in the metrics).
    #[default]
    Empty,
    Ready(FilePreview),
    Unavailable {
        reason: String,
    },
}

impl PreviewSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Everything the dashboard renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub job_id: Option<JobId>,
    pub snapshot: Option<JobSnapshot>,
    pub steps: Vec<DerivedStep>,
    /// Set once the terminal reaction for the current session has fired.
    pub terminal_handled: bool,
    pub source_preview: PreviewSlot,
    pub output_preview: PreviewSlot,
    pub failure_notice: Option<String>,
    pub connectivity: Connectivity,
    pub selected_file_id: Option<FileId>,
    pub uploaded_files: Vec<UploadedFile>,
    pub cleaned_files: Vec<CleanedFile>,
}

impl DashboardView {
    /// Drop everything derived from the current job. File selection and
    /// collections survive.
    fn reset_job(&mut self, job_id: Option<JobId>, baseline: Vec<DerivedStep>) {
        self.job_id = job_id;
        self.snapshot = None;
        self.steps = baseline;
        self.terminal_handled = false;
        self.source_preview = PreviewSlot::Empty;
        self.output_preview = PreviewSlot::Empty;
        self.failure_notice = None;
        self.connectivity = Connectivity::Online;
    }
}

struct OrchestratorState {
    /// Generation of the watch session feeding the view.
    generation: Option<u64>,
    view: DashboardView,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Connects the dashboard to the job watcher.
pub struct JobOrchestrator<B: PipelineBackend> {
    backend: Arc<B>,
    watcher: JobWatcher<B>,
    catalog: StepCatalog,
    page_kind: JobKind,
    preview_row_limit: usize,
    state: Mutex<OrchestratorState>,
    events: EventBus<MonitorEvent>,
    pump_cancel: CancellationToken,
}

impl<B: PipelineBackend> JobOrchestrator<B> {
    /// Build the orchestrator and spawn the task that feeds watcher events
    /// into it. Must be called from within a Tokio runtime.
    pub fn start(backend: Arc<B>, catalog: StepCatalog, config: &MonitorConfig) -> Arc<Self> {
        let watcher = JobWatcher::new(Arc::clone(&backend), config.poll_interval);
        let watch_events = watcher.subscribe();

        let view = DashboardView {
            steps: catalog.plan_for(&config.page_kind).all_pending(),
            ..Default::default()
        };

        let orchestrator = Arc::new(Self {
            backend,
            watcher,
            catalog,
            page_kind: config.page_kind.clone(),
            preview_row_limit: config.preview_row_limit,
            state: Mutex::new(OrchestratorState {
                generation: None,
                view,
            }),
            events: EventBus::default(),
            pump_cancel: CancellationToken::new(),
        });

        tokio::spawn(pump(
            Arc::downgrade(&orchestrator),
            watch_events,
            orchestrator.pump_cancel.clone(),
        ));

        orchestrator
    }

    // -- commands -------------------------------------------------------------

    /// Make `job_id` the current job. Reselecting the current job is a no-op.
    pub async fn select_job(&self, job_id: &str) {
        let mut state = self.state.lock().await;
        if state.view.job_id.as_deref() == Some(job_id) {
            return;
        }

        let baseline = self.baseline_steps();
        state.view.reset_job(Some(job_id.to_string()), baseline);
        state.generation = Some(self.watcher.attach(job_id).await);

        self.events.publish(MonitorEvent::JobSelected {
            job_id: job_id.to_string(),
        });
    }

    /// Stop watching and return to the all-pending baseline.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        self.watcher.detach().await;
        state.generation = None;

        let baseline = self.baseline_steps();
        state.view.reset_job(None, baseline);

        self.events.publish(MonitorEvent::JobCleared);
    }

    /// Remember the user's file selection.
    pub async fn select_file(&self, file_id: &str) {
        self.state.lock().await.view.selected_file_id = Some(file_id.to_string());
    }

    /// Start a cleaning job for `file_id` and watch it.
    pub async fn start_cleaning(&self, file_id: &str) -> Result<JobId, MonitorError> {
        let job_id = self.backend.start_clean_job(file_id).await?;
        tracing::info!(file_id, job_id = %job_id, "Cleaning job started");

        self.select_file(file_id).await;
        self.select_job(&job_id).await;
        Ok(job_id)
    }

    /// Pick up a job that is still in flight for `file_id`, newest first.
    pub async fn resume_for_file(&self, file_id: &str) -> Result<Option<JobId>, MonitorError> {
        let jobs = self.backend.jobs_for_file(file_id).await?;
        self.select_file(file_id).await;

        let Some(job) = jobs.into_iter().find(|job| !job.is_terminal()) else {
            tracing::debug!(file_id, "No job in flight for file");
            return Ok(None);
        };

        tracing::info!(file_id, job_id = %job.id, state = %job.state, "Resuming job");
        self.select_job(&job.id).await;
        Ok(Some(job.id))
    }

    /// Pick up the newest job still in flight across every file.
    pub async fn resume_latest(&self) -> Result<Option<JobId>, MonitorError> {
        let jobs = self.backend.list_jobs().await?;

        let Some(job) = jobs.into_iter().find(|job| !job.is_terminal()) else {
            tracing::debug!("No job in flight");
            return Ok(None);
        };

        tracing::info!(
            file_id = %job.source_file_id,
            job_id = %job.id,
            state = %job.state,
            "Resuming latest job",
        );
        self.select_file(&job.source_file_id).await;
        self.select_job(&job.id).await;
        Ok(Some(job.id))
    }

    /// Remove a job record from the backend. Deleting the current job clears
    /// the selection first.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), MonitorError> {
        let is_current = self.state.lock().await.view.job_id.as_deref() == Some(job_id);
        if is_current {
            self.clear().await;
        }

        self.backend.delete_job(job_id).await?;
        tracing::info!(job_id, "Job record deleted");
        Ok(())
    }

    /// Fetch both file collections and replace the cached copies.
    ///
    /// Each collection is replaced on its own, so one failing endpoint does
    /// not discard the other's result. Returns the first failure.
    pub async fn refresh_collections(&self) -> Result<(), MonitorError> {
        let (uploaded, cleaned) =
            tokio::join!(self.backend.uploaded_files(), self.backend.cleaned_files());

        let mut first_error = None;
        let mut replaced = false;
        let (uploaded_count, cleaned_count) = {
            let mut state = self.state.lock().await;
            match uploaded {
                Ok(files) => {
                    state.view.uploaded_files = files;
                    replaced = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to refresh uploaded files");
                    first_error = Some(e);
                }
            }
            match cleaned {
                Ok(files) => {
                    state.view.cleaned_files = files;
                    replaced = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to refresh cleaned files");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
            (state.view.uploaded_files.len(), state.view.cleaned_files.len())
        };

        if replaced {
            tracing::debug!(
                uploaded = uploaded_count,
                cleaned = cleaned_count,
                "File collections refreshed",
            );
            self.events.publish(MonitorEvent::CollectionsRefreshed {
                uploaded: uploaded_count,
                cleaned: cleaned_count,
            });
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Stop consuming watcher events and detach the watcher.
    pub async fn shutdown(&self) {
        self.pump_cancel.cancel();
        self.watcher.detach().await;
        tracing::info!("Job orchestrator stopped");
    }

    // -- queries --------------------------------------------------------------

    /// Owned copy of the current dashboard state.
    pub async fn view(&self) -> DashboardView {
        self.state.lock().await.view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn watcher(&self) -> &JobWatcher<B> {
        &self.watcher
    }

    // -- snapshot handling ----------------------------------------------------

    /// Apply a snapshot delivered by watch session `generation`.
    ///
    /// Step statuses are recomputed on every delivery that does not move the
    /// job backwards. The terminal reaction runs only for the first terminal
    /// snapshot of the session; the completion half runs on its own task so
    /// slow previews never hold up later deliveries.
    pub async fn on_snapshot(self: &Arc<Self>, generation: u64, snapshot: JobSnapshot) {
        let completed = {
            let mut state = self.state.lock().await;
            if state.generation != Some(generation) {
                tracing::debug!(
                    job_id = %snapshot.id,
                    generation,
                    "Ignoring snapshot from stale watch session",
                );
                return;
            }
            if state.view.job_id.as_deref() != Some(snapshot.id.as_str()) {
                tracing::error!(
                    job_id = %snapshot.id,
                    current = ?state.view.job_id,
                    generation,
                    "Snapshot does not belong to the selected job; discarding",
                );
                return;
            }
            if let Some(held) = &state.view.snapshot {
                if regresses(held, &snapshot) {
                    tracing::debug!(
                        job_id = %snapshot.id,
                        generation,
                        held = held.progress_pct(),
                        received = snapshot.progress_pct(),
                        "Ignoring snapshot older than the one shown",
                    );
                    return;
                }
            }

            let steps = self
                .catalog
                .plan_for(&snapshot.kind)
                .derive(snapshot.state, snapshot.progress);

            let view = &mut state.view;
            view.steps = steps.clone();
            view.snapshot = Some(snapshot.clone());

            self.events.publish(MonitorEvent::StepsChanged {
                job_id: snapshot.id.clone(),
                state: snapshot.state,
                progress: snapshot.progress_pct(),
                message: snapshot.message.clone(),
                steps,
            });

            if !snapshot.is_terminal() || view.terminal_handled {
                return;
            }
            view.terminal_handled = true;

            if snapshot.state == JobState::Failed {
                let notice = failure_notice(&snapshot);
                let err = MonitorError::JobFailed {
                    job_id: snapshot.id.clone(),
                    message: notice.clone(),
                };
                tracing::warn!(error = %err, "Pipeline job failed");
                view.failure_notice = Some(notice.clone());
                self.events.publish(MonitorEvent::JobFailed {
                    job_id: snapshot.id,
                    message: notice,
                });
                return;
            }

            snapshot
        };

        let orchestrator = Arc::clone(self);
        let cancel = self.pump_cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(generation, "Completion reaction cancelled");
                }
                () = orchestrator.on_completed(generation, completed) => {}
            }
        });
    }

    /// Completion reaction: refresh collections and load both previews.
    async fn on_completed(&self, generation: u64, snapshot: JobSnapshot) {
        tracing::info!(job_id = %snapshot.id, "Pipeline job completed");

        let metrics = &snapshot.partial_metrics;
        let source = metrics.original_filename().map(str::to_string);
        let output = metrics.cleaned_filename().map(str::to_string);

        // Collection failures are logged by refresh_collections.
        let (_, source_preview, output_preview) = tokio::join!(
            self.refresh_collections(),
            self.load_preview(PreviewSide::Source, source.as_deref()),
            self.load_preview(PreviewSide::Output, output.as_deref()),
        );

        {
            let mut state = self.state.lock().await;
            if state.generation != Some(generation) {
                tracing::debug!(
                    job_id = %snapshot.id,
                    generation,
                    "Job deselected during completion; dropping previews",
                );
                return;
            }
            state.view.source_preview = source_preview.clone();
            state.view.output_preview = output_preview.clone();
        }

        for (side, slot) in [
            (PreviewSide::Source, source_preview),
            (PreviewSide::Output, output_preview),
        ] {
            match slot {
                PreviewSlot::Empty => {}
                PreviewSlot::Ready(preview) => self.events.publish(MonitorEvent::PreviewReady {
                    job_id: snapshot.id.clone(),
                    side,
                    preview,
                }),
                PreviewSlot::Unavailable { reason } => {
                    self.events.publish(MonitorEvent::PreviewUnavailable {
                        job_id: snapshot.id.clone(),
                        side,
                        reason,
                    })
                }
            }
        }

        self.events.publish(MonitorEvent::JobCompleted {
            job_id: snapshot.id,
            metrics: snapshot.partial_metrics,
        });
    }

    async fn load_preview(&self, side: PreviewSide, filename: Option<&str>) -> PreviewSlot {
        let Some(filename) = filename else {
            return PreviewSlot::Empty;
        };

        let result = match side {
            PreviewSide::Source => {
                self.backend
                    .preview_source(filename, self.preview_row_limit)
                    .await
            }
            PreviewSide::Output => {
                self.backend
                    .preview_output(filename, self.preview_row_limit)
                    .await
            }
        };

        match result {
            Ok(preview) => PreviewSlot::Ready(preview),
            Err(e) => {
                let err = MonitorError::PreviewUnavailable {
                    filename: filename.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "Preview not shown");
                PreviewSlot::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn on_connectivity(&self, generation: u64, connectivity: Connectivity) {
        let mut state = self.state.lock().await;
        if state.generation != Some(generation) {
            return;
        }
        let Some(job_id) = state.view.job_id.clone() else {
            return;
        };
        state.view.connectivity = connectivity.clone();
        self.events.publish(MonitorEvent::ConnectivityChanged {
            job_id,
            connectivity,
        });
    }

    async fn handle_watch_event(self: &Arc<Self>, event: WatchEvent) {
        match event {
            WatchEvent::Snapshot {
                generation,
                snapshot,
            } => self.on_snapshot(generation, snapshot).await,
            WatchEvent::ConnectivityLost {
                generation,
                consecutive_failures,
                error,
                ..
            } => {
                self.on_connectivity(
                    generation,
                    Connectivity::Degraded {
                        consecutive_failures,
                        last_error: error,
                    },
                )
                .await
            }
            WatchEvent::ConnectivityRestored { generation, .. } => {
                self.on_connectivity(generation, Connectivity::Online).await
            }
        }
    }

    /// Catch up after missed watcher events using the watcher's own state.
    async fn resync(self: &Arc<Self>) {
        let Some(generation) = self.watcher.session_generation().await else {
            return;
        };
        let connectivity = self.watcher.connectivity().await;
        self.on_connectivity(generation, connectivity).await;
        if let Some(snapshot) = self.watcher.current_snapshot().await {
            self.on_snapshot(generation, snapshot).await;
        }
    }

    fn baseline_steps(&self) -> Vec<DerivedStep> {
        self.catalog.plan_for(&self.page_kind).all_pending()
    }
}

impl<B: PipelineBackend> Drop for JobOrchestrator<B> {
    fn drop(&mut self) {
        self.pump_cancel.cancel();
    }
}

/// Whether `received` would move the view back from `held`: out of a
/// terminal state, from running to pending, or to lower running progress.
fn regresses(held: &JobSnapshot, received: &JobSnapshot) -> bool {
    if held.is_terminal() {
        return !received.is_terminal();
    }
    match (held.state, received.state) {
        (JobState::Running, JobState::Pending) => true,
        (JobState::Running, JobState::Running) => received.progress_pct() < held.progress_pct(),
        _ => false,
    }
}

fn failure_notice(snapshot: &JobSnapshot) -> String {
    let message = snapshot.message.trim();
    if message.is_empty() {
        DEFAULT_FAILURE_NOTICE.to_string()
    } else {
        message.to_string()
    }
}

/// Forward watcher events to the orchestrator until it is dropped or shut
/// down.
async fn pump<B: PipelineBackend>(
    orchestrator: Weak<JobOrchestrator<B>>,
    mut events: broadcast::Receiver<WatchEvent>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => received,
        };

        let Some(orchestrator) = orchestrator.upgrade() else {
            break;
        };

        match received {
            Ok(event) => orchestrator.handle_watch_event(event).await,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Watch event pump lagged; resyncing");
                // Skip the backlog; the resync already reflects it.
                events = events.resubscribe();
                orchestrator.resync().await;
            }
            Err(RecvError::Closed) => break,
        }
    }

    tracing::debug!("Watch event pump stopped");
}
