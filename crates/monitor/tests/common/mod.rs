#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mlpipe_core::files::{CleanedFile, FilePreview, UploadedFile};
use mlpipe_core::job::{JobKind, JobSnapshot, JobState};
use mlpipe_core::metrics::{PartialMetrics, METRIC_CLEANED_FILENAME, METRIC_ORIGINAL_FILENAME};
use mlpipe_core::types::JobId;
use mlpipe_monitor::{JobSource, MonitorConfig, PipelineBackend, TransportError};
use serde_json::{json, Map, Value};

/// Poll interval used by every test.
pub const POLL: Duration = Duration::from_secs(5);

pub type FetchResult = Result<JobSnapshot, TransportError>;

/// In-memory backend with scripted job responses.
///
/// Each job has a queue of responses; once the queue is drained the last
/// response is repeated.
#[derive(Default)]
pub struct FakeBackend {
    scripts: Mutex<HashMap<JobId, VecDeque<FetchResult>>>,
    last: Mutex<HashMap<JobId, FetchResult>>,
    delays: Mutex<HashMap<JobId, Duration>>,
    fetches: Mutex<HashMap<JobId, usize>>,
    jobs_by_file: Mutex<HashMap<String, Vec<JobSnapshot>>>,
    all_jobs: Mutex<Vec<JobSnapshot>>,
    deleted: Mutex<Vec<JobId>>,
    preview_delay: Mutex<Option<Duration>>,
    started_job: Mutex<Option<JobId>>,
    fail_start: Mutex<bool>,
    fail_previews: Mutex<bool>,
    fail_uploaded: Mutex<bool>,
    uploaded_calls: AtomicUsize,
    cleaned_calls: AtomicUsize,
    preview_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn script(&self, job_id: &str, responses: Vec<FetchResult>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), responses.into());
    }

    /// Hold every fetch of `job_id` for `delay` before answering.
    pub fn delay(&self, job_id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(job_id.to_string(), delay);
    }

    pub fn fetch_count(&self, job_id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_jobs_for_file(&self, file_id: &str, jobs: Vec<JobSnapshot>) {
        self.jobs_by_file
            .lock()
            .unwrap()
            .insert(file_id.to_string(), jobs);
    }

    /// Jobs returned by `list_jobs`, newest first.
    pub fn set_all_jobs(&self, jobs: Vec<JobSnapshot>) {
        *self.all_jobs.lock().unwrap() = jobs;
    }

    pub fn deleted_jobs(&self) -> Vec<JobId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn set_started_job(&self, job_id: &str) {
        *self.started_job.lock().unwrap() = Some(job_id.to_string());
    }

    pub fn fail_start(&self) {
        *self.fail_start.lock().unwrap() = true;
    }

    pub fn fail_previews(&self) {
        *self.fail_previews.lock().unwrap() = true;
    }

    /// Hold every preview request for `delay` before answering.
    pub fn delay_previews(&self, delay: Duration) {
        *self.preview_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_uploaded(&self) {
        *self.fail_uploaded.lock().unwrap() = true;
    }

    pub fn uploaded_calls(&self) -> usize {
        self.uploaded_calls.load(Ordering::SeqCst)
    }

    pub fn cleaned_calls(&self) -> usize {
        self.cleaned_calls.load(Ordering::SeqCst)
    }

    pub fn preview_calls(&self) -> usize {
        self.preview_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self, job_id: &str) -> FetchResult {
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(|queue| queue.pop_front());

        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                last.insert(job_id.to_string(), response.clone());
                response
            }
            None => last
                .get(job_id)
                .cloned()
                .unwrap_or_else(|| Err(TransportError::with_status(404, "Job not found"))),
        }
    }

    async fn preview(&self, filename: &str, limit: usize) -> Result<FilePreview, TransportError> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.preview_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_previews.lock().unwrap() {
            return Err(TransportError::with_status(404, "Archivo no encontrado"));
        }
        Ok(FilePreview {
            filename: filename.to_string(),
            rows: 120,
            columns: 2,
            preview: (0..limit.min(3))
                .map(|i| row(&[("id", json!(i)), ("valor", json!(i * 10))]))
                .collect(),
        })
    }
}

#[async_trait]
impl JobSource for FakeBackend {
    async fn fetch_job(&self, job_id: &str) -> FetchResult {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;

        let delay = self.delays.lock().unwrap().get(job_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response(job_id)
    }
}

#[async_trait]
impl PipelineBackend for FakeBackend {
    async fn start_clean_job(&self, file_id: &str) -> Result<JobId, TransportError> {
        if *self.fail_start.lock().unwrap() {
            return Err(TransportError::with_status(
                404,
                format!("Archivo {file_id} no encontrado"),
            ));
        }
        Ok(self
            .started_job
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("job-{file_id}")))
    }

    async fn jobs_for_file(&self, file_id: &str) -> Result<Vec<JobSnapshot>, TransportError> {
        Ok(self
            .jobs_by_file
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_jobs(&self) -> Result<Vec<JobSnapshot>, TransportError> {
        Ok(self.all_jobs.lock().unwrap().clone())
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn uploaded_files(&self) -> Result<Vec<UploadedFile>, TransportError> {
        self.uploaded_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_uploaded.lock().unwrap() {
            return Err(TransportError::with_status(500, "Internal Server Error"));
        }
        Ok(vec![UploadedFile {
            id: "f1".into(),
            filename: "ventas.csv".into(),
            path: Some("uploads/ventas.csv".into()),
            size: Some(2048),
            modified: None,
            status: None,
            metadata: None,
        }])
    }

    async fn cleaned_files(&self) -> Result<Vec<CleanedFile>, TransportError> {
        self.cleaned_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![CleanedFile {
            id: "c1".into(),
            source_file_id: Some("f1".into()),
            original_name: Some("ventas.csv".into()),
            cleaned_name: "ventas_limpio.csv".into(),
            path: None,
            modified: None,
            status: None,
            stats: None,
            columns: vec!["id".into(), "valor".into()],
        }])
    }

    async fn preview_source(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, TransportError> {
        self.preview(filename, limit).await
    }

    async fn preview_output(
        &self,
        filename: &str,
        limit: usize,
    ) -> Result<FilePreview, TransportError> {
        self.preview(filename, limit).await
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn snapshot(id: &str, state: JobState, progress: f64) -> JobSnapshot {
    JobSnapshot {
        id: id.to_string(),
        source_file_id: "f1".into(),
        kind: JobKind::Clean,
        state,
        progress,
        message: String::new(),
        partial_metrics: PartialMetrics::default(),
        started_at: None,
        finished_at: None,
        created_at: None,
        updated_at: None,
    }
}

/// A completed cleaning job whose metrics name both files.
pub fn completed(id: &str) -> JobSnapshot {
    let mut metrics = Map::new();
    metrics.insert(METRIC_ORIGINAL_FILENAME.into(), json!("ventas.csv"));
    metrics.insert(METRIC_CLEANED_FILENAME.into(), json!("ventas_limpio.csv"));
    metrics.insert("duplicados_eliminados".into(), json!(4));
    JobSnapshot {
        partial_metrics: PartialMetrics::new(metrics),
        message: "Limpieza completada".into(),
        ..snapshot(id, JobState::Completed, 100.0)
    }
}

pub fn failed(id: &str, progress: f64, message: &str) -> JobSnapshot {
    JobSnapshot {
        message: message.to_string(),
        ..snapshot(id, JobState::Failed, progress)
    }
}

pub fn offline() -> FetchResult {
    Err(TransportError::new("error sending request: connection refused"))
}

pub fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: POLL,
        preview_row_limit: 5,
        ..MonitorConfig::default()
    }
}

/// Let spawned tasks run while advancing the paused clock by `by`.
pub async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
}

/// Let spawned tasks run without crossing a poll boundary.
pub async fn settle() {
    advance(Duration::from_millis(10)).await;
}
