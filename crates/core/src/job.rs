//! Pipeline job snapshot as reported by the backend.
//!
//! The backend stores jobs in `pipeline_jobs` with Spanish column names
//! (`estado`, `progreso`, `mensaje_actual`, ...). [`JobSnapshot`] accepts
//! those names as aliases and serializes with English field names.

use serde::{Deserialize, Deserializer, Serialize};

use crate::metrics::PartialMetrics;
use crate::types::{timestamp, FileId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Task type string the backend writes for cleaning jobs.
pub const KIND_CLEAN: &str = "limpieza";

/// Task type string used for training jobs.
pub const KIND_TRAIN: &str = "entrenamiento";

/// Upper bound of the progress scale.
pub const PROGRESS_MAX: f64 = 100.0;

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of a pipeline job.
///
/// `pending -> running -> {completed | failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[serde(alias = "pendiente")]
    Pending,
    #[serde(alias = "en_progreso", alias = "in_progress")]
    Running,
    #[serde(alias = "completado")]
    Completed,
    #[serde(alias = "fallido")]
    Failed,
}

/// States after which the backend never changes the job again.
pub const TERMINAL_STATES: &[JobState] = &[JobState::Completed, JobState::Failed];

impl JobState {
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATES.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobKind
// ---------------------------------------------------------------------------

/// What the job does. Unknown task types are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobKind {
    Clean,
    Train,
    Other(String),
}

impl From<String> for JobKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            KIND_CLEAN | "clean" | "cleaning" => Self::Clean,
            KIND_TRAIN | "train" | "training" => Self::Train,
            _ => Self::Other(value),
        }
    }
}

impl From<JobKind> for String {
    fn from(value: JobKind) -> Self {
        match value {
            JobKind::Clean => KIND_CLEAN.to_string(),
            JobKind::Train => KIND_TRAIN.to_string(),
            JobKind::Other(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// JobSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time state of a job, as returned by `GET /jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,

    /// The uploaded file this job operates on.
    #[serde(alias = "datos_cargados_id")]
    pub source_file_id: FileId,

    #[serde(alias = "tipo_tarea")]
    pub kind: JobKind,

    #[serde(alias = "estado")]
    pub state: JobState,

    /// Percentage in `[0, 100]`. Only drives step derivation while running.
    #[serde(alias = "progreso", default)]
    pub progress: f64,

    #[serde(alias = "mensaje_actual", default, deserialize_with = "null_as_empty")]
    pub message: String,

    #[serde(alias = "metricas_parciales", default)]
    pub partial_metrics: PartialMetrics,

    #[serde(
        alias = "fecha_inicio",
        default,
        deserialize_with = "timestamp::deserialize_opt",
        serialize_with = "timestamp::serialize_opt"
    )]
    pub started_at: Option<Timestamp>,

    #[serde(
        alias = "fecha_fin",
        default,
        deserialize_with = "timestamp::deserialize_opt",
        serialize_with = "timestamp::serialize_opt"
    )]
    pub finished_at: Option<Timestamp>,

    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_opt",
        serialize_with = "timestamp::serialize_opt"
    )]
    pub created_at: Option<Timestamp>,

    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_opt",
        serialize_with = "timestamp::serialize_opt"
    )]
    pub updated_at: Option<Timestamp>,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Progress clamped to `[0, 100]`; non-finite values read as zero.
    pub fn progress_pct(&self) -> f64 {
        clamp_progress(self.progress)
    }
}

/// Clamp a raw progress value onto the `[0, 100]` scale.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_finite() {
        progress.clamp(0.0, PROGRESS_MAX)
    } else {
        0.0
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
