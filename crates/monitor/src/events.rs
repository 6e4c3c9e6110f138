//! Events emitted by the watcher and the orchestrator.
//!
//! [`WatchEvent`]s flow from a [`JobWatcher`](crate::watcher::JobWatcher)
//! to its subscriber; [`MonitorEvent`]s flow from the
//! [`JobOrchestrator`](crate::orchestrator::JobOrchestrator) to whatever UI
//! layer is listening. Both travel over an [`EventBus`].

use mlpipe_core::files::FilePreview;
use mlpipe_core::job::{JobSnapshot, JobState};
use mlpipe_core::metrics::PartialMetrics;
use mlpipe_core::steps::DerivedStep;
use mlpipe_core::types::JobId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Whether the last polls reached the backend.
///
/// Independent of the job's own state: a job can be `running` while the
/// client is offline, and `failed` while the client is online.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Online,
    Degraded {
        consecutive_failures: u32,
        last_error: String,
    },
}

impl Connectivity {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

// ---------------------------------------------------------------------------
// WatchEvent
// ---------------------------------------------------------------------------

/// Delivery from a watcher session. `generation` identifies the session so
/// late deliveries from a torn-down session can be told apart.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Snapshot {
        generation: u64,
        snapshot: JobSnapshot,
    },
    ConnectivityLost {
        generation: u64,
        job_id: JobId,
        consecutive_failures: u32,
        error: String,
    },
    ConnectivityRestored {
        generation: u64,
        job_id: JobId,
    },
}

impl WatchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Snapshot { generation, .. }
            | Self::ConnectivityLost { generation, .. }
            | Self::ConnectivityRestored { generation, .. } => *generation,
        }
    }
}

// ---------------------------------------------------------------------------
// MonitorEvent
// ---------------------------------------------------------------------------

/// Which of the two post-completion previews an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSide {
    /// The job's input file.
    Source,
    /// The job's output file.
    Output,
}

/// A dashboard-level change produced by the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    JobSelected {
        job_id: JobId,
    },

    JobCleared,

    /// Step statuses were recomputed from a new snapshot.
    StepsChanged {
        job_id: JobId,
        state: JobState,
        progress: f64,
        message: String,
        steps: Vec<DerivedStep>,
    },

    ConnectivityChanged {
        job_id: JobId,
        connectivity: Connectivity,
    },

    CollectionsRefreshed {
        uploaded: usize,
        cleaned: usize,
    },

    PreviewReady {
        job_id: JobId,
        side: PreviewSide,
        preview: FilePreview,
    },

    PreviewUnavailable {
        job_id: JobId,
        side: PreviewSide,
        reason: String,
    },

    /// The completion reaction finished (collections and previews settled).
    JobCompleted {
        job_id: JobId,
        metrics: PartialMetrics,
    },

    /// User-visible failure notice.
    JobFailed {
        job_id: JobId,
        message: String,
    },
}

impl MonitorEvent {
    /// Whether this event ends the lifecycle of the watched job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published event.
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: E) {
        // A SendError only means nobody is subscribed.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
