//! Live monitoring of pipeline jobs.
//!
//! [`JobWatcher`] polls one job at a time; [`JobOrchestrator`] turns its
//! snapshots into dashboard state and runs the terminal reaction exactly
//! once per job selection.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod watcher;

pub use backend::{JobSource, PipelineBackend};
pub use config::MonitorConfig;
pub use error::{MonitorError, TransportError};
pub use events::{Connectivity, EventBus, MonitorEvent, PreviewSide, WatchEvent};
pub use orchestrator::{DashboardView, JobOrchestrator, PreviewSlot};
pub use watcher::{JobWatcher, WatchPhase};
