//! Shared data model for the pipeline job monitor.
//!
//! Job snapshots, task metrics, file collection rows, and the pure
//! step-status derivation. No I/O lives here.

pub mod error;
pub mod files;
pub mod job;
pub mod metrics;
pub mod steps;
pub mod types;
