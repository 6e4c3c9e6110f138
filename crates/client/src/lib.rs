//! HTTP client for the pipeline dashboard backend.
//!
//! Typed wrappers over the `/api/data` REST routes: job lookup and start,
//! the uploaded/cleaned file collections, and CSV previews.

pub mod api;

pub use api::{HealthResponse, PipelineApi, PipelineApiError, StartJobResponse};
