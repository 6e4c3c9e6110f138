//! Read models for the dashboard's file collections and previews.
//!
//! These are refreshed wholesale after a job completes; the monitor never
//! edits them.

use serde::{Deserialize, Serialize};

use crate::metrics::PreviewRow;
use crate::types::FileId;

/// A row of the "uploaded files" collection (`GET /uploaded-files`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: FileId,
    pub filename: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Upload time as seconds since the Unix epoch.
    #[serde(default)]
    pub modified: Option<f64>,
    /// `cargado` or `limpiado`.
    #[serde(alias = "estado", default)]
    pub status: Option<String>,
    #[serde(alias = "metadatos", default)]
    pub metadata: Option<serde_json::Value>,
}

/// A row of the "cleaned files" collection (`GET /cleaned-files`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedFile {
    pub id: String,
    /// The uploaded file this was cleaned from.
    #[serde(alias = "datos_cargados_id", default)]
    pub source_file_id: Option<FileId>,
    #[serde(alias = "nombre_original", default)]
    pub original_name: Option<String>,
    #[serde(alias = "nombre_limpio")]
    pub cleaned_name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub modified: Option<f64>,
    #[serde(alias = "estado", default)]
    pub status: Option<String>,
    #[serde(alias = "estadisticas", default)]
    pub stats: Option<serde_json::Value>,
    #[serde(alias = "columnas", default)]
    pub columns: Vec<String>,
}

/// First rows of a CSV file (`GET /preview-file/{name}`,
/// `GET /preview-cleaned/{name}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePreview {
    pub filename: String,
    /// Total row count of the file, not of the preview.
    pub rows: u64,
    pub columns: u64,
    #[serde(default)]
    pub preview: Vec<PreviewRow>,
}
