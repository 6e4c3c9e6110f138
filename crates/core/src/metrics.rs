//! Task-specific job metrics (`metricas_parciales`).
//!
//! The payload differs per task kind and grows while the job runs, so it is
//! kept as an open JSON object. Only the handful of counters the dashboard
//! reads get named accessors; everything else is reachable through
//! [`PartialMetrics::get`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One row of a tabular preview, keyed by column name.
pub type PreviewRow = Map<String, Value>;

// ---------------------------------------------------------------------------
// Well-known keys
// ---------------------------------------------------------------------------

/// Identifier of the cleaned dataset row created at completion.
pub const METRIC_CLEANED_ID: &str = "cleaned_id";

/// File name of the cleaned output, used for the output preview.
pub const METRIC_CLEANED_FILENAME: &str = "cleaned_filename";

/// Storage path of the cleaned output.
pub const METRIC_CLEANED_PATH: &str = "cleaned_path";

/// File name of the uploaded input, used for the source preview.
pub const METRIC_ORIGINAL_FILENAME: &str = "original_filename";

/// Identifier of the uploaded input.
pub const METRIC_ORIGINAL_FILE_ID: &str = "original_file_id";

pub const METRIC_ROWS_ORIGINAL: &str = "filas_originales";
pub const METRIC_ROWS_CLEAN: &str = "filas_limpias";
pub const METRIC_DUPLICATES_REMOVED: &str = "duplicados_eliminados";
pub const METRIC_NULLS_REMOVED: &str = "nulos_eliminados";
pub const METRIC_NULLS_FILLED: &str = "nulls_filled";
pub const METRIC_OUTLIERS_REMOVED: &str = "outliers_removed";

/// Column count, or the list of column names in older payloads.
pub const METRIC_COLUMNS: &str = "columnas";

/// Small tabular sample attached to the payload.
pub const METRIC_PREVIEW: &str = "preview";

// ---------------------------------------------------------------------------
// PartialMetrics
// ---------------------------------------------------------------------------

/// Open mapping of task-specific counters and an optional preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PartialMetrics(Map<String, Value>);

impl PartialMetrics {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Read a non-negative integer counter. Float counters are rounded.
    pub fn counter(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
            _ => None,
        }
    }

    /// Read a non-empty string value.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str().filter(|s| !s.is_empty())
    }

    pub fn rows_original(&self) -> Option<u64> {
        self.counter(METRIC_ROWS_ORIGINAL)
    }

    pub fn rows_clean(&self) -> Option<u64> {
        self.counter(METRIC_ROWS_CLEAN)
    }

    pub fn duplicates_removed(&self) -> Option<u64> {
        self.counter(METRIC_DUPLICATES_REMOVED)
    }

    pub fn nulls_removed(&self) -> Option<u64> {
        self.counter(METRIC_NULLS_REMOVED)
    }

    pub fn nulls_filled(&self) -> Option<u64> {
        self.counter(METRIC_NULLS_FILLED)
    }

    pub fn outliers_removed(&self) -> Option<u64> {
        self.counter(METRIC_OUTLIERS_REMOVED)
    }

    /// Number of columns in the output, whether reported as a count or as
    /// the list of column names.
    pub fn column_count(&self) -> Option<u64> {
        match self.0.get(METRIC_COLUMNS)? {
            Value::Array(cols) => Some(cols.len() as u64),
            _ => self.counter(METRIC_COLUMNS),
        }
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.text(METRIC_ORIGINAL_FILENAME)
    }

    pub fn cleaned_filename(&self) -> Option<&str> {
        self.text(METRIC_CLEANED_FILENAME)
    }

    pub fn cleaned_id(&self) -> Option<&str> {
        self.text(METRIC_CLEANED_ID)
    }

    pub fn original_file_id(&self) -> Option<&str> {
        self.text(METRIC_ORIGINAL_FILE_ID)
    }

    /// Preview rows embedded in the payload. Non-object entries are skipped.
    pub fn preview_rows(&self) -> Vec<PreviewRow> {
        match self.0.get(METRIC_PREVIEW) {
            Some(Value::Array(rows)) => rows
                .iter()
                .filter_map(|row| row.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for PartialMetrics {
    /// Accepts an object, `null`, or an object encoded as a JSON string
    /// (what a TEXT column hands back).
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            Value::String(raw) if raw.trim().is_empty() => Ok(Self::default()),
            Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                Ok(Value::Null) => Ok(Self::default()),
                _ => Err(serde::de::Error::custom(
                    "metricas_parciales string is not a JSON object",
                )),
            },
            other => Err(serde::de::Error::custom(format!(
                "expected metrics object, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
