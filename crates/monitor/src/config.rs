use std::time::Duration;

use mlpipe_core::job::JobKind;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default interval between job polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default number of rows fetched for each post-completion preview.
pub const DEFAULT_PREVIEW_ROW_LIMIT: usize = 10;

/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Job monitor configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Backend base URL (default: `http://localhost:8000`).
    pub api_url: String,
    /// Fixed interval between polls of the watched job (default: 5 s).
    pub poll_interval: Duration,
    /// Rows requested per preview (default: `10`).
    pub preview_row_limit: usize,
    /// Transport timeout for each HTTP request (default: 30 s).
    pub http_timeout: Duration,
    /// Task kind whose steps are shown before the first snapshot arrives.
    pub page_kind: JobKind,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            preview_row_limit: DEFAULT_PREVIEW_ROW_LIMIT,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            page_kind: JobKind::Clean,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `PIPELINE_API_URL`       | `http://localhost:8000` |
    /// | `JOB_POLL_INTERVAL_SECS` | `5`                     |
    /// | `PREVIEW_ROW_LIMIT`      | `10`                    |
    /// | `HTTP_TIMEOUT_SECS`      | `30`                    |
    ///
    /// Unparseable or zero values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_url = lookup("PIPELINE_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_url);

        let poll_interval = positive::<u64>(&lookup, "JOB_POLL_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let preview_row_limit =
            positive::<usize>(&lookup, "PREVIEW_ROW_LIMIT").unwrap_or(defaults.preview_row_limit);

        let http_timeout = positive::<u64>(&lookup, "HTTP_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Self {
            api_url,
            poll_interval,
            preview_row_limit,
            http_timeout,
            page_kind: defaults.page_kind,
        }
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = lookup(key)?;
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Some(parsed),
        _ => {
            tracing::warn!(key, value = %value, "Ignoring invalid configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = MonitorConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.preview_row_limit, 10);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.page_kind, JobKind::Clean);
    }

    #[test]
    fn overrides_are_applied() {
        let config = MonitorConfig::from_lookup(lookup(&[
            ("PIPELINE_API_URL", "https://pipeline.example.com"),
            ("JOB_POLL_INTERVAL_SECS", "2"),
            ("PREVIEW_ROW_LIMIT", "25"),
            ("HTTP_TIMEOUT_SECS", "8"),
        ]));
        assert_eq!(config.api_url, "https://pipeline.example.com");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.preview_row_limit, 25);
        assert_eq!(config.http_timeout, Duration::from_secs(8));
    }

    #[test]
    fn invalid_and_zero_values_fall_back() {
        let config = MonitorConfig::from_lookup(lookup(&[
            ("PIPELINE_API_URL", "   "),
            ("JOB_POLL_INTERVAL_SECS", "0"),
            ("PREVIEW_ROW_LIMIT", "lots"),
        ]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.preview_row_limit, 10);
    }
}
