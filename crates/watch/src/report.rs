//! Log rendering of monitor events.

use mlpipe_core::steps::{DerivedStep, StepStatus};
use mlpipe_monitor::{Connectivity, MonitorEvent};

/// One-line summary of derived steps, e.g. `[x] Carga de datos | [~] Duplicados`.
pub fn summarize_steps(steps: &[DerivedStep]) -> String {
    steps
        .iter()
        .map(|step| format!("{} {}", marker(step.status), step.name))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "[ ]",
        StepStatus::InProgress => "[~]",
        StepStatus::Completed => "[x]",
        StepStatus::Error => "[!]",
    }
}

/// Emit a tracing record for one monitor event.
pub fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::JobSelected { job_id } => {
            tracing::info!(job_id = %job_id, "Watching job");
        }
        MonitorEvent::JobCleared => {
            tracing::debug!("Selection cleared");
        }
        MonitorEvent::StepsChanged {
            job_id,
            state,
            progress,
            message,
            steps,
        } => {
            tracing::info!(
                job_id = %job_id,
                state = %state,
                progress,
                message = %message,
                steps = %summarize_steps(steps),
                "Job progress",
            );
        }
        MonitorEvent::ConnectivityChanged {
            job_id,
            connectivity: Connectivity::Online,
        } => {
            tracing::info!(job_id = %job_id, "Backend reachable");
        }
        MonitorEvent::ConnectivityChanged {
            job_id,
            connectivity:
                Connectivity::Degraded {
                    consecutive_failures,
                    last_error,
                },
        } => {
            tracing::warn!(
                job_id = %job_id,
                consecutive_failures,
                error = %last_error,
                "Backend unreachable; still retrying",
            );
        }
        MonitorEvent::CollectionsRefreshed { uploaded, cleaned } => {
            tracing::info!(uploaded, cleaned, "File collections refreshed");
        }
        MonitorEvent::PreviewReady {
            side, preview, ..
        } => {
            tracing::info!(
                side = ?side,
                filename = %preview.filename,
                rows = preview.rows,
                columns = preview.columns,
                "Preview loaded",
            );
        }
        MonitorEvent::PreviewUnavailable { side, reason, .. } => {
            tracing::warn!(side = ?side, reason = %reason, "Preview unavailable");
        }
        MonitorEvent::JobCompleted { job_id, metrics } => {
            tracing::info!(
                job_id = %job_id,
                rows_original = ?metrics.rows_original(),
                rows_clean = ?metrics.rows_clean(),
                duplicates_removed = ?metrics.duplicates_removed(),
                nulls_removed = ?metrics.nulls_removed(),
                cleaned_file = ?metrics.cleaned_filename(),
                "Job completed",
            );
        }
        MonitorEvent::JobFailed { job_id, message } => {
            tracing::error!(job_id = %job_id, message = %message, "Job failed");
        }
    }
}
