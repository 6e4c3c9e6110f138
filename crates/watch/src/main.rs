//! `mlpipe-watch` -- follow a pipeline job from the terminal.
//!
//! Starts a cleaning job (or attaches to an existing one, or to the newest
//! job still in flight), logs step progress, connectivity changes, and the
//! completion summary, then exits with a status reflecting how the job ended.
//!
//! # Environment variables
//!
//! | Variable                 | Required | Default                 | Description                          |
//! |--------------------------|----------|-------------------------|--------------------------------------|
//! | `CLEAN_FILE_ID`          | no       | --                      | Uploaded file to start cleaning      |
//! | `WATCH_JOB_ID`           | no       | newest job in flight    | Existing job to follow               |
//! | `PIPELINE_API_URL`       | no       | `http://localhost:8000` | Backend base URL                     |
//! | `JOB_POLL_INTERVAL_SECS` | no       | `5`                     | Seconds between job polls            |
//! | `PREVIEW_ROW_LIMIT`      | no       | `10`                    | Rows per post-completion preview     |
//! | `HTTP_TIMEOUT_SECS`      | no       | `30`                    | Per-request timeout                  |
//! | `LOG_FORMAT`             | no       | `text`                  | `json` for machine-readable logs     |

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use mlpipe_client::PipelineApi;
use mlpipe_core::steps::StepCatalog;
use mlpipe_monitor::{JobOrchestrator, MonitorConfig};
use mlpipe_watch::run::{self, Outcome, Target};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mlpipe_watch=info,mlpipe_monitor=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    match try_main().await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "mlpipe-watch failed");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<Outcome> {
    let target = Target::from_env();
    let config = MonitorConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        target = ?target,
        "Starting mlpipe-watch",
    );

    let api = PipelineApi::with_timeout(config.api_url.clone(), config.http_timeout)
        .context("Failed to build HTTP client")?;

    match api.health().await {
        Ok(health) => tracing::info!(status = %health.status, "Backend health check passed"),
        Err(e) => tracing::warn!(error = %e, "Backend health check failed; polling anyway"),
    }

    let catalog = StepCatalog::standard().context("Invalid built-in step plans")?;
    let orchestrator = JobOrchestrator::start(Arc::new(api), catalog, &config);

    let outcome = run::run(&orchestrator, target, shutdown_signal())
        .await
        .context("Failed to start watching the job")?;

    orchestrator.shutdown().await;
    Ok(outcome)
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C)"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
