//! HTTP-level tests for [`PipelineApi`] against a mock backend.
//!
//! Response bodies mirror what the backend's `/api/data` routes return,
//! including the Spanish column names of `pipeline_jobs`.

use assert_matches::assert_matches;
use mlpipe_client::{PipelineApi, PipelineApiError};
use mlpipe_core::job::{JobKind, JobState};
use mockito::Matcher;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn job_body(id: &str, estado: &str, progreso: f64) -> String {
    serde_json::json!({
        "id": id,
        "datos_cargados_id": "f-42",
        "tipo_tarea": "limpieza",
        "estado": estado,
        "progreso": progreso,
        "mensaje_actual": "Analizando valores nulos...",
        "metricas_parciales": null,
        "fecha_inicio": "2025-03-14T09:26:53.589793",
        "fecha_fin": null,
        "created_at": "2025-03-14T09:26:53.589793",
        "updated_at": "2025-03-14T09:27:01.100000"
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_job_parses_backend_row() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/data/jobs/j1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(job_body("j1", "en_progreso", 30.0))
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let job = api.get_job("j1").await.expect("job should parse");

    mock.assert_async().await;
    assert_eq!(job.id, "j1");
    assert_eq!(job.kind, JobKind::Clean);
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.progress, 30.0);
    assert!(job.partial_metrics.is_empty());
}

#[tokio::test]
async fn get_job_not_found_is_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/data/jobs/missing")
        .with_status(404)
        .with_body(r#"{"detail":"Job no encontrado"}"#)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let err = api.get_job("missing").await.unwrap_err();

    assert_matches!(err, PipelineApiError::ApiError { status: 404, ref body } if body.contains("no encontrado"));
}

#[tokio::test]
async fn get_job_with_malformed_body_is_request_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/data/jobs/j1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "j1"}"#)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    assert_matches!(api.get_job("j1").await, Err(PipelineApiError::Request(_)));
}

#[tokio::test]
async fn start_clean_job_posts_to_jobs_route() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/data/jobs/clean-data/f-42")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"message":"Limpieza iniciada","job_id":"j7","file_id":"f-42","status":"processing"}"#,
        )
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let started = api.start_clean_job("f-42").await.unwrap();

    mock.assert_async().await;
    assert_eq!(started.job_id, "j7");
    assert_eq!(started.status, "processing");
}

#[tokio::test]
async fn list_jobs_for_file_returns_newest_first() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        "[{}, {}]",
        job_body("j2", "en_progreso", 45.0),
        job_body("j1", "completado", 100.0)
    );
    server
        .mock("GET", "/api/data/jobs/file/f-42")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let jobs = api.list_jobs_for_file("f-42").await.unwrap();

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, "j2");
    assert_eq!(jobs[1].state, JobState::Completed);
}

#[tokio::test]
async fn delete_job_checks_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/api/data/jobs/j1")
        .with_status(200)
        .with_body(r#"{"message":"Job j1 eliminado correctamente"}"#)
        .create_async()
        .await;
    server
        .mock("DELETE", "/api/data/jobs/j2")
        .with_status(404)
        .with_body(r#"{"detail":"Job no encontrado"}"#)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    assert!(api.delete_job("j1").await.is_ok());
    assert_eq!(api.delete_job("j2").await.unwrap_err().status(), Some(404));
}

// ---------------------------------------------------------------------------
// Collections and previews
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collections_parse_backend_rows() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/data/uploaded-files")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":"f-42","filename":"ventas.csv","path":"uploads/original/ventas.csv",
                 "size":20480,"modified":1710408413.5,"estado":"cargado","metadatos":null}]"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/api/data/cleaned-files")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":"c-9","datos_cargados_id":"f-42","nombre_original":"ventas.csv",
                 "nombre_limpio":"cleaned_ventas.csv","path":"uploads/cleaned/cleaned_ventas.csv",
                 "modified":1710408500.0,"estado":"limpiado","estadisticas":{},"columnas":["id"]}]"#,
        )
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let uploaded = api.uploaded_files().await.unwrap();
    let cleaned = api.cleaned_files().await.unwrap();

    assert_eq!(uploaded[0].filename, "ventas.csv");
    assert_eq!(cleaned[0].cleaned_name, "cleaned_ventas.csv");
    assert_eq!(cleaned[0].source_file_id.as_deref(), Some("f-42"));
}

#[tokio::test]
async fn previews_send_row_limit() {
    let mut server = mockito::Server::new_async().await;
    let source = server
        .mock("GET", "/api/data/preview-file/ventas.csv")
        .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"filename":"ventas.csv","rows":1200,"columns":2,"preview":[{"id":1,"monto":10.5}]}"#)
        .create_async()
        .await;
    let output = server
        .mock("GET", "/api/data/preview-cleaned/cleaned_ventas.csv")
        .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"filename":"cleaned_ventas.csv","rows":1150,"columns":2,"preview":[]}"#)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let before = api.preview_file("ventas.csv", 5).await.unwrap();
    let after = api.preview_cleaned("cleaned_ventas.csv", 5).await.unwrap();

    source.assert_async().await;
    output.assert_async().await;
    assert_eq!(before.rows, 1200);
    assert_eq!(before.preview.len(), 1);
    assert_eq!(after.rows, 1150);
}

#[tokio::test]
async fn preview_server_error_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/data/preview-cleaned/gone.csv")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"detail":"Error en preview de limpio"}"#)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    let err = api.preview_cleaned("gone.csv", 10).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn health_reads_root_route() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"healthy","message":"API funcionando"}"#)
        .create_async()
        .await;

    let api = PipelineApi::new(server.url());
    assert_eq!(api.health().await.unwrap().status, "healthy");
}

#[tokio::test]
async fn unreachable_backend_is_request_error() {
    // Port 9 (discard) is never served by the test environment.
    let api = PipelineApi::new("http://127.0.0.1:9".into());
    assert_matches!(api.get_job("j1").await, Err(PipelineApiError::Request(_)));
}
