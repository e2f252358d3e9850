//! End-to-end tests of the reqwest client against an in-process fake service

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use classcraft::{
    progress, ClassCraftApi, ClientError, ConfigBuilder, Downloader, Flow, HttpClient,
    SelectedFile, Session, StatusMessage,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

#[derive(Clone)]
struct FakeService {
    base: String,
}

#[derive(Default)]
struct Upload {
    num_classes: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    size: usize,
}

async fn read_upload(mut multipart: Multipart) -> Upload {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("num_classes") => upload.num_classes = Some(field.text().await.unwrap()),
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.size = field.bytes().await.unwrap().len();
            }
            _ => {}
        }
    }
    upload
}

async fn process(State(service): State<FakeService>, multipart: Multipart) -> impl IntoResponse {
    let upload = read_upload(multipart).await;
    let file_name = upload.file_name.unwrap_or_default();

    if upload.content_type.as_deref() != Some("text/csv") || !file_name.ends_with(".csv") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Uploaded file must be a CSV"})),
        );
    }

    let num_classes: i64 = upload
        .num_classes
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    if !(1..=20).contains(&num_classes) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "The number of classes must be between 1-20."})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "download_url": format!("{}/download/map_{}_{}", service.base, upload.size, file_name),
            "original_filename": file_name,
        })),
    )
}

async fn calculate(State(service): State<FakeService>, multipart: Multipart) -> impl IntoResponse {
    let upload = read_upload(multipart).await;
    let file_name = upload.file_name.unwrap_or_default();
    Json(json!({
        "download_url": format!("{}/download/map_{}_{}", service.base, upload.size, file_name),
        "original_filename": file_name,
    }))
}

async fn download(Path(filename): Path<String>) -> impl IntoResponse {
    let presented = filename
        .split_once('_')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_else(|| filename.clone());
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", presented),
        )],
        "name,assigned_class\nAna,1\nBo,2\n",
    )
}

async fn broken() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal Server Error"})),
    )
}

async fn no_link() -> impl IntoResponse {
    Json(json!({"original_filename": "students.csv"}))
}

/// Bind an ephemeral port and serve the fake service on it
async fn spawn_service() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let app = Router::new()
        .route("/process/", post(process))
        .route("/calculate/", post(calculate))
        .route("/download/:filename", get(download))
        .route("/broken/process/", post(broken))
        .route("/nolink/calculate/", post(no_link))
        .with_state(FakeService { base: base.clone() });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    base
}

async fn roster(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("students.csv");
    let mut body = String::from("name,ESOL,IEP,GATES,MAP_score\n");
    for i in 0..500 {
        body.push_str(&format!("student{},,,,{}\n", i, 50 + i % 50));
    }
    fs::write(&path, body).await.unwrap();
    path
}

#[tokio::test]
async fn test_process_sends_fields_and_reports_progress() {
    let base = spawn_service().await;
    let temp_dir = TempDir::new().unwrap();
    let path = roster(&temp_dir).await;
    let size = fs::metadata(&path).await.unwrap().len();

    let config = ConfigBuilder::new().with_base_url(&base).with_chunk_size(1024).build();
    let client = HttpClient::new(config).unwrap();
    let file = SelectedFile::pick(&path).await.unwrap();
    let (reporter, rx) = progress::channel();

    let response = client.process(&file, 4, reporter).await.unwrap();

    assert_eq!(
        response.download_link(),
        Some(format!("{}/download/map_{}_students.csv", base, size).as_str())
    );
    assert_eq!(response.original_filename.as_deref(), Some("students.csv"));
    let last = *rx.borrow();
    assert_eq!(last.total, size);
    assert_eq!(last.loaded, size);
    assert_eq!(last.percent(), 100.0);
}

#[tokio::test]
async fn test_server_error_body_is_surfaced() {
    let base = spawn_service().await;
    let temp_dir = TempDir::new().unwrap();
    let path = roster(&temp_dir).await;

    let config = ConfigBuilder::new().with_base_url(&base).build();
    let client = HttpClient::new(config).unwrap();
    let file = SelectedFile::pick(&path).await.unwrap();

    let (reporter, _rx) = progress::channel();
    let err = client.process(&file, 25, reporter).await.unwrap_err();
    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "The number of classes must be between 1-20.");
        }
        other => panic!("unexpected error: {}", other),
    }

    let config = ConfigBuilder::new()
        .with_base_url(format!("{}/broken", base))
        .build();
    let client = HttpClient::new(config).unwrap();
    let (reporter, _rx) = progress::channel();
    let err = client.process(&file, 2, reporter).await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 500, .. }));
}

#[tokio::test]
async fn test_session_flows_over_http() {
    let base = spawn_service().await;
    let temp_dir = TempDir::new().unwrap();
    let path = roster(&temp_dir).await;

    let config = ConfigBuilder::new().with_base_url(&base).build();
    let session = Session::new(Arc::new(HttpClient::new(config).unwrap()));
    session.select_file(&path).await.unwrap();
    session.set_num_classes("3").await;

    assert_eq!(session.submit_sort().await, StatusMessage::Succeeded(Flow::Sort));
    assert_eq!(
        session.submit_compute_score().await,
        StatusMessage::Succeeded(Flow::ComputeScore)
    );

    // Server-side validation failures read as a generic request failure
    session.set_num_classes("40").await;
    assert_eq!(session.submit_sort().await, StatusMessage::Failed(Flow::Sort));
}

#[tokio::test]
async fn test_missing_link_over_http() {
    let base = spawn_service().await;
    let temp_dir = TempDir::new().unwrap();
    let path = roster(&temp_dir).await;

    let config = ConfigBuilder::new()
        .with_base_url(format!("{}/nolink", base))
        .build();
    let session = Session::new(Arc::new(HttpClient::new(config).unwrap()));
    session.select_file(&path).await.unwrap();

    assert_eq!(
        session.submit_compute_score().await,
        StatusMessage::MissingDownloadLink
    );
}

#[tokio::test]
async fn test_unreachable_server_is_a_request_failure() {
    // Port 9 (discard) on loopback is not expected to accept HTTP
    let config = ConfigBuilder::new()
        .with_base_url("http://127.0.0.1:9")
        .with_timeout(5)
        .build();
    let temp_dir = TempDir::new().unwrap();
    let path = roster(&temp_dir).await;

    let session = Session::new(Arc::new(HttpClient::new(config).unwrap()));
    session.select_file(&path).await.unwrap();
    session.set_num_classes("2").await;

    assert_eq!(session.submit_sort().await.text(), "Upload failed");
}

#[tokio::test]
async fn test_download_saves_presented_name() {
    let base = spawn_service().await;
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("out");

    let config = ConfigBuilder::new()
        .with_base_url(&base)
        .with_download_dir(out_dir.clone())
        .build();
    let downloader = Downloader::new(&config).unwrap();

    let link = format!("{}/download/map_0a1b_students.csv", base);
    let saved = downloader.fetch(&link).await.unwrap();

    assert_eq!(saved.path, out_dir.join("0a1b_students.csv"));
    let content = fs::read_to_string(&saved.path).await.unwrap();
    assert!(content.starts_with("name,assigned_class"));
    assert_eq!(saved.bytes, content.len() as u64);

    // Existing files are kept unless overwrite is enabled
    tokio_test::assert_err!(downloader.fetch(&link).await);

    let overwrite = ConfigBuilder::new()
        .with_download_dir(out_dir)
        .with_overwrite(true)
        .build();
    tokio_test::assert_ok!(Downloader::new(&overwrite).unwrap().fetch(&link).await);
}
