#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! HTTP round trips through the full router, backed by a fake Ollama server.

mod common;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chatbot_rag::commands::build_orchestrator;
use chatbot_rag::config::UploadMode;
use chatbot_rag::rag::NO_CONTEXT_ANSWER;
use chatbot_rag::server::{AppState, router};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{config_for, expect_generation, start_ollama, write_document};

const BOUNDARY: &str = "integration-boundary";

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("should read body");
    (
        status,
        serde_json::from_slice(&bytes).unwrap_or(Value::Null),
    )
}

fn ask_request(question: &str) -> Request<Body> {
    Request::post("/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "question": question }).to_string()))
        .expect("should build request")
}

fn upload_request(file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    Request::post("/uploadfile/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("should build request")
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_then_ask() {
    let server = start_ollama().await;
    expect_generation(&server, "<table><tr><td>24.5</td></tr></table>", 1).await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());

    let orchestrator = build_orchestrator(&config).expect("orchestrator");
    orchestrator.indexer().initialize().await.expect("initialize");
    let app = router(AppState::new(orchestrator, Arc::new(config)));

    let (status, body) = call(&app, ask_request("Điểm chuẩn ngành Cơ khí?")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], NO_CONTEXT_ANSWER);

    let (status, body) = call(
        &app,
        upload_request("diemchuan.txt", "Điểm chuẩn ngành Cơ khí năm 2025 là 24.5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
    assert_eq!(body["stats"]["indexed_chunks"], 1);

    let (status, body) = call(&app, ask_request("Điểm chuẩn ngành Cơ khí?")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"], "Điểm chuẩn ngành Cơ khí?");
    assert_eq!(body["answer"], "<table><tr><td>24.5</td></tr></table>");
    assert_eq!(
        body["context"][0]["metadata"]["source"],
        temp_dir
            .path()
            .join("data")
            .join("diemchuan.txt")
            .display()
            .to_string()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn append_uploads_accumulate() {
    let server = start_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = config_for(&server, temp_dir.path());
    config.ingest.upload_mode = UploadMode::Append;
    write_document(&config, "base.txt", "tài liệu gốc");

    let orchestrator = build_orchestrator(&config).expect("orchestrator");
    orchestrator.indexer().initialize().await.expect("initialize");
    let app = router(AppState::new(orchestrator, Arc::new(config)));

    let (status, _) = call(&app, upload_request("a.txt", "tệp một")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, upload_request("a.txt", "tệp một")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["stats"]["indexed_chunks"], 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_outage_surfaces_as_server_error() {
    let server = start_ollama().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = config_for(&server, temp_dir.path());
    config.ollama.port = 1;
    write_document(&config, "a.txt", "nội dung");

    let orchestrator = build_orchestrator(&config).expect("orchestrator");
    let app = router(AppState::new(orchestrator, Arc::new(config)));

    let (status, body) = call(
        &app,
        Request::post("/retrain")
            .body(Body::empty())
            .expect("should build request"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["detail"]
            .as_str()
            .expect("detail")
            .starts_with("Retrain failed")
    );
}
