
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::RagError;
use crate::config::{Config, UploadMode};
use crate::indexer::{IndexStatus, IndexingStats};
use crate::rag::{ConversationState, Orchestrator};

/// Errors returned to HTTP clients as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RagError> for ApiError {
    #[inline]
    fn from(e: RagError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
}

impl AppState {
    #[inline]
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<Config>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub stats: IndexingStats,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub index: IndexStatus,
}

/// All routes with CORS, tracing and the upload size limit applied.
#[inline]
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir();
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/uploadfile/", post(upload_file))
        .route("/retrain", post(retrain))
        .route("/:page", get(named_page))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
#[inline]
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Chatbot server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<ConversationState>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question cannot be empty".to_string()));
    }

    let answer = state.orchestrator.ask(&request.question).await?;
    Ok(Json(answer))
}

async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IndexResponse>, ApiError> {
    let mut saved = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| ApiError::BadRequest("Upload has no usable file name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let document_dir = state.config.document_dir();
        tokio::fs::create_dir_all(&document_dir)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create document directory: {}", e)))?;

        let path = document_dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to save {}: {}", file_name, e)))?;

        info!("Saved upload {} ({} bytes)", path.display(), bytes.len());
        saved = Some((file_name, path));
        break;
    }

    let (file_name, path) =
        saved.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;

    let indexer = state.orchestrator.indexer();
    let stats = match state.config.ingest.upload_mode {
        UploadMode::Retrain => indexer.retrain().await,
        UploadMode::Append => indexer.append_files(vec![path]).await,
    }
    .map_err(|e| ApiError::Internal(format!("Failed to index {}: {}", file_name, e)))?;

    Ok(Json(IndexResponse {
        message: format!("File '{}' uploaded and vector store updated", file_name),
        stats,
    }))
}

async fn retrain(State(state): State<AppState>) -> Result<Json<IndexResponse>, ApiError> {
    let stats = state
        .orchestrator
        .indexer()
        .retrain()
        .await
        .map_err(|e| ApiError::Internal(format!("Retrain failed: {}", e)))?;

    Ok(Json(IndexResponse {
        message: "Vector store retrained successfully".to_string(),
        stats,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        index: state.orchestrator.indexer().status().await,
    })
}

async fn index_page(State(state): State<AppState>) -> Result<Response, ApiError> {
    let static_dir = state.config.static_dir();
    let index = static_dir.join("index.html");
    let path = if index.is_file() {
        index
    } else {
        static_dir.join("login.html")
    };

    html_file(&path, "index.html").await
}

async fn named_page(
    State(state): State<AppState>,
    axum::extract::Path(page): axum::extract::Path<String>,
) -> Result<Response, ApiError> {
    let name = page.strip_suffix(".html").unwrap_or(&page);
    if !state.config.server.pages.iter().any(|p| p == name) {
        return Err(ApiError::NotFound("Not Found".to_string()));
    }

    let file_name = format!("{}.html", name);
    html_file(&state.config.static_dir().join(&file_name), &file_name).await
}

async fn html_file(path: &Path, label: &str) -> Result<Response, ApiError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok((
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound(format!(
            "Page ({}) not found in static folder.",
            label
        ))),
        Err(e) => Err(ApiError::Internal(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Keep only the final path component of a client-supplied file name.
#[inline]
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    let file_name = PathBuf::from(normalized)
        .file_name()?
        .to_string_lossy()
        .trim()
        .to_string();

    if file_name.is_empty() || file_name == "." || file_name == ".." {
        None
    } else {
        Some(file_name)
    }
}
