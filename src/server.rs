//! HTTP server.
//!
//! Exposes the [`ChatService`] as a small JSON API for browser frontends.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness banner |
//! | `GET`  | `/health` | Health check |
//! | `POST` | `/upload-pdfs/` | Multipart upload, one or more `files` fields |
//! | `POST` | `/chat/` | Ask a question (`query` as form, multipart, or JSON) |
//!
//! The upload and chat routes also answer without the trailing slash.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "extraction_failed", "message": "failed to extract text from a.pdf: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413),
//! `validation_error` (422), `extraction_failed` (422), `upstream_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser frontends on
//! any host can call the API.

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::extract::MIME_PDF;
use crate::service::{ChatService, ServiceError, UploadedFile};

const ROOT_MESSAGE: &str = "✅ Multi-PDF AI Chatbot Backend is running successfully!";

/// Multipart field carrying uploaded documents.
const FILES_FIELD: &str = "files";
const QUERY_FIELD: &str = "query";

/// Build the application router around a shared [`ChatService`].
pub fn router(service: Arc<ChatService>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/upload-pdfs/", post(handle_upload))
        .route("/upload-pdfs", post(handle_upload))
        .route("/chat/", post(handle_chat))
        .route("/chat", post(handle_chat))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Starts the HTTP server.
///
/// Builds the [`ChatService`] from `config`, binds `[server].bind`, and
/// serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(ChatService::from_config(config)?);
    let app = router(service, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"validation_error"`).
    code: String,
    message: String,
}

/// Error type that converts into a JSON HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn validation_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "validation_error",
        message: message.into(),
    }
}

fn payload_too_large(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::PAYLOAD_TOO_LARGE,
        code: "payload_too_large",
        message: message.into(),
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let (status, code) = match &err {
            ServiceError::Extraction { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed")
            }
            ServiceError::Indexing(_) | ServiceError::Answering(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
        };
        tracing::warn!(%code, error = %err, "request failed");
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

/// Map a multipart read failure, keeping the body-limit case distinct.
fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large(err.body_text())
    } else {
        bad_request(err.body_text())
    }
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: ROOT_MESSAGE.to_string(),
    })
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// ============ POST /upload-pdfs/ ============

/// Handler for `POST /upload-pdfs/`.
///
/// Reads every `files` part, then hands the whole batch to
/// [`ChatService::ingest`]. Parts with other names are ignored.
async fn handle_upload(
    State(service): State<Arc<ChatService>>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.pdf").to_string();
        if let Some(content_type) = field.content_type() {
            if content_type != MIME_PDF {
                tracing::warn!(file = %name, %content_type, "upload is not labelled as a PDF");
            }
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(validation_error(format!(
            "at least one `{}` part is required",
            FILES_FIELD
        )));
    }

    let summary = service.ingest(files).await?;
    Ok(Json(MessageResponse {
        message: format!(
            "{} new PDF(s) processed and added to chat memory!",
            summary.files
        ),
    }))
}

// ============ POST /chat/ ============

#[derive(Deserialize)]
struct ChatQueryBody {
    query: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
}

/// The `query` of a chat request, read from a URL-encoded form, a
/// multipart form, or a JSON object depending on the content type.
struct ChatQuery(String);

impl<S> FromRequest<S> for ChatQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let query = if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            let mut query = None;
            while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
                if field.name() == Some(QUERY_FIELD) {
                    query = Some(field.text().await.map_err(multipart_error)?);
                    break;
                }
            }
            query
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<ChatQueryBody>::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            body.query
        } else {
            let Form(body) = Form::<ChatQueryBody>::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            body.query
        };

        query
            .map(ChatQuery)
            .ok_or_else(|| validation_error(format!("field `{}` is required", QUERY_FIELD)))
    }
}

/// Handler for `POST /chat/`.
async fn handle_chat(
    State(service): State<Arc<ChatService>>,
    ChatQuery(query): ChatQuery,
) -> Result<Json<ChatResponse>, AppError> {
    let reply = service.chat(&query).await?;
    Ok(Json(ChatResponse {
        answer: reply.text().to_string(),
    }))
}
