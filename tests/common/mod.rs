//! Shared helpers for the HTTP integration tests: hand-built PDFs, a mock
//! OpenAI-compatible upstream, and a router wired to it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use pdf_chat::config::Config;
use pdf_chat::server::router;
use pdf_chat::service::ChatService;
use pdf_chat_core::testing::bag_of_words;

pub const BOUNDARY: &str = "pdfchattestboundary";

/// Minimal single-page PDF with one text line per entry in `lines`.
///
/// Builds the body first and then the xref table from the recorded byte
/// offsets so pdf-extract can parse it.
pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    let mut content = String::new();
    for (i, line) in lines.iter().enumerate() {
        let y = 760 - (i as i32) * 12;
        content.push_str(&format!(
            "BT /F1 12 Tf 72 {} Td ({}) Tj ET\n",
            y,
            escape_pdf_string(line)
        ));
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn escape_pdf_string(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

// ============ Mock upstream ============

/// Call counters and failure switches for the mock upstream.
#[derive(Default)]
pub struct Upstream {
    pub embedding_calls: AtomicUsize,
    pub embedded_inputs: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub fail_chat: AtomicBool,
    pub fail_embeddings: AtomicBool,
}

impl Upstream {
    pub fn calls(&self) -> (usize, usize) {
        (
            self.embedding_calls.load(Ordering::SeqCst),
            self.chat_calls.load(Ordering::SeqCst),
        )
    }
}

async fn mock_embeddings(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> Response {
    upstream.embedding_calls.fetch_add(1, Ordering::SeqCst);
    if upstream.fail_embeddings.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "embedding backend down").into_response();
    }
    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    upstream
        .embedded_inputs
        .fetch_add(inputs.len(), Ordering::SeqCst);
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, text)| json!({ "object": "embedding", "index": i, "embedding": bag_of_words(text) }))
        .collect();
    Json(json!({ "object": "list", "data": data, "model": body["model"] })).into_response()
}

/// Echoes the system message (the stuffed context) for answers, and the
/// follow-up question for condense requests.
async fn mock_chat(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> Response {
    upstream.chat_calls.fetch_add(1, Ordering::SeqCst);
    if upstream.fail_chat.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded").into_response();
    }
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let content = match messages.iter().find(|m| m["role"] == "system") {
        Some(system) => system["content"].as_str().unwrap_or_default().to_string(),
        None => {
            let prompt = messages
                .last()
                .and_then(|m| m["content"].as_str())
                .unwrap_or_default();
            prompt
                .split("Follow Up Input: ")
                .nth(1)
                .and_then(|rest| rest.lines().next())
                .unwrap_or(prompt)
                .to_string()
        }
    };
    Json(json!({
        "object": "chat.completion",
        "choices": [ { "index": 0, "message": { "role": "assistant", "content": content } } ]
    }))
    .into_response()
}

/// Serve the mock upstream on an ephemeral port; returns its `/v1` base URL.
pub async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(mock_embeddings))
        .route("/v1/chat/completions", post(mock_chat))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

// ============ App harness ============

pub struct TestApp {
    pub router: Router,
    pub service: Arc<ChatService>,
    pub upstream: Arc<Upstream>,
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub async fn test_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let upstream = Arc::new(Upstream::default());
    let base_url = spawn_upstream(upstream.clone()).await;

    let mut config = Config::default();
    config.embedding.base_url = base_url.clone();
    config.embedding.api_key = Some("test-key".to_string());
    config.embedding.max_retries = 0;
    config.llm.base_url = base_url;
    config.llm.api_key = Some("test-key".to_string());
    config.llm.max_retries = 0;
    customize(&mut config);

    let service = Arc::new(ChatService::from_config(&config).unwrap());
    let router = router(service.clone(), config.server.max_upload_bytes);
    TestApp {
        router,
        service,
        upstream,
    }
}

/// One part of a multipart body: field name, optional file name and
/// content type, and bytes.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub bytes: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn pdf(file_name: &'a str, bytes: Vec<u8>) -> Self {
        Part {
            name: "files",
            file_name: Some(file_name),
            content_type: Some("application/pdf"),
            bytes,
        }
    }

    pub fn text(name: &'a str, value: &str) -> Self {
        Part {
            name,
            file_name: None,
            content_type: None,
            bytes: value.as_bytes().to_vec(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{}\"", file_name));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn form_request(uri: &str, query: &str) -> Request<Body> {
    let body = serde_urlencoded::to_string([("query", query)]).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send `request` through the router and return status plus JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn upload(app: &TestApp, files: Vec<(&str, Vec<u8>)>) -> (StatusCode, Value) {
    let parts: Vec<Part<'_>> = files
        .into_iter()
        .map(|(name, bytes)| Part::pdf(name, bytes))
        .collect();
    send(&app.router, multipart_request("/upload-pdfs/", &parts)).await
}

pub async fn ask(app: &TestApp, query: &str) -> (StatusCode, Value) {
    send(&app.router, form_request("/chat/", query)).await
}
