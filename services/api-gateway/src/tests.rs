//! Router tests against a stub analysis backend.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use financeguard_utils::{AppConfig, RETRY_MESSAGE};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

use crate::create_app;

const BOUNDARY: &str = "financeguard-gateway-boundary";

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn stub_chat(State(hits): State<Hits>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    hits.hit();
    match body["query"].as_str().unwrap_or_default() {
        "locked" => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid API key" }))),
        "crash" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "stack trace" }))),
        "gibberish" => (
            StatusCode::OK,
            Json(json!({ "type": "simple_dialogue", "message": "Query not understood", "status": "error" })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "type": "highlighted_clause",
                "message": "The exit fee clause applies.",
                "highlights": ["exit fee"]
            })),
        ),
    }
}

async fn stub_upload(State(hits): State<Hits>) -> Json<Value> {
    hits.hit();
    Json(json!({ "documentId": "doc_7", "url": "https://files.example/doc_7.pdf" }))
}

async fn stub_area(State(hits): State<Hits>) -> Json<Value> {
    hits.hit();
    Json(json!({ "analysis": "A table of quarterly fees" }))
}

async fn spawn_backend(hits: Hits) -> String {
    let router = Router::new()
        .route("/chat", post(stub_chat))
        .route("/api/pdf/upload", post(stub_upload))
        .route("/api/analyze-area", post(stub_area))
        .with_state(hits);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

fn config_for(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.base_url = base_url.to_string();
    config.backend.timeout_seconds = 5;
    config
}

fn app(config: &AppConfig) -> Router {
    create_app(config).unwrap()
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_upload(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/pdf-upload")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_chat_relays_typed_reply() {
    let hits = Hits::default();
    let app = app(&config_for(&spawn_backend(hits.clone()).await));

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "What about exit fees?" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "highlighted_clause");
    assert_eq!(body["highlights"], json!(["exit fee"]));
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn test_empty_query_rejected_without_backend_call() {
    let hits = Hits::default();
    let app = app(&config_for(&spawn_backend(hits.clone()).await));

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn test_unreachable_backend_reports_retry_message() {
    let app = app(&config_for(&closed_port().await));

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "Any risks?" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], RETRY_MESSAGE);
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_backend_server_error_hides_details() {
    let app = app(&config_for(&spawn_backend(Hits::default()).await));

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "crash" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], RETRY_MESSAGE);
}

#[tokio::test]
async fn test_backend_rejecting_credentials_is_auth_error() {
    let app = app(&config_for(&spawn_backend(Hits::default()).await));

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "locked" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_ERROR");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_mock_fallback_answers_when_backend_down() {
    let mut config = config_for(&closed_port().await);
    config.chat.mock_fallback = true;
    let app = app(&config);

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "What fees apply?" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "simple_dialogue");
    assert!(body["message"].as_str().unwrap().contains("1.5%"));
}

#[tokio::test]
async fn test_mock_fallback_does_not_mask_auth_errors() {
    let mut config = config_for(&spawn_backend(Hits::default()).await);
    config.chat.mock_fallback = true;
    let app = app(&config);

    let (status, _) = send(&app, json_post("/api/chat", json!({ "query": "locked" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_oversized_upload_never_reaches_backend() {
    let hits = Hits::default();
    let mut config = config_for(&spawn_backend(hits.clone()).await);
    config.server.max_request_size = 20 * 1024 * 1024;
    let app = app(&config);

    let data = vec![b'%'; 12 * 1024 * 1024];
    let (status, body) = send(&app, multipart_upload("big.pdf", "application/pdf", &data)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("10.0 MB"));
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn test_non_pdf_upload_never_reaches_backend() {
    let hits = Hits::default();
    let app = app(&config_for(&spawn_backend(hits.clone()).await));

    let (status, body) = send(&app, multipart_upload("notes.txt", "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field_rejected() {
    let app = app(&config_for(&spawn_backend(Hits::default()).await));

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/pdf-upload")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_upload_relays_backend_reply() {
    let hits = Hits::default();
    let app = app(&config_for(&spawn_backend(hits.clone()).await));

    let (status, body) = send(&app, multipart_upload("fund.pdf", "application/pdf", b"%PDF-1.4\n%%EOF")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documentId"], "doc_7");
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn test_analyze_area_validates_and_relays() {
    let hits = Hits::default();
    let app = app(&config_for(&spawn_backend(hits.clone()).await));
    let position = json!({ "x": 10.0, "y": 20.0, "width": 100.0, "height": 50.0, "page": 2 });

    let (status, _) = send(
        &app,
        json_post("/api/analyze-area", json!({ "image": "not-a-data-url", "position": position })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(hits.count(), 0);

    let (status, body) = send(
        &app,
        json_post(
            "/api/analyze-area",
            json!({ "image": "data:image/png;base64,iVBORw0KGgo=", "position": position }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"], "A table of quarterly fees");
}

#[tokio::test]
async fn test_metrics_count_relayed_requests() {
    let app = app(&config_for(&spawn_backend(Hits::default()).await));
    send(&app, json_post("/api/chat", json!({ "query": "hello" }))).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("financeguard_gateway_requests_total{outcome=\"success\",route=\"chat\"} 1"));
}

#[tokio::test]
async fn test_reported_error_replies_are_relayed_and_counted() {
    let app = app(&config_for(&spawn_backend(Hits::default()).await));

    let (status, body) = send(&app, json_post("/api/chat", json!({ "query": "gibberish" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("financeguard_gateway_requests_total{outcome=\"reported_error\",route=\"chat\"} 1"));
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let mut config = config_for(&closed_port().await);
    config.monitoring.metrics_enabled = false;
    let app = app(&config);

    let (status, _) = send(&app, Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_service() {
    let app = app(&config_for(&closed_port().await));

    let (status, body) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "financeguard-api-gateway");
}

#[tokio::test]
async fn test_detailed_health_degrades_when_backend_down() {
    let app = app(&config_for(&closed_port().await));

    let uri = "/api/health/detailed";
    let (_, body) = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["backend"]["status"], "unhealthy");

    let app = self::app(&config_for(&spawn_backend(Hits::default()).await));
    let (_, body) = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(body["status"], "healthy");
}
