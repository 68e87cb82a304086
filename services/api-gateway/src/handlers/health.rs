use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::time::Duration;

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "financeguard-api-gateway",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Health including reachability of the analysis backend.
pub async fn detailed_health_check(State(state): State<AppState>) -> Json<Value> {
    let mut health_status = json!({
        "status": "healthy",
        "service": "financeguard-api-gateway",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    let backend_url = &state.config.backend.base_url;
    let probe = tokio::time::timeout(Duration::from_secs(5), probe_backend(backend_url)).await;
    let backend_status = match probe {
        Ok(Ok(())) => json!({"status": "healthy", "message": "Reachable"}),
        Ok(Err(e)) => json!({"status": "unhealthy", "message": e.to_string()}),
        Err(_) => json!({"status": "unhealthy", "message": "Timed out"}),
    };
    health_status["checks"]["backend"] = backend_status;

    let all_healthy = health_status["checks"]
        .as_object()
        .map_or(true, |checks| checks.values().all(|check| check["status"] == "healthy"));

    if !all_healthy {
        health_status["status"] = json!("degraded");
    }

    Json(health_status)
}

/// Opens a TCP connection to the backend host.
async fn probe_backend(base_url: &str) -> std::io::Result<()> {
    let authority = base_url
        .split("://")
        .nth(1)
        .unwrap_or(base_url)
        .split('/')
        .next()
        .unwrap_or_default();
    let address = if authority.contains(':') {
        authority.to_string()
    } else if base_url.starts_with("https://") {
        format!("{}:443", authority)
    } else {
        format!("{}:80", authority)
    };
    tokio::net::TcpStream::connect(address).await.map(|_| ())
}
