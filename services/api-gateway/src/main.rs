use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    serve, Router,
};
use financeguard_utils::{init_logging, AppConfig, BackendClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod handlers;
mod metrics;
mod middleware;
mod routes;
#[cfg(test)]
mod tests;

use handlers::health_check;
use metrics::GatewayMetrics;
use middleware::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load_for_service("api-gateway", 8080).unwrap_or_else(|_| {
        eprintln!("Failed to load configuration, using defaults");
        AppConfig::default()
    });

    // Initialize logging
    init_logging(&config.logging)?;
    info!("Starting FinanceGuard API Gateway");
    info!(backend = %config.backend.base_url, "Relaying to analysis backend");

    // Build application router
    let app = create_app(&config)?;

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("API Gateway listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}

fn create_app(config: &AppConfig) -> Result<Router> {
    let state = AppState {
        config: config.clone(),
        backend: BackendClient::new(config)?,
        metrics: Arc::new(GatewayMetrics::new(&config.monitoring.prometheus_namespace)?),
    };

    let mut app = Router::new()
        // Health check endpoint
        .route("/health", get(health_check));

    if config.monitoring.metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    let app = app
        // API routes
        .nest("/api", routes::create_api_routes())
        // Middleware stack
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(axum::middleware::from_fn_with_state(
                    config.server.max_request_size,
                    error_handling_middleware,
                ))
                .layer(DefaultBodyLimit::max(config.server.max_request_size)),
        )
        // Application state
        .with_state(state);

    Ok(app)
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: BackendClient,
    pub metrics: Arc<GatewayMetrics>,
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

