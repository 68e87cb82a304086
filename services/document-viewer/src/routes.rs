use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use financeguard_utils::{AppConfig, BackendClient, FinanceGuardResult};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::chat::ChatBackend;
use crate::handlers::*;
use crate::middleware::{error_handling_middleware, request_id_middleware};
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: SessionStore,
    pub chat_backend: Arc<dyn ChatBackend>,
    /// Present when uploads are also forwarded to the backend.
    pub uploader: Option<BackendClient>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        chat_backend: Arc<dyn ChatBackend>,
        uploader: Option<BackendClient>,
    ) -> Self {
        Self {
            config,
            sessions: SessionStore::new(),
            chat_backend,
            uploader,
        }
    }

    /// Wires the backend client from configuration.
    pub fn from_config(config: AppConfig) -> FinanceGuardResult<Self> {
        let client = BackendClient::new(&config)?;
        let uploader = config.upload.forward_to_backend.then(|| client.clone());
        Ok(Self::new(config, Arc::new(client), uploader))
    }
}

pub fn create_router(state: AppState) -> Router {
    let max_request_size = state.config.server.max_request_size;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/documents", document_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(axum::middleware::from_fn_with_state(
                    max_request_size,
                    error_handling_middleware,
                ))
                .layer(DefaultBodyLimit::max(max_request_size)),
        )
        .with_state(state)
}

fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_document))
        .route("/:id", get(get_document).delete(delete_document))
        .route("/:id/targets", put(update_targets))
        .route("/:id/highlights", get(get_highlights))
        .route("/:id/chat", post(chat))
        .route("/:id/messages", get(get_messages))
}
