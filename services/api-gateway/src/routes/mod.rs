use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::*, AppState};

pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/pdf-upload", post(upload_pdf))
        .route("/chat", post(chat))
        .route("/analyze-area", post(analyze_area))
        .route("/health/detailed", get(detailed_health_check))
}
