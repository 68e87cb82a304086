use axum::{extract::State, response::Json};
use financeguard_models::{AreaAnalysisRequest, AreaAnalysisResponse};
use tracing::info;

use super::ApiResult;
use crate::AppState;

/// Relay a captured page region for analysis
///
/// POST /api/analyze-area
pub async fn analyze_area(
    State(state): State<AppState>,
    Json(request): Json<AreaAnalysisRequest>,
) -> ApiResult<Json<AreaAnalysisResponse>> {
    let result = state.backend.analyze_area(&request).await;
    state.metrics.observe("analyze_area", &result);
    let reply = result?;

    info!(page = request.position.page, "Area analysis relayed");
    Ok(Json(reply))
}
