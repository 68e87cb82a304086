use axum::{extract::State, response::Json};
use financeguard_models::{BackendResponse, ChatRequest, SimpleDialogue};
use tracing::{info, warn};

use super::ApiResult;
use crate::AppState;

/// Relay a chat query to the analysis backend
///
/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<BackendResponse>> {
    let result = state.backend.chat(&request).await;
    match &result {
        Ok(reply) if reply.is_error() => state.metrics.record("chat", "reported_error"),
        _ => state.metrics.observe("chat", &result),
    }

    match result {
        Ok(reply) => {
            info!(kind = reply.kind(), "Chat reply relayed");
            Ok(Json(reply))
        }
        Err(e) if e.is_retryable() && state.config.chat.mock_fallback => {
            warn!(error = %e, "Backend unavailable, answering from canned replies");
            state.metrics.record_mock_reply();
            Ok(Json(mock_reply(&request.query)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Keyword-matched stand-in reply used while the backend is down.
pub fn mock_reply(query: &str) -> BackendResponse {
    let query = query.to_lowercase();
    let message = if query.contains("risk") {
        "The document lists its main risk factors in section 3.2 (pages 15-18). \
         They include market volatility, interest rate changes and liquidity \
         constraints, and the fund may lose value in adverse conditions."
    } else if query.contains("fee") || query.contains("charge") {
        "Section 4.3 sets out the charges: an annual management fee of 1.5%, \
         an administrative fee of 0.2%, and a 3% penalty on withdrawals made \
         within the first 12 months."
    } else if query.contains("dispute") || query.contains("legal") {
        "Disputes are covered in section 7.1. They go to binding arbitration \
         under FINRA rules and the agreement waives the right to a jury trial."
    } else {
        "I can answer questions about this document. Try asking about a \
         specific section such as fees, risks or dispute resolution."
    };

    BackendResponse::SimpleDialogue(SimpleDialogue {
        message: message.to_string(),
        status: "success".to_string(),
        highlights: None,
    })
}
