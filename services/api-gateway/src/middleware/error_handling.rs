use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use financeguard_utils::{format_file_size, ErrorResponse, FinanceGuardError};
use tracing::{error, warn};

/// Handler error rendered as an [`ErrorResponse`] body.
#[derive(Debug)]
pub struct ApiError(pub FinanceGuardError);

impl From<FinanceGuardError> for ApiError {
    fn from(error: FinanceGuardError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "Request failed");
        } else {
            warn!(code = self.0.error_code(), error = %self.0, "Request rejected");
        }
        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

/// Rewrites body-limit rejections into the JSON error shape.
pub async fn error_handling_middleware(
    State(max_request_size): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError(FinanceGuardError::validation(
            "file_size",
            format!(
                "Request too large. Please upload a file smaller than {}",
                format_file_size(max_request_size as u64)
            ),
        ))
        .into_response();
    }
    response
}
