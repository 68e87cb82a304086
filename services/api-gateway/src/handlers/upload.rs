use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use financeguard_models::PdfUploadResponse;
use financeguard_utils::{format_file_size, FinanceGuardError};
use tracing::info;

use super::ApiResult;
use crate::middleware::ApiError;
use crate::AppState;

fn multipart_error(error: MultipartError, max_size: u64) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return FinanceGuardError::validation(
            "file_size",
            format!("File too large. Please upload a file smaller than {}", format_file_size(max_size)),
        )
        .into();
    }
    FinanceGuardError::validation("file", format!("Failed to read upload: {}", error.body_text())).into()
}

/// Forward an uploaded PDF to the backend
///
/// POST /api/pdf-upload
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PdfUploadResponse>> {
    let max_size = state.backend.max_upload_bytes();

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e, max_size))?;
        upload = Some((filename, content_type, data));
        break;
    }
    let (filename, content_type, data) =
        upload.ok_or_else(|| FinanceGuardError::validation("file", "No file provided"))?;

    let size_bytes = data.len() as u64;
    let result = state
        .backend
        .upload_pdf(&filename, &content_type, data.to_vec())
        .await;
    state.metrics.observe("pdf_upload", &result);
    let reply = result?;

    state.metrics.record_upload(size_bytes);
    info!(filename = %filename, size_bytes, reference = ?reply.reference(), "PDF forwarded");
    Ok(Json(reply))
}
