//! HTTP handlers for review sessions.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use financeguard_models::{
    BackendResponse, ChatMessage, ChatRequest, DocumentSummary, HighlightMatch, HighlightTarget,
    TargetsRequest,
};
use financeguard_utils::{
    format_file_size, validate_model, validate_pdf_upload, FinanceGuardError, UploadCandidate,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::highlight::{MapperOptions, PageError};
use crate::middleware::ApiError;
use crate::pdf_engine::{LopdfDocument, PdfDocument};
use crate::routes::AppState;
use crate::session::ReviewSession;
use crate::viewer::ViewerController;

type ApiResult<T> = Result<T, ApiError>;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "financeguard-document-viewer",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len().await,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentUploadResponse {
    pub document_id: Uuid,
    pub filename: String,
    pub size_bytes: u64,
    pub page_count: u32,
    pub backend_reference: Option<String>,
    pub status: String,
}

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

/// Upload a PDF and open a review session for it
///
/// POST /api/v1/documents/upload
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DocumentUploadResponse>> {
    let max_size = state.config.upload.max_file_size;

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
    validate_pdf_upload(
        &UploadCandidate {
            file_name: &filename,
            content_type: &content_type,
            size_bytes,
        },
        max_size,
    )?;

    let document = LopdfDocument::open(data.to_vec()).await?;

    let backend_reference = match &state.uploader {
        Some(uploader) => uploader
            .upload_pdf(&filename, &content_type, data.to_vec())
            .await?
            .reference()
            .map(str::to_string),
        None => None,
    };

    let page_count = document.num_pages();
    let viewer = ViewerController::new(MapperOptions::from(&state.config.viewer));
    viewer.load_document(Arc::new(document)).await;
    let session = state
        .sessions
        .insert(ReviewSession::new(
            filename.clone(),
            size_bytes,
            backend_reference.clone(),
            viewer,
            &state.config.chat.welcome_message,
        ))
        .await;

    info!(document_id = %session.id, filename = %filename, size_bytes, page_count, "Review session opened");
    Ok(Json(DocumentUploadResponse {
        document_id: session.id,
        filename,
        size_bytes,
        page_count,
        backend_reference,
        status: "loaded".to_string(),
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentSummary>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.summary().await))
}

/// Current targets and matches of a session.
#[derive(Debug, Serialize, Deserialize)]
pub struct HighlightsResponse {
    pub document_id: Uuid,
    pub generation: u64,
    pub targets: Vec<HighlightTarget>,
    pub matches: Vec<HighlightMatch>,
    pub page_errors: Vec<PageError>,
}

async fn highlights_response(session: &ReviewSession, page: Option<u32>) -> HighlightsResponse {
    let snapshot = session.viewer().snapshot().await;
    let matches = match page {
        Some(page) => snapshot.matches.into_iter().filter(|m| m.on_page(page)).collect(),
        None => snapshot.matches,
    };
    HighlightsResponse {
        document_id: session.id,
        generation: snapshot.generation,
        targets: snapshot.targets,
        matches,
        page_errors: snapshot.page_errors,
    }
}

/// Replace the reviewer-entered targets
///
/// PUT /api/v1/documents/:id/targets
pub async fn update_targets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TargetsRequest>,
) -> ApiResult<Json<HighlightsResponse>> {
    validate_model(&request)?;
    let session = state.sessions.get(id).await?;
    session.viewer().set_user_targets(request.targets).await;
    Ok(Json(highlights_response(&session, None).await))
}

#[derive(Debug, Deserialize)]
pub struct HighlightQuery {
    pub page: Option<u32>,
}

pub async fn get_highlights(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HighlightQuery>,
) -> ApiResult<Json<HighlightsResponse>> {
    let session = state.sessions.get(id).await?;
    if let Some(page) = query.page {
        session.viewer().check_page(page).await?;
    }
    Ok(Json(highlights_response(&session, query.page).await))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: BackendResponse,
    pub message: ChatMessage,
    pub targets: Vec<HighlightTarget>,
    pub matches: Vec<HighlightMatch>,
}

/// Ask the backend about a session's document
///
/// POST /api/v1/documents/:id/chat
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let session = state.sessions.get(id).await?;
    let exchange = session.chat(state.chat_backend.as_ref(), request).await?;
    let snapshot = session.viewer().snapshot().await;

    Ok(Json(ChatResponse {
        reply: exchange.reply,
        message: exchange.message,
        targets: snapshot.targets,
        matches: snapshot.matches,
    }))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.transcript().await))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.sessions.remove(id).await?;
    info!(document_id = %id, "Review session closed");
    Ok(StatusCode::NO_CONTENT)
}
