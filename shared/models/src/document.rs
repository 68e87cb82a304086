use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::highlight::HighlightTarget;

/// Reply of the backend upload endpoint.
///
/// The backend is free to shape this however it likes; the identifier and URL
/// are picked out when present and everything else is carried through.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfUploadResponse {
    #[serde(default, alias = "fileId", alias = "id", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, alias = "fileUrl", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PdfUploadResponse {
    /// The opaque handle the backend gave for the document.
    pub fn reference(&self) -> Option<&str> {
        self.document_id.as_deref().or(self.url.as_deref())
    }
}

/// Metadata of a document held by a review session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub filename: String,
    pub size_bytes: u64,
    pub page_count: u32,
    pub upload_date: DateTime<Utc>,
    pub backend_reference: Option<String>,
    pub targets: Vec<HighlightTarget>,
    pub match_count: usize,
}

/// Rectangle captured by the area-analysis tool, in rendered pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct AreaPosition {
    #[validate(range(min = 0.0, message = "x must not be negative"))]
    pub x: f64,
    #[validate(range(min = 0.0, message = "y must not be negative"))]
    pub y: f64,
    #[validate(range(min = 1.0, message = "Captured area must be at least one pixel wide"))]
    pub width: f64,
    #[validate(range(min = 1.0, message = "Captured area must be at least one pixel tall"))]
    pub height: f64,
    #[validate(range(min = 1, message = "Page numbers start at 1"))]
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AreaAnalysisRequest {
    /// Captured image as a `data:image/...;base64,` URL.
    #[validate(length(min = 1, message = "Image is required"))]
    pub image: String,
    #[validate]
    pub position: AreaPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AreaAnalysisResponse {
    Analysis { analysis: serde_json::Value },
    Error { error: String },
}
