//! PDF Engine
//!
//! Read-only access to an opened PDF: page count, per-page viewports and
//! per-page text content. The mapper only sees the [`PdfDocument`] and
//! [`PdfPage`] traits; [`LopdfDocument`] is the production implementation.

use async_trait::async_trait;
use financeguard_models::{TextRun, Viewport};
use financeguard_utils::{FinanceGuardError, FinanceGuardResult};
use lopdf::{Document, ObjectId};
use std::sync::Arc;
use tracing::debug;

use crate::text_layer;

/// An opened PDF document.
#[async_trait]
pub trait PdfDocument: Send + Sync {
    fn num_pages(&self) -> u32;

    /// Fetches page `number` (1-based).
    async fn page(&self, number: u32) -> FinanceGuardResult<Box<dyn PdfPage>>;
}

#[async_trait]
pub trait PdfPage: Send + Sync {
    fn number(&self) -> u32;

    /// Geometry of the page rendered at `scale`; scale 1 gives the native size.
    fn viewport(&self, scale: f64) -> Viewport;

    /// The page's text runs in content-stream order.
    async fn text_content(&self) -> FinanceGuardResult<Vec<TextRun>>;
}

/// A PDF parsed with lopdf.
#[derive(Clone)]
pub struct LopdfDocument {
    inner: Arc<Document>,
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl LopdfDocument {
    pub fn parse(bytes: &[u8]) -> FinanceGuardResult<Self> {
        let inner = Document::load_mem(bytes)
            .map_err(|e| FinanceGuardError::document_processing(format!("Failed to parse PDF: {}", e)))?;

        // get_pages is keyed by 1-based page number
        let page_ids: Vec<ObjectId> = inner.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(FinanceGuardError::document_processing("PDF contains no pages"));
        }

        debug!(pages = page_ids.len(), "Parsed PDF document");
        Ok(Self {
            inner: Arc::new(inner),
            page_ids,
        })
    }

    /// Parses on the blocking pool.
    pub async fn open(bytes: Vec<u8>) -> FinanceGuardResult<Self> {
        tokio::task::spawn_blocking(move || Self::parse(&bytes))
            .await
            .map_err(|e| FinanceGuardError::internal(format!("PDF parser task failed: {}", e)))?
    }
}

#[async_trait]
impl PdfDocument for LopdfDocument {
    fn num_pages(&self) -> u32 {
        self.page_ids.len() as u32
    }

    async fn page(&self, number: u32) -> FinanceGuardResult<Box<dyn PdfPage>> {
        let object_id = number
            .checked_sub(1)
            .and_then(|index| self.page_ids.get(index as usize))
            .copied()
            .ok_or_else(|| {
                FinanceGuardError::validation(
                    "page",
                    format!("Page {} out of range (1..={})", number, self.page_ids.len()),
                )
            })?;

        let [x0, y0, x1, y1] = text_layer::media_box(&self.inner, object_id);
        Ok(Box::new(LopdfPage {
            doc: Arc::clone(&self.inner),
            object_id,
            number,
            width: x1 - x0,
            height: y1 - y0,
        }))
    }
}

struct LopdfPage {
    doc: Arc<Document>,
    object_id: ObjectId,
    number: u32,
    width: f64,
    height: f64,
}

#[async_trait]
impl PdfPage for LopdfPage {
    fn number(&self) -> u32 {
        self.number
    }

    fn viewport(&self, scale: f64) -> Viewport {
        Viewport::for_page(self.width, self.height, scale)
    }

    async fn text_content(&self) -> FinanceGuardResult<Vec<TextRun>> {
        let doc = Arc::clone(&self.doc);
        let (object_id, number) = (self.object_id, self.number);
        tokio::task::spawn_blocking(move || text_layer::extract_text_runs(&doc, object_id, number))
            .await
            .map_err(|e| FinanceGuardError::page_extraction(number, format!("extraction task failed: {}", e)))?
    }
}
