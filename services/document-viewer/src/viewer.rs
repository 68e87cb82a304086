//! Viewer Controller
//!
//! Single owner of the loaded document, the active highlight targets and the
//! current match set. Loading a document and replacing targets both start a
//! mapping pass; every pass is tagged with a generation and only the most
//! recently started pass may commit its matches.

use financeguard_models::{HighlightCategory, HighlightMatch, HighlightTarget};
use financeguard_utils::{FinanceGuardError, FinanceGuardResult};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::highlight::{compute_matches, MapperOptions, PageError};
use crate::pdf_engine::PdfDocument;

/// What happened to the results of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    Committed { generation: u64 },
    /// A newer pass started before this one finished; its results were dropped.
    Superseded { generation: u64 },
}

impl PassOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerSnapshot {
    pub generation: u64,
    pub page_count: Option<u32>,
    pub targets: Vec<HighlightTarget>,
    pub matches: Vec<HighlightMatch>,
    pub page_errors: Vec<PageError>,
}

#[derive(Default)]
struct ViewerState {
    document: Option<Arc<dyn PdfDocument>>,
    system_targets: Vec<HighlightTarget>,
    user_targets: Vec<HighlightTarget>,
    matches: Vec<HighlightMatch>,
    page_errors: Vec<PageError>,
    generation: u64,
}

impl ViewerState {
    fn active_targets(&self) -> Vec<HighlightTarget> {
        self.system_targets
            .iter()
            .chain(&self.user_targets)
            .cloned()
            .collect()
    }

    fn begin_pass(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

#[derive(Clone)]
pub struct ViewerController {
    state: Arc<RwLock<ViewerState>>,
    options: MapperOptions,
}

impl ViewerController {
    pub fn new(options: MapperOptions) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewerState::default())),
            options,
        }
    }

    /// Replaces the document and maps the current targets onto it.
    pub async fn load_document(&self, document: Arc<dyn PdfDocument>) -> PassOutcome {
        let (generation, targets) = {
            let mut state = self.state.write().await;
            state.document = Some(Arc::clone(&document));
            state.matches.clear();
            state.page_errors.clear();
            (state.begin_pass(), state.active_targets())
        };

        info!(generation, pages = document.num_pages(), "Document loaded");
        self.run_pass(generation, document, targets).await
    }

    /// Drops the document and its matches. Targets are kept.
    pub async fn unload(&self) {
        let mut state = self.state.write().await;
        state.document = None;
        state.matches.clear();
        state.page_errors.clear();
        state.begin_pass();
    }

    /// Replaces the backend-detected targets; reviewer targets are untouched.
    pub async fn set_system_targets<I, S>(&self, texts: I) -> PassOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_targets(HighlightCategory::SystemDetected, texts).await
    }

    /// Replaces the reviewer-entered targets; backend targets are untouched.
    pub async fn set_user_targets<I, S>(&self, texts: I) -> PassOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_targets(HighlightCategory::UserAdded, texts).await
    }

    async fn replace_targets<I, S>(&self, category: HighlightCategory, texts: I) -> PassOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = normalize_targets(texts, category);
        let (generation, document, active) = {
            let mut state = self.state.write().await;
            match category {
                HighlightCategory::SystemDetected => state.system_targets = targets,
                HighlightCategory::UserAdded => state.user_targets = targets,
            }
            (state.begin_pass(), state.document.clone(), state.active_targets())
        };

        debug!(generation, category = category.as_str(), targets = active.len(), "Targets replaced");
        match document {
            Some(document) => self.run_pass(generation, document, active).await,
            None => self.commit(generation, Vec::new(), Vec::new()).await,
        }
    }

    async fn run_pass(
        &self,
        generation: u64,
        document: Arc<dyn PdfDocument>,
        targets: Vec<HighlightTarget>,
    ) -> PassOutcome {
        // The state lock is not held while pages are extracted.
        let pass = compute_matches(document.as_ref(), &targets, &self.options).await;
        self.commit(generation, pass.matches, pass.page_errors).await
    }

    async fn commit(
        &self,
        generation: u64,
        matches: Vec<HighlightMatch>,
        page_errors: Vec<PageError>,
    ) -> PassOutcome {
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(generation, current = state.generation, "Discarding superseded highlight pass");
            return PassOutcome::Superseded { generation };
        }
        state.matches = matches;
        state.page_errors = page_errors;
        PassOutcome::Committed { generation }
    }

    pub async fn has_document(&self) -> bool {
        self.state.read().await.document.is_some()
    }

    pub async fn page_count(&self) -> Option<u32> {
        self.state.read().await.document.as_ref().map(|d| d.num_pages())
    }

    /// Checks that `page` exists in the loaded document.
    pub async fn check_page(&self, page: u32) -> FinanceGuardResult<()> {
        let page_count = self.page_count().await.ok_or(FinanceGuardError::NoDocument)?;
        if page == 0 || page > page_count {
            return Err(FinanceGuardError::validation(
                "page",
                format!("Page {} out of range (1..={})", page, page_count),
            ));
        }
        Ok(())
    }

    pub async fn targets(&self) -> Vec<HighlightTarget> {
        self.state.read().await.active_targets()
    }

    pub async fn matches(&self) -> Vec<HighlightMatch> {
        self.state.read().await.matches.clone()
    }

    /// Matches to overlay on page `page`.
    pub async fn matches_for_page(&self, page: u32) -> Vec<HighlightMatch> {
        self.state
            .read()
            .await
            .matches
            .iter()
            .filter(|m| m.on_page(page))
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> ViewerSnapshot {
        let state = self.state.read().await;
        ViewerSnapshot {
            generation: state.generation,
            page_count: state.document.as_ref().map(|d| d.num_pages()),
            targets: state.active_targets(),
            matches: state.matches.clone(),
            page_errors: state.page_errors.clone(),
        }
    }
}

/// Drops blank entries and case-insensitive duplicates, keeping first-seen order.
fn normalize_targets<I, S>(texts: I, category: HighlightCategory) -> Vec<HighlightTarget>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .map(|text| HighlightTarget::new(text, category))
        .filter(|target| !target.is_blank())
        .filter(|target| seen.insert(target.text.to_lowercase()))
        .collect()
}
