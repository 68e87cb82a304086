//! In-memory documents for mapper and controller tests.

use async_trait::async_trait;
use financeguard_models::{TextRun, Viewport};
use financeguard_utils::{FinanceGuardError, FinanceGuardResult};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;

use crate::pdf_engine::{PdfDocument, PdfPage};

/// Holds the first extraction that reaches it until released.
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn armed() -> Arc<Self> {
        Arc::new(Self {
            armed: AtomicBool::new(true),
            ..Self::default()
        })
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[derive(Clone)]
pub struct FakePage {
    runs: Option<Vec<TextRun>>,
}

impl FakePage {
    pub fn with_runs(runs: Vec<TextRun>) -> Self {
        Self { runs: Some(runs) }
    }

    pub fn failing() -> Self {
        Self { runs: None }
    }
}

pub struct FakeDocument {
    pages: Vec<FakePage>,
    extractions: Arc<AtomicUsize>,
    gate: Option<Arc<Gate>>,
}

impl FakeDocument {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            extractions: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfDocument for FakeDocument {
    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn page(&self, number: u32) -> FinanceGuardResult<Box<dyn PdfPage>> {
        let page = number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .cloned()
            .ok_or_else(|| FinanceGuardError::validation("page", "out of range"))?;
        Ok(Box::new(FakePageHandle {
            number,
            page,
            extractions: Arc::clone(&self.extractions),
            gate: self.gate.clone(),
        }))
    }
}

struct FakePageHandle {
    number: u32,
    page: FakePage,
    extractions: Arc<AtomicUsize>,
    gate: Option<Arc<Gate>>,
}

#[async_trait]
impl PdfPage for FakePageHandle {
    fn number(&self) -> u32 {
        self.number
    }

    fn viewport(&self, scale: f64) -> Viewport {
        Viewport::for_page(612.0, 792.0, scale)
    }

    async fn text_content(&self) -> FinanceGuardResult<Vec<TextRun>> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.page
            .runs
            .clone()
            .ok_or_else(|| FinanceGuardError::page_extraction(self.number, "malformed content stream"))
    }
}
