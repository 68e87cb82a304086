//! FinanceGuard Document Viewer
//!
//! Opens uploaded financial PDFs, keeps a review session per document and
//! maps the clauses flagged by the analysis backend (or entered by the
//! reviewer) onto rendered-page overlay rectangles.

pub mod chat;
pub mod handlers;
pub mod highlight;
pub mod middleware;
pub mod pdf_engine;
pub mod routes;
pub mod session;
pub mod text_layer;
pub mod viewer;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod testing;

pub use routes::{create_router, AppState};
