//! # FinanceGuard Domain Models
//!
//! Core data structures shared by the FinanceGuard document review services.
//! All models serialize with serde; request payloads validate with the
//! validator crate.
//!
//! ## Key Models
//!
//! - **TextRun / Viewport**: a page's extracted text layer and its render geometry
//! - **HighlightTarget / HighlightMatch**: what to look for and where it was found
//! - **BackendResponse**: the closed union of chat reply shapes sent by the analysis backend
//! - **PdfUploadResponse / AreaAnalysisRequest**: pass-through payloads for the backend endpoints

pub mod chat;
pub mod document;
pub mod highlight;


pub use chat::*;
pub use document::*;
pub use highlight::*;
