//! Highlight domain models for the FinanceGuard viewer.
//!
//! This module defines the text-layer and overlay geometry shared by the
//! PDF engine, the highlight mapper and the HTTP surfaces.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Identity affine matrix in PDF order `[a, b, c, d, e, f]`.
pub const IDENTITY_TRANSFORM: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// A contiguous span of text extracted from a page's content stream.
///
/// `transform` is expressed in PDF user space (origin bottom-left); elements
/// 4 and 5 carry the run's origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub transform: [f64; 6],
    pub width: f64,
    pub height: f64,
}

impl TextRun {
    pub fn new(text: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        let mut transform = IDENTITY_TRANSFORM;
        transform[4] = x;
        transform[5] = y;
        Self {
            text: text.into(),
            transform,
            width,
            height,
        }
    }

    pub fn x(&self) -> f64 {
        self.transform[4]
    }

    pub fn y(&self) -> f64 {
        self.transform[5]
    }
}

/// Rendering geometry of a single page at a given scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scale: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Builds the viewport for a page of native size `width` x `height` points.
    pub fn for_page(width: f64, height: f64, scale: f64) -> Self {
        Self {
            scale,
            width: width * scale,
            height: height * scale,
        }
    }
}

/// Origin of a highlight target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HighlightCategory {
    /// Flagged by the analysis backend.
    SystemDetected,
    /// Entered by the reviewer.
    UserAdded,
}

impl HighlightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemDetected => "system-detected",
            Self::UserAdded => "user-added",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HighlightTarget {
    pub text: String,
    pub category: HighlightCategory,
}

impl HighlightTarget {
    pub fn new(text: impl Into<String>, category: HighlightCategory) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }

    pub fn system_detected(text: impl Into<String>) -> Self {
        Self::new(text, HighlightCategory::SystemDetected)
    }

    pub fn user_added(text: impl Into<String>) -> Self {
        Self::new(text, HighlightCategory::UserAdded)
    }

    /// Blank targets never match anything.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Top-left corner of an overlay rectangle, in rendered pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A located occurrence of a target as a page-relative pixel rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightMatch {
    pub text: String,
    /// 1-based page number.
    pub page: u32,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    pub category: HighlightCategory,
}

impl HighlightMatch {
    pub fn on_page(&self, page: u32) -> bool {
        self.page == page
    }
}

/// Replacement list of reviewer-entered targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct TargetsRequest {
    #[validate(length(max = 200, message = "At most 200 targets may be active"))]
    pub targets: Vec<String>,
}
