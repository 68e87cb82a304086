//! Highlight Mapper
//!
//! Locates highlight targets in each page's text runs and maps every
//! occurrence to an overlay rectangle in rendered-pixel space.

use financeguard_models::{HighlightMatch, HighlightTarget, Position, TextRun, Viewport};
use financeguard_utils::ViewerConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pdf_engine::PdfDocument;

/// How pages are scaled before matches are mapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapperOptions {
    pub render_width: f64,
    /// Takes precedence over `render_width` when set.
    pub fixed_scale: Option<f64>,
    pub default_text_height: f64,
}

impl MapperOptions {
    pub fn scale_for(&self, intrinsic_width: f64) -> f64 {
        match self.fixed_scale {
            Some(scale) if scale > 0.0 => scale,
            _ if intrinsic_width > 0.0 => self.render_width / intrinsic_width,
            _ => 1.0,
        }
    }
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

impl From<&ViewerConfig> for MapperOptions {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            render_width: config.render_width,
            fixed_scale: config.fixed_scale,
            default_text_height: config.default_text_height,
        }
    }
}

/// A page whose text could not be read during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageError {
    pub page: u32,
    pub message: String,
}

/// Result of one mapping pass over a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HighlightPass {
    pub matches: Vec<HighlightMatch>,
    pub page_errors: Vec<PageError>,
}

/// Maps every target occurrence in `document`.
///
/// Pages are visited one at a time in order. A page that fails to load or
/// extract is recorded in `page_errors` and the pass moves on.
pub async fn compute_matches(
    document: &dyn PdfDocument,
    targets: &[HighlightTarget],
    options: &MapperOptions,
) -> HighlightPass {
    let mut pass = HighlightPass::default();
    let searchable = searchable_targets(targets);
    if searchable.is_empty() {
        return pass;
    }

    for number in 1..=document.num_pages() {
        let page = match document.page(number).await {
            Ok(page) => page,
            Err(e) => {
                warn!(page = number, error = %e, "Skipping page that failed to load");
                pass.page_errors.push(PageError { page: number, message: e.to_string() });
                continue;
            }
        };

        let scale = options.scale_for(page.viewport(1.0).width);
        let viewport = page.viewport(scale);
        let runs = match page.text_content().await {
            Ok(runs) => runs,
            Err(e) => {
                warn!(page = number, error = %e, "Skipping page whose text could not be extracted");
                pass.page_errors.push(PageError { page: number, message: e.to_string() });
                continue;
            }
        };

        pass.matches.extend(match_page(
            number,
            &runs,
            &viewport,
            &searchable,
            options.default_text_height,
        ));
    }

    debug!(
        pages = document.num_pages(),
        targets = searchable.len(),
        matches = pass.matches.len(),
        page_errors = pass.page_errors.len(),
        "Highlight pass complete"
    );
    pass
}

/// A target ready for case-insensitive comparison.
#[derive(Debug, Clone)]
pub struct SearchTarget<'a> {
    target: &'a HighlightTarget,
    needle: String,
}

/// Lowercases the non-blank targets once per pass.
pub fn searchable_targets(targets: &[HighlightTarget]) -> Vec<SearchTarget<'_>> {
    targets
        .iter()
        .filter(|target| !target.is_blank())
        .map(|target| SearchTarget {
            target,
            needle: target.text.to_lowercase(),
        })
        .collect()
}

/// Matches the runs of one page. Each (target, run) pair containing the
/// target yields one rectangle spanning the whole run.
pub fn match_page(
    page: u32,
    runs: &[TextRun],
    viewport: &Viewport,
    targets: &[SearchTarget<'_>],
    default_text_height: f64,
) -> Vec<HighlightMatch> {
    let mut matches = Vec::new();
    for target in targets {
        for run in runs {
            if run.text.to_lowercase().contains(&target.needle) {
                matches.push(run_rectangle(page, run, viewport, target.target, default_text_height));
            }
        }
    }
    matches
}

fn run_rectangle(
    page: u32,
    run: &TextRun,
    viewport: &Viewport,
    target: &HighlightTarget,
    default_text_height: f64,
) -> HighlightMatch {
    let scale = viewport.scale;
    let run_height = if run.height.is_finite() && run.height > 0.0 {
        run.height
    } else {
        default_text_height
    };
    let mut height = run_height * scale;
    // PDF user space grows upwards; overlays are positioned from the top.
    let mut y = viewport.height - run.y() * scale - height;
    // Clip whatever sticks out above the page.
    if y < 0.0 {
        height = (height + y).max(0.0);
        y = 0.0;
    }

    HighlightMatch {
        text: target.text.clone(),
        page,
        position: Position {
            x: (run.x() * scale).max(0.0),
            y,
        },
        width: (run.width * scale).max(0.0),
        height,
        category: target.category,
    }
}
