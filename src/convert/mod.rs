//! Conversion front end: span sources, single documents and batches.
//!
//! A [`SpanSource`] is the boundary to the extraction collaborator. The
//! [`SourceRegistry`] picks one by file extension, and [`BatchConverter`]
//! spreads whole documents over a worker pool.
//!
//! # Example
//!
//! ```no_run
//! use unspan::convert::{ConvertOptions, SourceRegistry};
//! use std::path::Path;
//!
//! fn main() -> unspan::Result<()> {
//!     let registry = SourceRegistry::with_defaults();
//!     let result = registry.convert(Path::new("report.json"), &ConvertOptions::default())?;
//!     println!("{}", result.content);
//!     Ok(())
//! }
//! ```

mod batch;
mod source;

pub use batch::{BatchConverter, BatchOptions, BatchReport, DocumentOutcome, ProgressFn};
pub use source::{JsonSpanSource, SourceRegistry, SpanSource};

use serde::Serialize;

use crate::error::{Result, Warning};
use crate::model::{DocumentInput, Metadata};
use crate::parser::{FootnoteScope, ParseOptions, Reconstructor};
use crate::render::{to_markdown_with_stats, ExtractionStats, RenderOptions};

/// Options for document conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Reconstruction options
    pub parse: ParseOptions,

    /// Rendering options
    pub render: RenderOptions,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reconstruction options.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse = options;
        self
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Emit `---` between pages.
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.render.page_breaks = enabled;
        self
    }

    /// Include YAML frontmatter.
    pub fn with_frontmatter(mut self, include: bool) -> Self {
        self.render.include_frontmatter = include;
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.render = self.render.with_max_heading(level);
        self
    }

    /// Treat bold or colored body-size lines as headings.
    pub fn with_style_headings(mut self, enabled: bool) -> Self {
        self.parse = self.parse.with_style_headings(enabled);
        self
    }

    /// Set where footnote markers look for definitions.
    pub fn with_footnote_scope(mut self, scope: FootnoteScope) -> Self {
        self.parse = self.parse.with_footnote_scope(scope);
        self
    }
}

/// Result of converting one document.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertResult {
    /// Rendered Markdown
    pub content: String,

    /// Source document metadata
    pub metadata: Metadata,

    /// Extraction statistics
    pub stats: ExtractionStats,

    /// Non-fatal conditions met during reconstruction
    pub warnings: Vec<Warning>,
}

impl ConvertResult {
    /// Get content length in bytes.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }

    /// Whether reconstruction ran without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Reconstruct and render one document, keeping statistics and warnings.
pub fn convert_document(input: DocumentInput, options: &ConvertOptions) -> Result<ConvertResult> {
    let reconstruction = Reconstructor::new(options.parse.clone()).reconstruct(input)?;
    let rendered = to_markdown_with_stats(&reconstruction.document, &options.render)?;

    let mut stats = rendered.stats;
    stats.removed_line_count = reconstruction.repetition.total() as u32;

    for warning in &reconstruction.warnings {
        log::warn!("{}", warning);
    }

    Ok(ConvertResult {
        content: rendered.content,
        metadata: rendered.metadata,
        stats,
        warnings: reconstruction.warnings,
    })
}
