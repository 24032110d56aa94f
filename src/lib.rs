//! # unspan
//!
//! Structural Markdown reconstruction from positioned text spans.
//!
//! The library does not read document bytes. An extraction collaborator
//! supplies, for every page, a flat list of positioned spans (text, box,
//! font, color, style flags) and any bordered table regions it found. From
//! that geometry alone the engine recovers headings, paragraphs, nested
//! lists, tables and footnotes, removes running headers and footers, and
//! renders the result as Markdown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unspan::{convert, parse_file, ConvertOptions};
//!
//! fn main() -> unspan::Result<()> {
//!     let input = parse_file("report.json")?;
//!     let markdown = convert(&input, &ConvertOptions::default())?;
//!     println!("{}", markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Headings** from font size rank, optionally from bold or colored body text
//! - **Reading order** across multi-column layouts
//! - **Running header/footer removal** including page number sequences
//! - **Tables** from bordered regions and from text alignment
//! - **Footnotes** linked from superscript markers to their definitions
//! - **De-hyphenation** within and across pages
//! - **Parallel batches** over a fixed worker pool

pub mod convert;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use convert::{
    convert_document, BatchConverter, BatchOptions, BatchReport, ConvertOptions, ConvertResult,
    DocumentOutcome, JsonSpanSource, SourceRegistry, SpanSource,
};
pub use error::{Error, Result, Warning};
pub use model::{
    BBox, Block, Document, DocumentInput, FootnoteDefinition, InlineContent, ListInfo, Metadata, Page,
    PageInput, Paragraph, ParagraphRole, Span, SpanFlags, TableGrid, TableRegion, TextRun, TextStyle,
};
pub use parser::{
    parse_json, DocumentStatistics, FootnoteScope, ParseOptions, Reconstruction, Reconstructor,
    RepetitionStats,
};
pub use render::{ExtractionStats, JsonFormat, RenderOptions};

use std::path::Path;

/// Load a span dump from disk, picking the source by file extension.
///
/// # Example
///
/// ```no_run
/// use unspan::parse_file;
///
/// let input = parse_file("report.json").unwrap();
/// println!("Spans: {}", input.span_count());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<DocumentInput> {
    SourceRegistry::with_defaults().load(path.as_ref())
}

/// Reconstruct the document tree without rendering it.
pub fn reconstruct(input: &DocumentInput, options: &ParseOptions) -> Result<Reconstruction> {
    Reconstructor::new(options.clone()).reconstruct(input.clone())
}

/// Convert spans to Markdown.
///
/// # Example
///
/// ```no_run
/// use unspan::{convert, parse_file, ConvertOptions};
///
/// let input = parse_file("report.json").unwrap();
/// let options = ConvertOptions::new().with_page_breaks(true);
/// let markdown = convert(&input, &options).unwrap();
/// ```
pub fn convert(input: &DocumentInput, options: &ConvertOptions) -> Result<String> {
    Ok(convert_with_report(input, options)?.content)
}

/// Convert spans to Markdown, keeping statistics and warnings.
pub fn convert_with_report(input: &DocumentInput, options: &ConvertOptions) -> Result<ConvertResult> {
    convert_document(input.clone(), options)
}

/// Convert spans to one Markdown string per page.
pub fn convert_pages(input: &DocumentInput, options: &ConvertOptions) -> Result<Vec<String>> {
    let reconstruction = reconstruct(input, &options.parse)?;
    render::to_markdown_pages(&reconstruction.document, &options.render)
}

/// Convert a span dump file to Markdown with default options.
pub fn convert_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let input = parse_file(path)?;
    convert(&input, &ConvertOptions::default())
}

/// Reconstruct with default options and serialize the document tree.
///
/// # Example
///
/// ```no_run
/// use unspan::{parse_file, to_json, JsonFormat};
///
/// let input = parse_file("report.json").unwrap();
/// let json = to_json(&input, JsonFormat::Pretty).unwrap();
/// std::fs::write("tree.json", json).unwrap();
/// ```
pub fn to_json(input: &DocumentInput, format: JsonFormat) -> Result<String> {
    let reconstruction = reconstruct(input, &ParseOptions::default())?;
    render::to_json(&reconstruction.document, format)
}

/// Builder for reconstructing and rendering documents.
///
/// # Example
///
/// ```no_run
/// use unspan::Unspan;
///
/// let markdown = Unspan::new()
///     .with_page_breaks()
///     .with_style_headings()
///     .footnotes_across_pages()
///     .load("report.json")?
///     .to_markdown()?;
/// # Ok::<(), unspan::Error>(())
/// ```
pub struct Unspan {
    parse_options: ParseOptions,
    render_options: RenderOptions,
}

impl Unspan {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::default(),
            render_options: RenderOptions::default(),
        }
    }

    /// Emit `---` between pages.
    pub fn with_page_breaks(mut self) -> Self {
        self.render_options = self.render_options.with_page_breaks(true);
        self
    }

    /// Enable frontmatter in output.
    pub fn with_frontmatter(mut self) -> Self {
        self.render_options = self.render_options.with_frontmatter(true);
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.render_options = self.render_options.with_max_heading(level);
        self
    }

    /// Set the number of spaces per list level.
    pub fn with_list_indent(mut self, spaces: usize) -> Self {
        self.render_options = self.render_options.with_list_indent(spaces);
        self
    }

    /// Treat bold or colored body-size lines as headings.
    pub fn with_style_headings(mut self) -> Self {
        self.parse_options = self.parse_options.with_style_headings(true);
        self
    }

    /// Let footnote markers find definitions on other pages.
    pub fn footnotes_across_pages(mut self) -> Self {
        self.parse_options = self.parse_options.footnotes_across_pages();
        self
    }

    /// Keep running headers, footers and page numbers.
    pub fn keep_repetitions(mut self) -> Self {
        self.parse_options = self.parse_options.with_repetition_removal(false);
        self
    }

    /// Only build tables from bordered regions.
    pub fn bordered_tables_only(mut self) -> Self {
        self.parse_options = self.parse_options.with_borderless_tables(false);
        self
    }

    /// Replace the reconstruction options.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Replace the rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Reconstruct a document from validated spans.
    pub fn reconstruct(self, input: DocumentInput) -> Result<UnspanResult> {
        let reconstruction = Reconstructor::new(self.parse_options).reconstruct(input)?;
        Ok(UnspanResult {
            reconstruction,
            render_options: self.render_options,
        })
    }

    /// Load a span dump file and reconstruct it.
    pub fn load<P: AsRef<Path>>(self, path: P) -> Result<UnspanResult> {
        let input = parse_file(path)?;
        self.reconstruct(input)
    }

    /// Parse a JSON span dump from bytes and reconstruct it.
    pub fn load_bytes(self, data: &[u8]) -> Result<UnspanResult> {
        let input = parser::parse_json_slice(data)?;
        self.reconstruct(input)
    }
}

impl Default for Unspan {
    fn default() -> Self {
        Self::new()
    }
}

/// A reconstructed document ready for rendering.
pub struct UnspanResult {
    reconstruction: Reconstruction,
    render_options: RenderOptions,
}

impl UnspanResult {
    /// Convert to Markdown.
    pub fn to_markdown(&self) -> Result<String> {
        render::to_markdown(&self.reconstruction.document, &self.render_options)
    }

    /// Convert to one Markdown string per page.
    pub fn to_markdown_pages(&self) -> Result<Vec<String>> {
        render::to_markdown_pages(&self.reconstruction.document, &self.render_options)
    }

    /// Convert the document tree to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.reconstruction.document, format)
    }

    /// Get plain text without Markdown syntax.
    pub fn plain_text(&self) -> String {
        self.reconstruction.document.plain_text()
    }

    /// Get the document.
    pub fn document(&self) -> &Document {
        &self.reconstruction.document
    }

    /// Non-fatal conditions met during reconstruction.
    pub fn warnings(&self) -> &[Warning] {
        &self.reconstruction.warnings
    }

    /// The full reconstruction, including statistics.
    pub fn reconstruction(&self) -> &Reconstruction {
        &self.reconstruction
    }
}
