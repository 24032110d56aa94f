//! Rendering result with metadata and statistics.

use crate::model::Metadata;
use serde::{Deserialize, Serialize};

/// Result of rendering a document, including content and statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    /// The rendered Markdown
    pub content: String,

    /// Document metadata (copied from source document)
    pub metadata: Metadata,

    /// Extraction statistics
    pub stats: ExtractionStats,
}

impl RenderResult {
    /// Create a new render result.
    pub fn new(content: String, metadata: Metadata, stats: ExtractionStats) -> Self {
        Self {
            content,
            metadata,
            stats,
        }
    }

    /// Get the content length in bytes.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

/// Statistics collected while reconstructing and rendering a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Total number of pages rendered
    pub page_count: u32,

    /// Number of headings
    pub heading_count: u32,

    /// Number of body paragraphs and captions
    pub paragraph_count: u32,

    /// Number of list items
    pub list_item_count: u32,

    /// Number of tables
    pub table_count: u32,

    /// Number of code blocks
    pub code_block_count: u32,

    /// Number of linked footnotes
    pub footnote_count: u32,

    /// Running headers, footers and page numbers removed
    pub removed_line_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,
}

impl ExtractionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment page count.
    pub fn add_page(&mut self) {
        self.page_count += 1;
    }

    /// Increment heading count.
    pub fn add_heading(&mut self) {
        self.heading_count += 1;
    }

    /// Increment paragraph count.
    pub fn add_paragraph(&mut self) {
        self.paragraph_count += 1;
    }

    /// Increment list item count.
    pub fn add_list_item(&mut self) {
        self.list_item_count += 1;
    }

    /// Increment table count.
    pub fn add_table(&mut self) {
        self.table_count += 1;
    }

    /// Increment code block count.
    pub fn add_code_block(&mut self) {
        self.code_block_count += 1;
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.page_count += other.page_count;
        self.heading_count += other.heading_count;
        self.paragraph_count += other.paragraph_count;
        self.list_item_count += other.list_item_count;
        self.table_count += other.table_count;
        self.code_block_count += other.code_block_count;
        self.footnote_count += other.footnote_count;
        self.removed_line_count += other.removed_line_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
    }
}
