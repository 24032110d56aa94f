//! Page-level types.

use super::{Paragraph, TableGrid};
use serde::{Deserialize, Serialize};

/// A single reconstructed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Content blocks on the page, in reading order
    pub elements: Vec<Block>,
}

impl Page {
    /// Create a new page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            elements: Vec::new(),
        }
    }

    /// Create a new page with standard Letter size (8.5 x 11 inches).
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0) // 8.5 * 72, 11 * 72
    }

    /// Add a block to the page.
    pub fn add_block(&mut self, block: Block) {
        self.elements.push(block);
    }

    /// Add a paragraph to the page.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.elements.push(Block::Paragraph(paragraph));
    }

    /// Add a table to the page.
    pub fn add_table(&mut self, table: TableGrid) {
        self.elements.push(Block::Table(table));
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.elements
            .iter()
            .map(|block| match block {
                Block::Paragraph(p) => p.plain_text(),
                Block::Table(t) => t.plain_text(),
                Block::Code { text } => text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check if the page is empty (no content blocks).
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Get the number of blocks on the page.
    pub fn block_count(&self) -> usize {
        self.elements.len()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::letter(1)
    }
}

/// A content block on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A paragraph of text (body, heading, list item or caption)
    Paragraph(Paragraph),

    /// A table
    Table(TableGrid),

    /// Monospaced code, one source line per text line
    Code {
        /// Code text
        text: String,
    },
}

impl Block {
    /// Check if this block is a paragraph.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, Block::Paragraph(_))
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table(_))
    }

    /// The paragraph, if this block is one.
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }
}
