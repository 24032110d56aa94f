//! Validated span payload delivered by the extraction collaborator.
//!
//! Coordinates use a top-left origin with y growing downward, in points.

use serde::{Deserialize, Serialize};

use super::Metadata;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a bounding box from its edges.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width in points.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height in points.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the vertical overlap with another box (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BBox) -> f32 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }

    /// Whether a point lies inside the box, expanded by `tolerance`.
    pub fn contains_point(&self, x: f32, y: f32, tolerance: f32) -> bool {
        x >= self.x0 - tolerance
            && x <= self.x1 + tolerance
            && y >= self.y0 - tolerance
            && y <= self.y1 + tolerance
    }
}

/// Style flags reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanFlags {
    /// Bold weight
    pub bold: bool,
    /// Italic or oblique
    pub italic: bool,
    /// Raised superscript
    pub superscript: bool,
}

/// A positioned run of text with font metadata. Never mutated after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// The text content
    pub text: String,
    /// Bounding box on the page
    pub bbox: BBox,
    /// Page number (1-indexed)
    pub page: u32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// 24-bit sRGB color
    pub color: u32,
    /// Style flags
    pub flags: SpanFlags,
}

impl Span {
    /// Create a regular black span.
    pub fn new(
        text: impl Into<String>,
        bbox: BBox,
        page: u32,
        font_name: impl Into<String>,
        font_size: f32,
    ) -> Self {
        Self {
            text: text.into(),
            bbox,
            page,
            font_name: font_name.into(),
            font_size,
            color: 0,
            flags: SpanFlags::default(),
        }
    }

    /// Bold by flag or by font name.
    pub fn is_bold(&self) -> bool {
        if self.flags.bold {
            return true;
        }
        let name = self.font_name.to_lowercase();
        name.contains("bold") || name.contains("black") || name.contains("heavy")
    }

    /// Italic by flag or by font name.
    pub fn is_italic(&self) -> bool {
        if self.flags.italic {
            return true;
        }
        let name = self.font_name.to_lowercase();
        name.contains("italic") || name.contains("oblique")
    }

    /// Whether the font looks monospaced.
    pub fn is_monospace(&self) -> bool {
        let name = self.font_name.to_lowercase();
        const MONO: [&str; 8] = [
            "mono",
            "courier",
            "consolas",
            "menlo",
            "dejavu sans mono",
            "source code",
            "sourcecode",
            "fira code",
        ];
        MONO.iter().any(|m| name.contains(m))
    }

    /// Number of non-whitespace characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Whether the span carries only whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A bordered table region found by the collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRegion {
    /// Region bounds on the page
    pub bbox: BBox,
    /// Cell text in row-major order
    pub rows: Vec<Vec<String>>,
}

/// All collaborator input for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInput {
    /// Page number (1-indexed)
    pub number: u32,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Spans in any order
    pub spans: Vec<Span>,
    /// Bordered table regions
    pub tables: Vec<TableRegion>,
}

impl PageInput {
    /// Create an empty page.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            spans: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Create an empty US Letter page.
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0)
    }

    /// Add a span, stamping it with this page's number.
    pub fn push_span(&mut self, mut span: Span) {
        span.page = self.number;
        self.spans.push(span);
    }

    /// Add a bordered table region.
    pub fn push_table(&mut self, region: TableRegion) {
        self.tables.push(region);
    }
}

/// The validated collaborator payload for a whole document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Document metadata, when the collaborator supplied it
    pub metadata: Metadata,
    /// Pages in order
    pub pages: Vec<PageInput>,
}

impl DocumentInput {
    /// Create an empty document input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page.
    pub fn add_page(&mut self, page: PageInput) {
        self.pages.push(page);
    }

    /// Total number of spans over all pages.
    pub fn span_count(&self) -> usize {
        self.pages.iter().map(|p| p.spans.len()).sum()
    }
}
