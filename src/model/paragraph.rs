//! Paragraph and text-level types.

use serde::{Deserialize, Serialize};

/// A reconstructed paragraph: body text, heading, list item or caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Inline content in reading order
    pub content: Vec<InlineContent>,

    /// Structural role of the paragraph
    pub role: ParagraphRole,
}

impl Paragraph {
    /// Create a new empty body paragraph.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            role: ParagraphRole::Body,
        }
    }

    /// Create a paragraph with plain text.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Create a heading paragraph.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        let mut p = Self::with_text(text);
        p.role = ParagraphRole::Heading(level.clamp(1, 6));
        p
    }

    /// Create a list item paragraph.
    pub fn list_item(text: impl Into<String>, info: ListInfo) -> Self {
        let mut p = Self::with_text(text);
        p.role = ParagraphRole::ListItem(info);
        p
    }

    /// Create a caption paragraph.
    pub fn caption(text: impl Into<String>) -> Self {
        let mut p = Self::with_text(text);
        p.role = ParagraphRole::Caption;
        p
    }

    /// Add plain text to the paragraph.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.add_run(TextRun::new(text));
    }

    /// Add a styled text run, merging with the previous run when styles match.
    pub fn add_run(&mut self, run: TextRun) {
        if run.is_empty() {
            return;
        }
        if let Some(InlineContent::Text(last)) = self.content.last_mut() {
            if last.style == run.style {
                last.text.push_str(&run.text);
                return;
            }
        }
        self.content.push(InlineContent::Text(run));
    }

    /// Add a hyperlink.
    pub fn add_link(&mut self, text: impl Into<String>, url: impl Into<String>) {
        self.content.push(InlineContent::Link {
            text: text.into(),
            url: url.into(),
        });
    }

    /// Add a footnote reference.
    pub fn add_footnote_ref(&mut self, label: impl Into<String>) {
        self.content.push(InlineContent::FootnoteRef {
            label: label.into(),
        });
    }

    /// Get plain text content of the paragraph.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                InlineContent::Text(run) => run.text.clone(),
                InlineContent::Link { text, .. } => text.clone(),
                InlineContent::FootnoteRef { .. } => String::new(),
            })
            .collect()
    }

    /// Check if the paragraph is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() || self.plain_text().trim().is_empty()
    }

    /// Check if this is a heading.
    pub fn is_heading(&self) -> bool {
        matches!(self.role, ParagraphRole::Heading(_))
    }

    /// Get the heading level (1-6) or None.
    pub fn heading_level(&self) -> Option<u8> {
        match self.role {
            ParagraphRole::Heading(level) => Some(level),
            _ => None,
        }
    }

    /// Check if this is a list item.
    pub fn is_list_item(&self) -> bool {
        matches!(self.role, ParagraphRole::ListItem(_))
    }

    /// List information if this is a list item.
    pub fn list_info(&self) -> Option<&ListInfo> {
        match &self.role {
            ParagraphRole::ListItem(info) => Some(info),
            _ => None,
        }
    }

    /// Number of footnote references in the paragraph.
    pub fn footnote_refs(&self) -> usize {
        self.content
            .iter()
            .filter(|c| matches!(c, InlineContent::FootnoteRef { .. }))
            .count()
    }
}

impl Default for Paragraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural role of a paragraph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParagraphRole {
    /// Ordinary body text
    #[default]
    Body,
    /// Heading with level 1-6
    Heading(u8),
    /// List item with depth and marker information
    ListItem(ListInfo),
    /// Table or figure caption
    Caption,
}

/// Inline content within a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineContent {
    /// A text run with styling
    Text(TextRun),

    /// A hyperlink
    Link {
        /// Link text
        text: String,
        /// Link URL
        url: String,
    },

    /// A linked footnote marker
    FootnoteRef {
        /// Rendered label (e.g. "1" or "1-3")
        label: String,
    },
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Create a text run with the given style.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                bold: true,
                ..Default::default()
            },
        )
    }

    /// Create an italic text run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                italic: true,
                ..Default::default()
            },
        )
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Text styling properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Superscript (unlinked markers keep this)
    pub superscript: bool,
}

impl TextStyle {
    /// Check if any styling is applied.
    pub fn has_styling(&self) -> bool {
        self.bold || self.italic || self.superscript
    }
}

/// Information about a list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInfo {
    /// List style (ordered or unordered)
    pub style: ListStyle,

    /// Nesting depth (0 = top level)
    pub level: u8,

    /// Item number for ordered lists
    pub item_number: Option<u32>,
}

impl ListInfo {
    /// Create a new bulleted list item.
    pub fn bullet(level: u8) -> Self {
        Self {
            style: ListStyle::Unordered { marker: '-' },
            level,
            item_number: None,
        }
    }

    /// Create a new decimal numbered list item.
    pub fn numbered(level: u8, number: u32) -> Self {
        Self::ordered(level, number, NumberStyle::Decimal)
    }

    /// Create a new ordered list item in the given numbering style.
    pub fn ordered(level: u8, number: u32, number_style: NumberStyle) -> Self {
        Self {
            style: ListStyle::Ordered {
                start: 1,
                number_style,
            },
            level,
            item_number: Some(number),
        }
    }

    /// Same item at a different depth.
    pub fn at_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Whether the item belongs to an ordered list.
    pub fn is_ordered(&self) -> bool {
        matches!(self.style, ListStyle::Ordered { .. })
    }
}

/// List style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListStyle {
    /// Ordered (numbered) list
    Ordered {
        /// Starting number
        start: u32,
        /// Number style
        number_style: NumberStyle,
    },
    /// Unordered (bulleted) list
    Unordered {
        /// Bullet character as found in the source
        marker: char,
    },
}

/// Number style for ordered lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStyle {
    /// 1, 2, 3, ...
    #[default]
    Decimal,
    /// a, b, c, ...
    LowerAlpha,
    /// A, B, C, ...
    UpperAlpha,
    /// i, ii, iii, ...
    LowerRoman,
    /// I, II, III, ...
    UpperRoman,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_plain_text() {
        let mut p = Paragraph::new();
        p.add_text("Hello ");
        p.add_run(TextRun::bold("world"));
        p.add_text("!");
        p.add_footnote_ref("1");

        assert_eq!(p.plain_text(), "Hello world!");
        assert_eq!(p.footnote_refs(), 1);
    }

    #[test]
    fn test_adjacent_runs_merge() {
        let mut p = Paragraph::new();
        p.add_run(TextRun::bold("a "));
        p.add_run(TextRun::bold("b"));
        p.add_text(" c");
        assert_eq!(p.content.len(), 2);
    }

    #[test]
    fn test_heading() {
        let h1 = Paragraph::heading("Title", 1);
        assert!(h1.is_heading());
        assert_eq!(h1.heading_level(), Some(1));
        assert_eq!(Paragraph::heading("Deep", 9).heading_level(), Some(6));
    }

    #[test]
    fn test_list_info() {
        let bullet = ListInfo::bullet(0);
        assert_eq!(bullet.level, 0);
        assert!(!bullet.is_ordered());

        let numbered = ListInfo::numbered(1, 5);
        assert_eq!(numbered.item_number, Some(5));
        assert!(numbered.is_ordered());

        let p = Paragraph::list_item("x", numbered.at_level(2));
        assert_eq!(p.list_info().map(|i| i.level), Some(2));
    }
}
