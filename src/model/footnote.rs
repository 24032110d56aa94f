//! Footnote markers and definitions.

use serde::{Deserialize, Serialize};

/// A superscript numeric marker found in body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteMarker {
    /// Numeric key
    pub key: u32,
    /// Page the marker sits on
    pub page: u32,
    /// Text of the span carrying the marker
    pub anchor: String,
}

/// A footnote definition linked to at least one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteDefinition {
    /// Numeric key
    pub key: u32,
    /// Page the definition was found on
    pub page: u32,
    /// Rendered label, unique within the document
    pub label: String,
    /// Definition body without the leading key
    pub text: String,
}

impl FootnoteDefinition {
    /// Create a definition.
    pub fn new(key: u32, page: u32, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key,
            page,
            label: label.into(),
            text: text.into(),
        }
    }
}
