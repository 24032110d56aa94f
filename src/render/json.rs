//! JSON rendering of the reconstructed tree.

use serde::Serialize;

use crate::error::{Error, Result};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a document, or a full reconstruction report, to JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, FootnoteDefinition, ListInfo, Page, Paragraph};

    #[test]
    fn test_to_json_pretty() {
        let mut doc = Document::new();
        doc.metadata.title = Some("Test".to_string());
        let mut page = Page::letter(1);
        page.add_paragraph(Paragraph::heading("Hello", 2));
        page.add_paragraph(Paragraph::list_item("item", ListInfo::bullet(1)));
        doc.add_page(page);
        doc.footnotes.push(FootnoteDefinition::new(1, 1, "1", "A note."));

        let json = to_json(&doc, JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"title\": \"Test\""));
        assert!(json.contains("\"kind\": \"heading\""));
        assert!(json.contains("\"label\": \"1\""));
        assert!(json.contains('\n'));

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_to_json_compact() {
        let mut doc = Document::new();
        doc.add_page(Page::letter(1));

        let json = to_json(&doc, JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
    }
}
