//! Validation of the loosely typed span payload.
//!
//! The extraction collaborator hands over a JSON dump in which most fields
//! are optional and several have alternative spellings. Everything is
//! checked here once; later stages work on [`DocumentInput`] only.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{BBox, DocumentInput, Metadata, PageInput, Span, SpanFlags, TableRegion};

/// Bitmask values of the common extractor flag convention.
const FLAG_SUPERSCRIPT: u32 = 1;
const FLAG_ITALIC: u32 = 2;
const FLAG_BOLD: u32 = 16;

/// Parse and validate a JSON span dump.
pub fn parse_json(json: &str) -> Result<DocumentInput> {
    let raw: RawDocument = serde_json::from_str(json)?;
    raw.validate()
}

/// Parse and validate a JSON span dump from bytes.
pub fn parse_json_slice(bytes: &[u8]) -> Result<DocumentInput> {
    let raw: RawDocument = serde_json::from_slice(bytes)?;
    raw.validate()
}

/// The span dump exactly as delivered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDocument {
    /// Document metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
    /// Collaborator failure message
    #[serde(default)]
    pub error: Option<String>,
    /// Pages in order
    #[serde(default)]
    pub pages: Vec<RawPage>,
}

/// One page of the dump.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPage {
    /// Page number; defaults to the position in the page array
    #[serde(default)]
    pub number: Option<u32>,
    /// Page width in points
    #[serde(default)]
    pub width: Option<f32>,
    /// Page height in points
    #[serde(default)]
    pub height: Option<f32>,
    /// Positioned spans
    #[serde(default)]
    pub spans: Vec<RawSpan>,
    /// Bordered table regions
    #[serde(default)]
    pub tables: Vec<RawTable>,
}

/// One span of the dump.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSpan {
    /// Text content
    #[serde(default)]
    pub text: Option<String>,
    /// `[x0, y0, x1, y1]`
    #[serde(default)]
    pub bbox: Option<Vec<f32>>,
    /// Font name
    #[serde(default, alias = "font")]
    pub font_name: Option<String>,
    /// Font size in points
    #[serde(default, alias = "size")]
    pub font_size: Option<f32>,
    /// Color as integer or `#RRGGBB`
    #[serde(default)]
    pub color: Option<RawColor>,
    /// Style flags as bitmask or object
    #[serde(default)]
    pub flags: Option<RawFlags>,
}

/// A bordered table region of the dump.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTable {
    /// Region bounds
    #[serde(default)]
    pub bbox: Option<Vec<f32>>,
    /// Cell text, row-major
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
}

/// Span color encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawColor {
    /// 24-bit sRGB integer
    Int(u32),
    /// Hex string, with or without a leading `#`
    Hex(String),
}

/// Span flag encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFlags {
    /// Extractor bitmask
    Bits(u32),
    /// Named booleans
    Named(NamedFlags),
}

/// Flags spelled out as booleans.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct NamedFlags {
    /// Bold weight
    pub bold: bool,
    /// Italic or oblique
    pub italic: bool,
    /// Raised superscript
    pub superscript: bool,
}

impl RawDocument {
    /// Check every required field and convert into the validated model.
    pub fn validate(self) -> Result<DocumentInput> {
        if let Some(message) = self.error {
            return Err(Error::Extraction(message));
        }

        let mut metadata = self.metadata.unwrap_or_default();
        let mut pages = Vec::with_capacity(self.pages.len());
        let mut seen = HashSet::new();
        for (position, raw) in self.pages.into_iter().enumerate() {
            let page = raw.validate(position as u32 + 1)?;
            if !seen.insert(page.number) {
                return Err(duplicate_page(page.number));
            }
            pages.push(page);
        }
        metadata.page_count = pages.len() as u32;

        log::debug!(
            "validated span payload: {} pages, {} spans",
            pages.len(),
            pages.iter().map(|p: &PageInput| p.spans.len()).sum::<usize>()
        );

        Ok(DocumentInput { metadata, pages })
    }
}

impl RawPage {
    fn validate(self, default_number: u32) -> Result<PageInput> {
        let number = self.number.unwrap_or(default_number);
        let width = require_dimension(self.width, number, "width")?;
        let height = require_dimension(self.height, number, "height")?;

        let mut page = PageInput::new(number, width, height);
        for (index, raw) in self.spans.into_iter().enumerate() {
            page.spans.push(raw.validate(number, index)?);
        }
        for (index, raw) in self.tables.into_iter().enumerate() {
            let bbox = match raw.bbox {
                Some(values) => parse_bbox(&values, number, index, "tables.bbox")?,
                None => {
                    return Err(Error::MissingField {
                        page: number,
                        index,
                        field: "tables.bbox",
                    })
                }
            };
            let rows = raw
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
                .collect();
            page.tables.push(TableRegion { bbox, rows });
        }
        Ok(page)
    }
}

impl RawSpan {
    fn validate(self, page: u32, index: usize) -> Result<Span> {
        let missing = |field| Error::MissingField { page, index, field };

        let text = self.text.ok_or_else(|| missing("text"))?;
        let bbox = parse_bbox(&self.bbox.ok_or_else(|| missing("bbox"))?, page, index, "bbox")?;
        let font_name = self.font_name.ok_or_else(|| missing("font_name"))?;
        let font_size = self.font_size.ok_or_else(|| missing("font_size"))?;
        if !font_size.is_finite() || font_size <= 0.0 {
            return Err(Error::InvalidField {
                page,
                index,
                field: "font_size",
                reason: format!("expected a positive size, got {}", font_size),
            });
        }

        let color = match self.color {
            None => 0,
            Some(RawColor::Int(value)) => value & 0x00FF_FFFF,
            Some(RawColor::Hex(hex)) => {
                let digits = hex.trim().trim_start_matches('#');
                let invalid = || Error::InvalidField {
                    page,
                    index,
                    field: "color",
                    reason: format!("expected #RRGGBB, got {:?}", hex),
                };
                if digits.len() != 6 {
                    return Err(invalid());
                }
                u32::from_str_radix(digits, 16).map_err(|_| invalid())?
            }
        };

        let flags = match self.flags {
            None => SpanFlags::default(),
            Some(RawFlags::Bits(bits)) => SpanFlags {
                bold: bits & FLAG_BOLD != 0,
                italic: bits & FLAG_ITALIC != 0,
                superscript: bits & FLAG_SUPERSCRIPT != 0,
            },
            Some(RawFlags::Named(named)) => SpanFlags {
                bold: named.bold,
                italic: named.italic,
                superscript: named.superscript,
            },
        };

        Ok(Span {
            text,
            bbox,
            page,
            font_name,
            font_size,
            color,
            flags,
        })
    }
}

/// Page numbers key per-page statistics and repetition coverage.
pub(crate) fn duplicate_page(number: u32) -> Error {
    Error::InvalidField {
        page: number,
        index: 0,
        field: "number",
        reason: "page number appears more than once".to_string(),
    }
}

fn require_dimension(value: Option<f32>, page: u32, field: &'static str) -> Result<f32> {
    match value {
        None => Err(Error::MissingField {
            page,
            index: 0,
            field,
        }),
        Some(v) if !v.is_finite() || v <= 0.0 => Err(Error::InvalidField {
            page,
            index: 0,
            field,
            reason: format!("expected a positive dimension, got {}", v),
        }),
        Some(v) => Ok(v),
    }
}

fn parse_bbox(values: &[f32], page: u32, index: usize, field: &'static str) -> Result<BBox> {
    let invalid = |reason: String| Error::InvalidField {
        page,
        index,
        field,
        reason,
    };

    if values.len() != 4 {
        return Err(invalid(format!("expected 4 coordinates, got {}", values.len())));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(invalid("non-finite coordinate".to_string()));
    }
    let bbox = BBox::new(values[0], values[1], values[2], values[3]);
    if bbox.x1 < bbox.x0 || bbox.y1 < bbox.y0 {
        return Err(invalid(format!(
            "inverted box [{}, {}, {}, {}]",
            bbox.x0, bbox.y0, bbox.x1, bbox.y1
        )));
    }
    Ok(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"{
        "metadata": { "title": "Report", "created": "2024-03-01T10:00:00Z" },
        "pages": [{
            "number": 1, "width": 612, "height": 792,
            "spans": [
                { "text": "Hello", "bbox": [72, 72, 120, 84], "font": "Helvetica", "size": 12,
                  "color": "#FF0000", "flags": 18 },
                { "text": "world", "bbox": [124, 72, 170, 84], "font_name": "Helvetica",
                  "font_size": 12, "flags": { "superscript": true } }
            ],
            "tables": [{ "bbox": [72, 400, 500, 500], "rows": [["a", null], ["c", "d"]] }]
        }]
    }"##;

    #[test]
    fn test_parse_minimal_payload() {
        let doc = parse_json(MINIMAL).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Report"));
        assert!(doc.metadata.created.is_some());
        assert_eq!(doc.metadata.page_count, 1);

        let page = &doc.pages[0];
        assert_eq!(page.spans.len(), 2);

        let first = &page.spans[0];
        assert_eq!(first.color, 0xFF0000);
        assert!(first.flags.bold);
        assert!(first.flags.italic);
        assert!(!first.flags.superscript);

        assert!(page.spans[1].flags.superscript);
        assert_eq!(page.tables[0].rows[0], vec!["a".to_string(), String::new()]);
    }

    #[test]
    fn test_missing_font_size_names_location() {
        let json = r#"{ "pages": [
            { "width": 612, "height": 792, "spans": [] },
            { "width": 612, "height": 792, "spans": [
                { "text": "ok", "bbox": [0, 0, 10, 10], "font": "Times", "size": 10 },
                { "text": "bad", "bbox": [0, 0, 10, 10], "font": "Times" }
            ] }
        ] }"#;
        let err = parse_json(json).unwrap_err();
        match err {
            Error::MissingField { page, index, field } => {
                assert_eq!(page, 2);
                assert_eq!(index, 1);
                assert_eq!(field, "font_size");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_page_size_rejected() {
        let json = r#"{ "pages": [ { "number": 4, "width": 612, "spans": [] } ] }"#;
        let err = parse_json(json).unwrap_err();
        assert!(matches!(err, Error::MissingField { page: 4, field: "height", .. }));
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_invalid_bbox_rejected() {
        let json = r#"{ "pages": [ { "width": 612, "height": 792, "spans": [
            { "text": "x", "bbox": [10, 10, 5], "font": "Times", "size": 10 }
        ] } ] }"#;
        let err = parse_json(json).unwrap_err();
        assert!(matches!(err, Error::InvalidField { field: "bbox", .. }));
    }

    #[test]
    fn test_collaborator_error_is_extraction_failure() {
        let err = parse_json(r#"{ "error": "encrypted document" }"#).unwrap_err();
        assert!(matches!(err, Error::Extraction(ref m) if m == "encrypted document"));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_duplicate_page_numbers_rejected() {
        let json = r#"{ "pages": [
            { "number": 1, "width": 612, "height": 792, "spans": [] },
            { "number": 2, "width": 612, "height": 792, "spans": [] },
            { "number": 1, "width": 612, "height": 792, "spans": [] }
        ] }"#;
        let err = parse_json(json).unwrap_err();
        assert!(matches!(err, Error::InvalidField { page: 1, field: "number", .. }));
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_hex_color_must_have_six_digits() {
        let span = |color: &str| {
            format!(
                r#"{{ "pages": [ {{ "width": 612, "height": 792, "spans": [
                    {{ "text": "x", "bbox": [0, 0, 5, 10], "font": "Times", "size": 10, "color": "{}" }}
                ] }} ] }}"#,
                color
            )
        };

        assert_eq!(parse_json(&span("#00ff7F")).unwrap().pages[0].spans[0].color, 0x00FF7F);
        for bad in ["#FFFFFFFF", "#FFF", "#GG0000"] {
            let err = parse_json(&span(bad)).unwrap_err();
            assert!(matches!(err, Error::InvalidField { field: "color", .. }), "{}", bad);
        }
    }

    #[test]
    fn test_unknown_hints_ignored() {
        let json = r#"{ "pages": [ { "width": 612, "height": 792, "reading_order": [1, 0], "spans": [
            { "text": "x", "bbox": [0, 0, 5, 10], "font": "Times", "size": 10, "hyphenated": true }
        ] } ] }"#;
        let doc = parse_json(json).unwrap();
        assert_eq!(doc.pages[0].number, 1);
        assert_eq!(doc.span_count(), 1);
    }
}
