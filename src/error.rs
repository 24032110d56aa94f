//! Error and warning types for the unspan library.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for unspan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the conversion of a single document.
///
/// Everything here except [`Error::Render`], [`Error::Pool`] and
/// [`Error::Other`] means the extraction collaborator could not deliver a
/// usable span payload for the document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The span payload is not well-formed JSON or has the wrong shape.
    #[error("Malformed span payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The collaborator reported that it could not extract the document.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// A span or page is missing a field the engine requires.
    #[error("Page {page}, span {index}: missing required field `{field}`")]
    MissingField {
        /// Page number (1-indexed)
        page: u32,
        /// Span index within the page (0 for page-level fields)
        index: usize,
        /// Name of the missing field
        field: &'static str,
    },

    /// A span or page field is present but unusable.
    #[error("Page {page}, span {index}: invalid `{field}`: {reason}")]
    InvalidField {
        /// Page number (1-indexed)
        page: u32,
        /// Span index within the page (0 for page-level fields)
        index: usize,
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Error during rendering (Markdown, JSON).
    #[error("Rendering error: {0}")]
    Render(String),

    /// The bulk worker pool could not be set up.
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means no usable spans could be obtained for the document.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Json(_)
                | Error::Extraction(_)
                | Error::MissingField { .. }
                | Error::InvalidField { .. }
        )
    }
}

/// Non-fatal conditions absorbed into the output with degraded fidelity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Aligned lines looked like a table but the column count was inconsistent.
    AmbiguousTable {
        /// Page number (1-indexed)
        page: u32,
        /// Number of lines in the rejected run
        rows: usize,
    },

    /// A footnote marker had no definition in the searched scope.
    UnresolvedFootnote {
        /// Page number (1-indexed)
        page: u32,
        /// Numeric footnote key
        key: u32,
    },

    /// Span text contained replacement, private-use or control characters.
    EncodingAnomaly {
        /// Page number (1-indexed)
        page: u32,
        /// First offending code point
        codepoint: u32,
        /// The affected span text
        text: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::AmbiguousTable { page, rows } => write!(
                f,
                "page {}: {} aligned lines had inconsistent columns, kept as text",
                page, rows
            ),
            Warning::UnresolvedFootnote { page, key } => {
                write!(f, "page {}: footnote marker {} has no definition", page, key)
            }
            Warning::EncodingAnomaly {
                page, codepoint, ..
            } => write!(
                f,
                "page {}: unmappable glyph U+{:04X} passed through",
                page, codepoint
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingField {
            page: 3,
            index: 7,
            field: "bbox",
        };
        assert_eq!(
            err.to_string(),
            "Page 3, span 7: missing required field `bbox`"
        );

        let err = Error::Extraction("corrupt xref".to_string());
        assert_eq!(err.to_string(), "Extraction failed: corrupt xref");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_render_error_is_not_extraction_failure() {
        assert!(!Error::Render("boom".into()).is_extraction_failure());
        assert!(!Error::Pool("no threads".into()).is_extraction_failure());
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::UnresolvedFootnote { page: 2, key: 4 };
        assert_eq!(w.to_string(), "page 2: footnote marker 4 has no definition");

        let w = Warning::EncodingAnomaly {
            page: 1,
            codepoint: 0xFFFD,
            text: "a\u{FFFD}b".into(),
        };
        assert!(w.to_string().contains("U+FFFD"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = Warning::AmbiguousTable { page: 5, rows: 3 };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"ambiguous_table\""));
    }
}
