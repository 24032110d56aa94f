//! Document-level types.

use super::{FootnoteDefinition, Page};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reconstructed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document metadata (title, author, etc.)
    pub metadata: Metadata,

    /// Pages in the document
    pub pages: Vec<Page>,

    /// Linked footnote definitions, in order of first reference
    pub footnotes: Vec<FootnoteDefinition>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            metadata: Metadata::default(),
            pages: Vec::new(),
            footnotes: Vec::new(),
        }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == page_num)
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .filter(|page| !page.is_empty())
            .map(|page| page.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Document metadata as supplied by the extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Document subject
    pub subject: Option<String>,

    /// Keywords
    pub keywords: Option<String>,

    /// Creator application
    pub creator: Option<String>,

    /// Producer application
    pub producer: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// Total number of pages
    #[serde(default)]
    pub page_count: u32,
}

impl Metadata {
    /// Create metadata carrying only a title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Convert metadata to YAML frontmatter format.
    pub fn to_yaml_frontmatter(&self) -> String {
        let mut lines = vec!["---".to_string()];

        let fields = [
            ("title", &self.title),
            ("author", &self.author),
            ("subject", &self.subject),
            ("keywords", &self.keywords),
            ("creator", &self.creator),
            ("producer", &self.producer),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                lines.push(format!("{}: \"{}\"", key, escape_yaml(value)));
            }
        }
        if let Some(ref created) = self.created {
            lines.push(format!("created: {}", created.to_rfc3339()));
        }
        if let Some(ref modified) = self.modified {
            lines.push(format!("modified: {}", modified.to_rfc3339()));
        }

        lines.push(format!("pages: {}", self.page_count));

        lines.push("---".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
