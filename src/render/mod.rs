//! Rendering of reconstructed documents to Markdown and JSON.

mod json;
mod markdown;
mod options;
mod result;

pub use json::{to_json, JsonFormat};
pub use markdown::{to_markdown, to_markdown_pages, to_markdown_with_stats, MarkdownRenderer};
pub use options::RenderOptions;
pub use result::{ExtractionStats, RenderResult};
