//! Document model types.
//!
//! Two halves live here: the validated span payload handed over by the
//! extraction collaborator ([`DocumentInput`]) and the reconstructed
//! document tree ([`Document`]) that the renderers consume.

mod document;
mod footnote;
mod page;
mod paragraph;
mod span;
mod table;

pub use document::{Document, Metadata};
pub use footnote::{FootnoteDefinition, FootnoteMarker};
pub use page::{Block, Page};
pub use paragraph::{
    InlineContent, ListInfo, ListStyle, NumberStyle, Paragraph, ParagraphRole, TextRun, TextStyle,
};
pub use span::{BBox, DocumentInput, PageInput, Span, SpanFlags, TableRegion};
pub use table::TableGrid;
