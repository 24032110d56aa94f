//! Structure reconstruction from positioned spans.
//!
//! [`Reconstructor`] runs the stages in order; the stage types are public
//! for callers that need a single step.

mod classifier;
mod dehyphen;
mod footnotes;
mod input;
mod layout;
mod normalize;
mod options;
mod pipeline;
mod repetition;
mod stats;
mod table_detector;
mod toc;

pub use classifier::{
    is_pure_number, line_role, parse_roman, split_list_marker, Classifier, ClassifierConfig, ListMarker, SpanRole,
};
pub use dehyphen::{continues_paragraph, is_continuation_hyphen, join_fragments, merge_across_pages, LineJoiner};
pub use footnotes::{FootnoteConfig, FootnoteLinker, FootnoteScope, LinkedFootnotes};
pub use input::{parse_json, parse_json_slice};
pub use layout::{
    detect_columns, group_rows, needs_space, BlockKind, Column, LayoutConfig, PageItem, PageLayout, PlacedSpan,
    Resolver, TextBlock, TextLine,
};
pub use normalize::{find_anomaly, NormalizeOptions, TextNormalizer};
pub use options::ParseOptions;
pub use pipeline::{Reconstruction, Reconstructor};
pub use repetition::{
    is_page_number_template, template, Band, HAlign, PositionBucket, RepetitionConfig, RepetitionDetector,
    RepetitionStats, RunningPattern,
};
pub use stats::{size_bucket, DocumentStatistics, SizeStyle};
pub use table_detector::{CellText, TableDetector, TableDetectorConfig};
pub use toc::{is_toc_entry, TocDetector, TocEntry};
