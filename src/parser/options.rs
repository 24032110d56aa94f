//! Reconstruction options and configuration.

use super::classifier::ClassifierConfig;
use super::footnotes::{FootnoteConfig, FootnoteScope};
use super::layout::LayoutConfig;
use super::normalize::NormalizeOptions;
use super::repetition::RepetitionConfig;
use super::table_detector::TableDetectorConfig;

/// Options for reconstructing document structure from spans.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Text normalization applied before any analysis
    pub normalize: NormalizeOptions,

    /// Span classification
    pub classifier: ClassifierConfig,

    /// Column, line and block detection
    pub layout: LayoutConfig,

    /// Running header and footer removal
    pub repetition: RepetitionConfig,

    /// Table reconstruction
    pub tables: TableDetectorConfig,

    /// Footnote linking
    pub footnotes: FootnoteConfig,

    /// Whether to remove running headers, footers and page numbers
    pub remove_repetitions: bool,

    /// Whether to turn contents entries into list items
    pub detect_toc: bool,

    /// Whether monospace blocks become code blocks
    pub detect_code: bool,

    /// Whether URLs become links
    pub link_urls: bool,

    /// Whether paragraphs split by a page break are merged
    pub join_across_pages: bool,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat bold or colored body-size lines as headings.
    pub fn with_style_headings(mut self, enabled: bool) -> Self {
        self.classifier.style_headings = enabled;
        self
    }

    /// Set the maximum number of words in a heading.
    pub fn with_max_heading_words(mut self, words: usize) -> Self {
        self.classifier.max_heading_words = words;
        self
    }

    /// Set where footnote markers look for definitions.
    pub fn with_footnote_scope(mut self, scope: FootnoteScope) -> Self {
        self.footnotes.scope = scope;
        self
    }

    /// Let footnote markers find definitions on other pages.
    pub fn footnotes_across_pages(self) -> Self {
        self.with_footnote_scope(FootnoteScope::Document)
    }

    /// Set the page coverage above which margin lines are removed.
    pub fn with_coverage_threshold(mut self, threshold: f32) -> Self {
        self.repetition.coverage_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the height of the header and footer bands as a fraction of the page.
    pub fn with_margin_band(mut self, band: f32) -> Self {
        self.repetition.margin_band = band.clamp(0.0, 0.5);
        self
    }

    /// Enable or disable running header and footer removal.
    pub fn with_repetition_removal(mut self, enabled: bool) -> Self {
        self.remove_repetitions = enabled;
        self
    }

    /// Enable or disable tables inferred from text alignment.
    pub fn with_borderless_tables(mut self, enabled: bool) -> Self {
        self.tables.detect_borderless = enabled;
        self
    }

    /// Enable or disable contents entry detection.
    pub fn with_toc_detection(mut self, enabled: bool) -> Self {
        self.detect_toc = enabled;
        self
    }

    /// Enable or disable code block detection.
    pub fn with_code_detection(mut self, enabled: bool) -> Self {
        self.detect_code = enabled;
        self
    }

    /// Enable or disable URL links.
    pub fn with_url_links(mut self, enabled: bool) -> Self {
        self.link_urls = enabled;
        self
    }

    /// Enable or disable merging paragraphs across page breaks.
    pub fn with_page_joining(mut self, enabled: bool) -> Self {
        self.join_across_pages = enabled;
        self
    }

    /// Replace the text normalization options.
    pub fn with_normalization(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }

    /// Replace the layout configuration.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Replace the table detector configuration.
    pub fn with_tables(mut self, tables: TableDetectorConfig) -> Self {
        self.tables = tables;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            normalize: NormalizeOptions::default(),
            classifier: ClassifierConfig::default(),
            layout: LayoutConfig::default(),
            repetition: RepetitionConfig::default(),
            tables: TableDetectorConfig::default(),
            footnotes: FootnoteConfig::default(),
            remove_repetitions: true,
            detect_toc: true,
            detect_code: true,
            link_urls: true,
            join_across_pages: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_builder() {
        let options = ParseOptions::new()
            .with_style_headings(true)
            .footnotes_across_pages()
            .with_coverage_threshold(1.5)
            .with_code_detection(false)
            .with_page_joining(false);

        assert!(options.classifier.style_headings);
        assert_eq!(options.footnotes.scope, FootnoteScope::Document);
        assert_eq!(options.repetition.coverage_threshold, 1.0);
        assert!(!options.detect_code);
        assert!(!options.join_across_pages);
    }

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert_eq!(options.footnotes.scope, FootnoteScope::SamePage);
        assert_eq!(options.repetition.coverage_threshold, 0.6);
        assert!(!options.classifier.style_headings);
        assert!(options.remove_repetitions);
        assert!(options.tables.detect_borderless);
    }
}
