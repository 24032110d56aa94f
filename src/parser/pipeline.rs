//! The reconstruction pipeline.
//!
//! Stages run strictly in order, each taking the previous stage's output by
//! value: normalization, statistics, reading order, repetition removal,
//! contents entries, tables, footnotes, cross-page joining and finally
//! conversion into the document model.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result, Warning};
use crate::model::{Document, DocumentInput, PageInput, TableRegion};

use super::classifier::Classifier;
use super::dehyphen::{merge_across_pages, LineJoiner};
use super::footnotes::FootnoteLinker;
use super::input::duplicate_page;
use super::layout::{PageLayout, Resolver};
use super::normalize::TextNormalizer;
use super::options::ParseOptions;
use super::repetition::{RepetitionDetector, RepetitionStats};
use super::stats::DocumentStatistics;
use super::table_detector::TableDetector;
use super::toc::TocDetector;

/// Everything a pipeline run produces for one document.
#[derive(Debug, Clone, Serialize)]
pub struct Reconstruction {
    /// The reconstructed document tree
    pub document: Document,
    /// Non-fatal conditions met along the way
    pub warnings: Vec<Warning>,
    /// Font and layout statistics the stages worked from
    pub statistics: DocumentStatistics,
    /// Running lines removed per kind
    pub repetition: RepetitionStats,
}

/// Runs the reconstruction stages over one document.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    options: ParseOptions,
}

impl Reconstructor {
    /// Create a reconstructor with the given options.
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// The options in effect.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Reconstruct the structure of one document.
    pub fn reconstruct(&self, input: DocumentInput) -> Result<Reconstruction> {
        check_input(&input)?;
        let options = &self.options;

        let (input, mut warnings) = TextNormalizer::new(options.normalize.clone()).normalize_document(input);
        let statistics = DocumentStatistics::collect(&input, &options.layout);

        let DocumentInput { mut metadata, pages } = input;
        metadata.page_count = pages.len() as u32;

        let (layouts, regions) = {
            let classifier = Classifier::new(&statistics, options.classifier.clone());
            let mut resolver = Resolver::new(&statistics, classifier, options.layout.clone());
            let mut layouts: Vec<PageLayout> = Vec::with_capacity(pages.len());
            let mut regions: Vec<Vec<TableRegion>> = Vec::with_capacity(pages.len());
            for mut page in pages {
                regions.push(std::mem::take(&mut page.tables));
                layouts.push(resolver.resolve_page(page));
            }
            (layouts, regions)
        };

        let (layouts, repetition) = if options.remove_repetitions {
            RepetitionDetector::new(options.repetition.clone()).remove(layouts)
        } else {
            (layouts, RepetitionStats::default())
        };
        if repetition.total() > 0 {
            log::debug!(
                "removed {} header, {} footer and {} page number lines",
                repetition.removed_headers,
                repetition.removed_footers,
                repetition.removed_page_numbers
            );
        }

        let layouts = if options.detect_toc {
            TocDetector::default().apply(layouts)
        } else {
            layouts
        };

        let detector = TableDetector::with_config(options.tables.clone());
        let layouts: Vec<PageLayout> = layouts
            .into_iter()
            .zip(regions)
            .map(|(layout, regions)| detector.apply_page(layout, regions, &mut warnings))
            .collect();

        let linked = FootnoteLinker::new(options.footnotes.clone(), statistics.body_size).link(layouts);
        warnings.extend(linked.warnings);

        let layouts = if options.join_across_pages {
            merge_across_pages(linked.pages)
        } else {
            linked.pages
        };

        let joiner = LineJoiner {
            link_urls: options.link_urls,
            detect_code: options.detect_code,
        };
        let mut document = Document::new();
        document.metadata = metadata;
        for layout in layouts {
            document.add_page(joiner.join_page(layout));
        }
        document.footnotes = linked.definitions;

        Ok(Reconstruction {
            document,
            warnings,
            statistics,
            repetition,
        })
    }
}

/// Reject inputs built in code that the JSON reader would have refused.
fn check_input(input: &DocumentInput) -> Result<()> {
    let mut seen = HashSet::new();
    for page in &input.pages {
        if !seen.insert(page.number) {
            return Err(duplicate_page(page.number));
        }
        check_page(page)?;
    }
    Ok(())
}

fn check_page(page: &PageInput) -> Result<()> {
    let invalid = |index: usize, field: &'static str, reason: &str| Error::InvalidField {
        page: page.number,
        index,
        field,
        reason: reason.to_string(),
    };

    if !page.width.is_finite() || page.width <= 0.0 {
        return Err(invalid(0, "width", "must be a positive number"));
    }
    if !page.height.is_finite() || page.height <= 0.0 {
        return Err(invalid(0, "height", "must be a positive number"));
    }
    for (index, span) in page.spans.iter().enumerate() {
        let b = span.bbox;
        if ![b.x0, b.y0, b.x1, b.y1].iter().all(|v| v.is_finite()) || b.x1 < b.x0 || b.y1 < b.y0 {
            return Err(invalid(index, "bbox", "must be four finite, ordered coordinates"));
        }
        if !span.font_size.is_finite() || span.font_size <= 0.0 {
            return Err(invalid(index, "font_size", "must be a positive number"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Block, ParagraphRole, Span};

    fn make_span(text: &str, x: f32, y: f32, size: f32) -> Span {
        let width = text.chars().count() as f32 * size * 0.5;
        Span::new(text, BBox::new(x, y, x + width, y + size), 1, "Helvetica", size)
    }

    fn single_page(spans: Vec<Span>) -> DocumentInput {
        let mut page = PageInput::letter(1);
        for span in spans {
            page.push_span(span);
        }
        let mut doc = DocumentInput::new();
        doc.add_page(page);
        doc
    }

    #[test]
    fn test_heading_and_paragraph() {
        let input = single_page(vec![
            make_span("Introduction", 72.0, 72.0, 18.0),
            make_span("The first line of body text runs on", 72.0, 110.0, 10.0),
            make_span("into the second line of the paragraph.", 72.0, 122.0, 10.0),
        ]);

        let result = Reconstructor::default().reconstruct(input).unwrap();
        let page = &result.document.pages[0];
        assert_eq!(page.elements.len(), 2);

        let heading = page.elements[0].as_paragraph().unwrap();
        assert_eq!(heading.role, ParagraphRole::Heading(1));
        assert_eq!(heading.plain_text(), "Introduction");

        let body = page.elements[1].as_paragraph().unwrap();
        assert_eq!(
            body.plain_text(),
            "The first line of body text runs on into the second line of the paragraph."
        );
        assert_eq!(result.document.metadata.page_count, 1);
        assert_eq!(result.statistics.body_size, 10.0);
    }

    #[test]
    fn test_bordered_region_becomes_table() {
        let mut input = single_page(vec![
            make_span("Before the table.", 72.0, 100.0, 10.0),
            make_span("cell text", 80.0, 210.0, 10.0),
        ]);
        input.pages[0].push_table(TableRegion {
            bbox: BBox::new(70.0, 200.0, 400.0, 240.0),
            rows: vec![vec!["A".into(), "B".into()], vec!["1".into(), "2".into()]],
        });

        let result = Reconstructor::default().reconstruct(input).unwrap();
        let elements = &result.document.pages[0].elements;
        assert_eq!(elements.len(), 2);
        assert!(matches!(&elements[1], Block::Table(grid) if grid.column_count() == 2));
    }

    #[test]
    fn test_invalid_programmatic_input_rejected() {
        let mut input = single_page(vec![make_span("text", 72.0, 100.0, 10.0)]);
        input.pages[0].spans[0].font_size = 0.0;
        let err = Reconstructor::default().reconstruct(input).unwrap_err();
        assert!(matches!(err, Error::InvalidField { field: "font_size", .. }));
        assert!(err.is_extraction_failure());
    }

    #[test]
    fn test_repeated_page_number_rejected() {
        let mut input = DocumentInput::new();
        for _ in 0..3 {
            let mut page = PageInput::letter(1);
            page.push_span(make_span("Body text", 72.0, 100.0, 10.0));
            input.add_page(page);
        }
        let err = Reconstructor::default().reconstruct(input).unwrap_err();
        assert!(matches!(err, Error::InvalidField { page: 1, field: "number", .. }));
    }

    #[test]
    fn test_empty_document() {
        let result = Reconstructor::default().reconstruct(DocumentInput::new()).unwrap();
        assert!(result.document.is_empty());
        assert!(result.warnings.is_empty());
    }
}
