//! Document-wide font and style statistics.
//!
//! Computed once per document before any classification and then passed
//! by reference to every later stage.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{DocumentInput, Span};

use super::classifier::split_list_marker;
use super::layout::{detect_columns, group_rows, Column, LayoutConfig};

/// Tolerance for merging list indentations into one cluster.
const INDENT_TOLERANCE: f32 = 4.0;

/// Map a font size onto its 0.5pt bucket key.
pub fn size_bucket(size: f32) -> i32 {
    (size * 2.0).round() as i32
}

fn bucket_size(bucket: i32) -> f32 {
    bucket as f32 / 2.0
}

/// Dominant style of one size bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeStyle {
    /// Total non-whitespace characters at this size
    pub chars: usize,
    /// Whether most characters at this size are bold
    pub bold: bool,
    /// Color carrying the most characters at this size
    pub color: u32,
}

/// Font/style distributions of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStatistics {
    /// Body text size: the bucket with the most characters
    pub body_size: f32,
    /// Distinct sizes above the body size, largest first
    pub heading_sizes: Vec<f32>,
    /// Per-bucket dominant style, keyed by [`size_bucket`]
    pub size_styles: BTreeMap<i32, SizeStyle>,
    /// Whether body text is predominantly bold
    pub body_bold: bool,
    /// Dominant body text color
    pub body_color: u32,
    /// List indentation clusters relative to the column's text edge, ascending
    pub indent_levels: Vec<f32>,
    /// Column geometry per page number
    pub page_columns: BTreeMap<u32, Vec<Column>>,
    /// Total non-whitespace characters
    pub total_chars: usize,
}

impl Default for DocumentStatistics {
    fn default() -> Self {
        Self {
            body_size: 12.0,
            heading_sizes: Vec::new(),
            size_styles: BTreeMap::new(),
            body_bold: false,
            body_color: 0,
            indent_levels: Vec::new(),
            page_columns: BTreeMap::new(),
            total_chars: 0,
        }
    }
}

#[derive(Default)]
struct BucketTally {
    chars: usize,
    bold_chars: usize,
    colors: HashMap<u32, usize>,
}

impl DocumentStatistics {
    /// Collect statistics over every span of the document.
    pub fn collect(input: &DocumentInput, layout: &LayoutConfig) -> Self {
        let mut tallies: BTreeMap<i32, BucketTally> = BTreeMap::new();

        for span in input.pages.iter().flat_map(|p| p.spans.iter()) {
            let chars = span.char_count();
            if chars == 0 {
                continue;
            }
            let tally = tallies.entry(size_bucket(span.font_size)).or_default();
            tally.chars += chars;
            if span.is_bold() {
                tally.bold_chars += chars;
            }
            *tally.colors.entry(span.color).or_insert(0) += chars;
        }

        if tallies.is_empty() {
            return Self::default();
        }

        let size_styles: BTreeMap<i32, SizeStyle> = tallies
            .iter()
            .map(|(&bucket, tally)| {
                // Ties go to the smaller color value so output stays deterministic
                let color = tally
                    .colors
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(&c, _)| c)
                    .unwrap_or(0);
                let style = SizeStyle {
                    chars: tally.chars,
                    bold: tally.bold_chars * 2 > tally.chars,
                    color,
                };
                (bucket, style)
            })
            .collect();

        // Ascending iteration with a strict comparison keeps the smaller size on ties
        let mut body_bucket = 0;
        let mut body_chars = 0;
        for (&bucket, style) in &size_styles {
            if style.chars > body_chars {
                body_bucket = bucket;
                body_chars = style.chars;
            }
        }

        let heading_sizes: Vec<f32> = size_styles
            .keys()
            .rev()
            .filter(|&&bucket| bucket > body_bucket)
            .map(|&bucket| bucket_size(bucket))
            .collect();

        let body_style = size_styles[&body_bucket];

        let mut page_columns = BTreeMap::new();
        let mut indents = Vec::new();
        for page in &input.pages {
            let columns = detect_columns(&page.spans, layout);
            indents.extend(list_indents(&page.spans, &columns, layout));
            page_columns.insert(page.number, columns);
        }

        let stats = Self {
            body_size: bucket_size(body_bucket),
            heading_sizes,
            size_styles,
            body_bold: body_style.bold,
            body_color: body_style.color,
            indent_levels: cluster_indents(indents),
            page_columns,
            total_chars: tallies.values().map(|t| t.chars).sum(),
        };

        log::debug!(
            "statistics: body={:.1}pt headings={:?} indents={:?}",
            stats.body_size,
            stats.heading_sizes,
            stats.indent_levels
        );

        stats
    }

    /// Number of distinct size buckets.
    pub fn distinct_sizes(&self) -> usize {
        self.size_styles.len()
    }

    /// A document with fewer than two distinct sizes carries no headings.
    pub fn is_single_level(&self) -> bool {
        self.distinct_sizes() < 2
    }

    /// Whether the size falls in the body bucket.
    pub fn is_body_size(&self, size: f32) -> bool {
        size_bucket(size) == size_bucket(self.body_size)
    }

    /// Heading rank (1 = largest) of a size above the body size.
    pub fn heading_rank(&self, size: f32) -> Option<usize> {
        let bucket = size_bucket(size);
        self.heading_sizes
            .iter()
            .position(|&s| size_bucket(s) == bucket)
            .map(|i| i + 1)
    }

    /// Whether a body-size span differs from the body norm in weight or color.
    pub fn is_style_deviant(&self, span: &Span) -> bool {
        if !self.is_body_size(span.font_size) {
            return false;
        }
        (span.is_bold() && !self.body_bold) || span.color != self.body_color
    }

    /// Level given to style-deviant headings: one below the smallest size heading.
    pub fn style_heading_level(&self) -> u8 {
        (self.heading_sizes.len() + 1).min(6) as u8
    }

    /// Rank of the indentation cluster nearest to `indent`.
    pub fn indent_depth(&self, indent: f32) -> u8 {
        self.indent_levels
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - indent)
                    .abs()
                    .partial_cmp(&(*b - indent).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i.min(u8::MAX as usize) as u8)
            .unwrap_or(0)
    }

    /// Column geometry of a page, if it had any text.
    pub fn columns(&self, page: u32) -> Option<&[Column]> {
        self.page_columns.get(&page).map(|c| c.as_slice())
    }
}

/// Indentations of line-leading spans that carry a list prefix.
fn list_indents(spans: &[Span], columns: &[Column], layout: &LayoutConfig) -> Vec<f32> {
    if columns.is_empty() {
        return Vec::new();
    }

    let mut per_column: Vec<Vec<&Span>> = vec![Vec::new(); columns.len()];
    for span in spans.iter().filter(|s| !s.is_blank()) {
        per_column[column_index(columns, span)].push(span);
    }

    let mut indents = Vec::new();
    for (column, col_spans) in columns.iter().zip(per_column) {
        for line in group_rows(col_spans, |s| s.bbox, layout.line_overlap) {
            if let Some(first) = line.first() {
                if split_list_marker(&first.text).is_some() {
                    indents.push((first.bbox.x0 - column.text_left).max(0.0));
                }
            }
        }
    }
    indents
}

/// Index of the column a span is assigned to.
pub(crate) fn column_index(columns: &[Column], span: &Span) -> usize {
    columns
        .iter()
        .position(|c| c.contains_span(&span.bbox))
        .unwrap_or_else(|| {
            columns
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.distance(span.bbox.center_x())
                        .partial_cmp(&b.distance(span.bbox.center_x()))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
}

fn cluster_indents(mut indents: Vec<f32>) -> Vec<f32> {
    indents.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for indent in indents {
        match clusters.last_mut() {
            Some(cluster) if indent - cluster[0] <= INDENT_TOLERANCE => cluster.push(indent),
            _ => clusters.push(vec![indent]),
        }
    }

    clusters
        .into_iter()
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}
