//! Reading-order resolution.
//!
//! Spans of a page are assigned to columns, grouped into lines by vertical
//! overlap and then into blocks. Columns are read left to right, each one
//! top to bottom before the next.

use std::cmp::Ordering;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::model::{BBox, ListInfo, PageInput, Span, TableGrid};

use super::classifier::{line_role, Classifier, SpanRole};
use super::stats::{column_index, DocumentStatistics};

lazy_static! {
    static ref CAPTION_RE: Regex = Regex::new(r"^(?:Table|Figure|Fig\.)\s+\d+(?:\.\d+)*\s*[.:]").unwrap();
}

/// Layout analysis configuration.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Width of the x-coverage histogram slices (points)
    pub slice_width: f32,
    /// Minimum width of an empty run to count as a gutter (points)
    pub min_gutter: f32,
    /// Minimum width of a column (points)
    pub min_column_width: f32,
    /// Minimum share of the page's spans a column must hold
    pub min_column_share: f32,
    /// Minimum number of spans a column must hold
    pub min_column_spans: usize,
    /// Vertical overlap, as a fraction of the smaller height, joining spans into a line
    pub line_overlap: f32,
    /// Baseline gap, in median line pitches, that starts a new block
    pub paragraph_gap_factor: f32,
    /// Font size change that starts a new block (points)
    pub font_size_jump: f32,
    /// Left margin change that starts a new block (points)
    pub margin_jump: f32,
    /// Median words per side at or below which a gutter between rows sharing
    /// baselines separates table cells, not columns
    pub max_cell_words: usize,
    /// Minimum number of stacked single-character lines read as vertical text
    pub min_vertical_run: usize,
    /// Left-edge distance within which stacked characters share a column (points)
    pub vertical_tolerance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slice_width: 3.0,
            min_gutter: 12.0,
            min_column_width: 80.0,
            min_column_share: 0.10,
            min_column_spans: 2,
            line_overlap: 0.5,
            paragraph_gap_factor: 1.5,
            font_size_jump: 1.0,
            margin_jump: 20.0,
            max_cell_words: 4,
            min_vertical_run: 4,
            vertical_tolerance: 3.0,
        }
    }
}

/// A detected column in the page layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
    /// Leftmost text edge inside the column
    pub text_left: f32,
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl Column {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A span belongs to a column if its left edge or its center lies inside.
    pub fn contains_span(&self, bbox: &BBox) -> bool {
        self.contains(bbox.x0) || self.contains(bbox.center_x())
    }

    /// Horizontal distance from `x` to the column (0 inside).
    pub fn distance(&self, x: f32) -> f32 {
        if x < self.left {
            self.left - x
        } else if x > self.right {
            x - self.right
        } else {
            0.0
        }
    }
}

/// A span with the facts derived about it by later stages.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSpan {
    /// The span as delivered
    pub span: Span,
    /// Classifier role
    pub role: SpanRole,
    /// Footnote label when this span is a linked marker
    pub footnote: Option<String>,
    /// Replacement text when a stage trims the visible text
    pub display_text: Option<String>,
}

impl PlacedSpan {
    /// Wrap a span with its role.
    pub fn new(span: Span, role: SpanRole) -> Self {
        Self {
            span,
            role,
            footnote: None,
            display_text: None,
        }
    }

    /// Visible text of the span.
    pub fn text(&self) -> &str {
        self.display_text.as_deref().unwrap_or(&self.span.text)
    }
}

/// A text line composed of spans sharing a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Document-unique line id
    pub id: u64,
    /// The spans in this line, sorted by X position
    pub spans: Vec<PlacedSpan>,
    /// Union of the span boxes
    pub bbox: BBox,
    /// Bottom edge of the largest span
    pub baseline: f32,
    /// Font size carrying the most characters
    pub font_size: f32,
    /// Column index on the page
    pub column: usize,
    /// Page number
    pub page: u32,
    /// Combined role of the spans
    pub role: SpanRole,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(id: u64, mut spans: Vec<PlacedSpan>, column: usize, page: u32) -> Self {
        spans.sort_by(|a, b| {
            a.span
                .bbox
                .x0
                .partial_cmp(&b.span.bbox.x0)
                .unwrap_or(Ordering::Equal)
        });

        let bbox = spans
            .iter()
            .map(|s| s.span.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();

        let largest = spans.iter().max_by(|a, b| {
            a.span
                .font_size
                .partial_cmp(&b.span.font_size)
                .unwrap_or(Ordering::Equal)
        });
        let baseline = largest.map(|s| s.span.bbox.y1).unwrap_or(bbox.y1);

        let font_size = spans
            .iter()
            .max_by(|a, b| {
                a.span
                    .char_count()
                    .cmp(&b.span.char_count())
                    .then(a.span.font_size.partial_cmp(&b.span.font_size).unwrap_or(Ordering::Equal))
            })
            .map(|s| s.span.font_size)
            .unwrap_or(0.0);

        let role = line_role(&spans);

        Self {
            id,
            spans,
            bbox,
            baseline,
            font_size,
            column,
            page,
            role,
        }
    }

    /// Get the combined text of all spans with appropriate spacing.
    pub fn text(&self) -> String {
        let mut result = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 && needs_space(&self.spans[i - 1], span) {
                result.push(' ');
            }
            result.push_str(span.text());
        }
        result
    }

    /// Left edge of the line.
    pub fn x0(&self) -> f32 {
        self.bbox.x0
    }

    /// Whether every span uses a monospaced font.
    pub fn is_monospace(&self) -> bool {
        let mut visible = self.spans.iter().filter(|s| !s.span.is_blank()).peekable();
        visible.peek().is_some() && visible.all(|s| s.span.is_monospace())
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold_chars: usize = self
            .spans
            .iter()
            .filter(|s| s.span.is_bold())
            .map(|s| s.span.char_count())
            .sum();
        let total_chars: usize = self.spans.iter().map(|s| s.span.char_count()).sum();
        total_chars > 0 && bold_chars as f32 / total_chars as f32 > 0.5
    }
}

/// Whether a space belongs between two neighbouring spans of a line.
///
/// Inserts a space when the gap exceeds a fifth of an average character,
/// except between characters of scripts written without word spaces.
pub fn needs_space(prev: &PlacedSpan, curr: &PlacedSpan) -> bool {
    let prev_text = prev.text();
    let curr_text = curr.text();
    if prev_text.is_empty() || curr_text.is_empty() {
        return false;
    }
    if prev_text.ends_with(char::is_whitespace) || curr_text.starts_with(char::is_whitespace) {
        return false;
    }

    let gap = curr.span.bbox.x0 - prev.span.bbox.x1;

    let char_count = curr.span.text.chars().count();
    let width = curr.span.bbox.width();
    let avg_char_width = if char_count > 0 && width > 0.0 {
        width / char_count as f32
    } else {
        curr.span.font_size * 0.5
    };

    if gap <= avg_char_width * 0.2 {
        return false;
    }

    let prev_cjk = prev_text.chars().last().map(is_spaceless_script_char).unwrap_or(false);
    let curr_cjk = curr_text.chars().next().map(is_spaceless_script_char).unwrap_or(false);
    !(prev_cjk && curr_cjk)
}

/// Kind of a text block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BlockKind {
    /// A heading (H1-H6)
    Heading(u8),
    /// A regular paragraph
    Paragraph,
    /// A list item
    ListItem(ListInfo),
    /// A table or figure caption
    Caption,
    /// Monospaced code
    Code,
}

/// Consecutive lines of one column forming a heading, paragraph, list item or code block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Block kind
    pub kind: BlockKind,
    /// The lines in this block
    pub lines: Vec<TextLine>,
    /// Column index on the page
    pub column: usize,
    /// Page of the first line
    pub page: u32,
}

impl TextBlock {
    /// Create a new text block.
    pub fn new(kind: BlockKind, lines: Vec<TextLine>, column: usize, page: u32) -> Self {
        Self {
            kind,
            lines,
            column,
            page,
        }
    }

    /// Get the combined text of all lines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Top edge of the first line.
    pub fn top(&self) -> f32 {
        self.lines.first().map(|l| l.bbox.y0).unwrap_or(0.0)
    }

    /// Check if the block is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() || self.text().trim().is_empty()
    }
}

/// An item in the reading order of a page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// A block of text lines
    Text(TextBlock),
    /// A reconstructed table
    Table {
        /// Table content
        grid: TableGrid,
        /// Region the table occupies
        bbox: BBox,
        /// Column index on the page
        column: usize,
    },
}

impl PageItem {
    /// Column index of the item.
    pub fn column(&self) -> usize {
        match self {
            PageItem::Text(block) => block.column,
            PageItem::Table { column, .. } => *column,
        }
    }

    /// Top edge of the item.
    pub fn top(&self) -> f32 {
        match self {
            PageItem::Text(block) => block.top(),
            PageItem::Table { bbox, .. } => bbox.y0,
        }
    }

    /// The text block, if this is one.
    pub fn as_text(&self) -> Option<&TextBlock> {
        match self {
            PageItem::Text(block) => Some(block),
            PageItem::Table { .. } => None,
        }
    }
}

/// The reading-ordered content of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// Page number (1-indexed)
    pub number: u32,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Items in reading order
    pub items: Vec<PageItem>,
    /// Column geometry
    pub columns: Vec<Column>,
}

impl PageLayout {
    /// All text lines of the page in reading order.
    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        self.items
            .iter()
            .filter_map(PageItem::as_text)
            .flat_map(|b| b.lines.iter())
    }

    /// Drop empty text blocks.
    pub fn prune(&mut self) {
        self.items.retain(|item| match item {
            PageItem::Text(block) => !block.lines.is_empty(),
            PageItem::Table { grid, .. } => !grid.is_empty(),
        });
    }
}

/// Detect columns from the horizontal coverage of the spans.
///
/// Occupied runs of the x-coverage histogram separated by gutters of at
/// least `min_gutter` are column candidates. Candidates that are too
/// narrow or hold too few spans merge into the neighbour across the
/// narrower gutter until every remaining column is valid.
pub fn detect_columns(spans: &[Span], config: &LayoutConfig) -> Vec<Column> {
    let spans: Vec<&Span> = spans.iter().filter(|s| !s.is_blank()).collect();
    if spans.is_empty() {
        return vec![];
    }

    let min_x = spans
        .iter()
        .map(|s| s.bbox.x0)
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0);
    let max_x = spans
        .iter()
        .map(|s| s.bbox.x1)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0);

    let single = || {
        vec![Column {
            left: min_x - 10.0,
            right: max_x + 10.0,
            text_left: min_x,
            index: 0,
        }]
    };

    let slice_width = config.slice_width.max(0.5);
    let extent = max_x - min_x;
    let num_slices = (extent / slice_width) as usize + 1;
    let mut slice_occupancy = vec![0usize; num_slices];

    for span in &spans {
        let start_slice = ((span.bbox.x0 - min_x) / slice_width) as usize;
        let end_slice = ((span.bbox.x1 - min_x) / slice_width) as usize;
        for slot in slice_occupancy
            .iter_mut()
            .take(end_slice.min(num_slices - 1) + 1)
            .skip(start_slice)
        {
            *slot += 1;
        }
    }

    // Occupied runs separated by gutters wide enough to split columns
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut last_occupied = 0;
    for (i, &occupancy) in slice_occupancy.iter().enumerate() {
        if occupancy == 0 {
            continue;
        }
        match run_start {
            None => run_start = Some(i),
            Some(start) => {
                let gap = (i - last_occupied - 1) as f32 * slice_width;
                if gap >= config.min_gutter {
                    runs.push((start, last_occupied));
                    run_start = Some(i);
                }
            }
        }
        last_occupied = i;
    }
    if let Some(start) = run_start {
        runs.push((start, last_occupied));
    }

    let mut segments: Vec<Segment> = runs
        .into_iter()
        .map(|(start, end)| {
            let left = min_x + start as f32 * slice_width;
            let right = min_x + (end + 1) as f32 * slice_width;
            Segment {
                left,
                right,
                spans: spans
                    .iter()
                    .filter(|s| {
                        let c = s.bbox.center_x();
                        c >= left && c <= right
                    })
                    .count(),
            }
        })
        .collect();

    let min_spans = ((spans.len() as f32 * config.min_column_share) as usize).max(config.min_column_spans);

    while segments.len() > 1 {
        let Some(i) = segments
            .iter()
            .position(|s| s.right - s.left < config.min_column_width || s.spans < min_spans)
        else {
            break;
        };

        let left_gap = (i > 0).then(|| segments[i].left - segments[i - 1].right);
        let right_gap = (i + 1 < segments.len()).then(|| segments[i + 1].left - segments[i].right);
        let j = match (left_gap, right_gap) {
            (Some(l), Some(r)) => {
                if l <= r {
                    i - 1
                } else {
                    i + 1
                }
            }
            (Some(_), None) => i - 1,
            _ => i + 1,
        };

        let (a, b) = (i.min(j), i.max(j));
        let merged = segments.remove(b);
        segments[a].right = merged.right;
        segments[a].spans += merged.spans;
    }

    merge_cell_gutters(&mut segments, &spans, config);

    if segments.len() <= 1 {
        return single();
    }

    log::debug!(
        "detected {} columns: {:?}",
        segments.len(),
        segments.iter().map(|s| (s.left, s.right)).collect::<Vec<_>>()
    );

    let boundaries: Vec<f32> = segments
        .windows(2)
        .map(|w| (w[0].right + w[1].left) / 2.0)
        .collect();

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let left = if index == 0 {
                min_x - 10.0
            } else {
                boundaries[index - 1]
            };
            let right = boundaries.get(index).copied().unwrap_or(max_x + 10.0);
            let text_left = spans
                .iter()
                .filter(|s| {
                    let c = s.bbox.center_x();
                    c >= segment.left && c <= segment.right
                })
                .map(|s| s.bbox.x0)
                .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                .unwrap_or(segment.left);
            Column {
                left,
                right,
                text_left,
                index,
            }
        })
        .collect()
}

struct Segment {
    left: f32,
    right: f32,
    spans: usize,
}

impl Segment {
    fn holds(&self, span: &Span) -> bool {
        let c = span.bbox.center_x();
        c >= self.left && c <= self.right
    }
}

/// Merge segments split only by the gutters of a borderless table.
///
/// A gutter crossed by at least two consecutive rows with text on both
/// sides, where those sides carry few words, separates cells. Every gutter
/// is judged against the original segments before any merge.
fn merge_cell_gutters(segments: &mut Vec<Segment>, spans: &[&Span], config: &LayoutConfig) {
    if segments.len() < 2 {
        return;
    }

    let rows = group_rows(spans.to_vec(), |s| s.bbox, config.line_overlap);
    let cell_gutters: Vec<bool> = segments
        .windows(2)
        .map(|pair| is_cell_gutter(&pair[0], &pair[1], &rows, config.max_cell_words))
        .collect();

    for i in (0..cell_gutters.len()).rev() {
        if !cell_gutters[i] {
            continue;
        }
        log::debug!(
            "gutter at {:.1} separates table cells, not columns",
            segments[i].right
        );
        let merged = segments.remove(i + 1);
        segments[i].right = merged.right;
        segments[i].spans += merged.spans;
    }
}

fn is_cell_gutter(left: &Segment, right: &Segment, rows: &[Vec<&Span>], max_words: usize) -> bool {
    let mut run = 0;
    let mut longest = 0;
    let mut words = Vec::new();

    for row in rows {
        let side = |segment: &Segment| -> usize {
            row.iter()
                .filter(|s| segment.holds(s))
                .map(|s| s.word_count())
                .sum()
        };
        let (l, r) = (side(left), side(right));
        if l > 0 && r > 0 {
            run += 1;
            longest = longest.max(run);
            words.push(l);
            words.push(r);
        } else {
            run = 0;
        }
    }

    if longest < 2 {
        return false;
    }
    words.sort_unstable();
    words[words.len() / 2] <= max_words
}

/// Group items into rows by vertical overlap, top to bottom, each row left to right.
///
/// An item joins the current row when it overlaps the row's tallest item
/// by at least `min_overlap` of the smaller height.
pub fn group_rows<T>(mut items: Vec<T>, bbox: impl Fn(&T) -> BBox, min_overlap: f32) -> Vec<Vec<T>> {
    items.sort_by(|a, b| {
        let (a, b) = (bbox(a), bbox(b));
        a.y0.partial_cmp(&b.y0)
            .unwrap_or(Ordering::Equal)
            .then(a.x0.partial_cmp(&b.x0).unwrap_or(Ordering::Equal))
    });

    let mut rows: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut anchor: Option<BBox> = None;

    for item in items {
        let b = bbox(&item);
        let joins = anchor.map_or(false, |a| {
            let overlap = a.vertical_overlap(&b);
            overlap > 0.0 && overlap >= min_overlap * a.height().min(b.height())
        });

        if joins {
            if anchor.map_or(false, |a| b.height() > a.height()) {
                anchor = Some(b);
            }
            current.push(item);
        } else {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            anchor = Some(b);
            current.push(item);
        }
    }

    if !current.is_empty() {
        rows.push(current);
    }

    for row in &mut rows {
        row.sort_by(|a, b| bbox(a).x0.partial_cmp(&bbox(b).x0).unwrap_or(Ordering::Equal));
    }

    rows
}

/// Orders spans into lines, columns and blocks.
pub struct Resolver<'a> {
    stats: &'a DocumentStatistics,
    classifier: Classifier<'a>,
    config: LayoutConfig,
    next_line_id: u64,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the document statistics.
    pub fn new(stats: &'a DocumentStatistics, classifier: Classifier<'a>, config: LayoutConfig) -> Self {
        Self {
            stats,
            classifier,
            config,
            next_line_id: 0,
        }
    }

    /// Resolve the reading order of one page.
    pub fn resolve_page(&mut self, page: PageInput) -> PageLayout {
        let PageInput {
            number,
            width,
            height,
            spans,
            ..
        } = page;

        let columns = match self.stats.columns(number) {
            Some(columns) if !columns.is_empty() => columns.to_vec(),
            _ => detect_columns(&spans, &self.config),
        };
        if columns.is_empty() {
            return PageLayout {
                number,
                width,
                height,
                items: Vec::new(),
                columns,
            };
        }

        let mut column_spans: Vec<Vec<PlacedSpan>> = vec![Vec::new(); columns.len()];
        for span in spans.into_iter().filter(|s| !s.is_blank()) {
            let col_idx = column_index(&columns, &span);
            let indent = span.bbox.x0 - columns[col_idx].text_left;
            let role = self.classifier.classify(&span, indent);
            column_spans[col_idx].push(PlacedSpan::new(span, role));
        }

        log::debug!(
            "page {}: spans per column {:?}",
            number,
            column_spans.iter().map(|v| v.len()).collect::<Vec<_>>()
        );

        let mut items = Vec::new();
        for (col_idx, col_spans) in column_spans.into_iter().enumerate() {
            let lines: Vec<TextLine> = group_rows(col_spans, |s| s.span.bbox, self.config.line_overlap)
                .into_iter()
                .map(|row| {
                    let id = self.next_line_id;
                    self.next_line_id += 1;
                    TextLine::from_spans(id, row, col_idx, number)
                })
                .collect();
            let lines = self.collapse_vertical_text(lines);

            items.extend(
                self.group_lines_into_blocks(lines, col_idx, number)
                    .into_iter()
                    .map(PageItem::Text),
            );
        }

        PageLayout {
            number,
            width,
            height,
            items,
            columns,
        }
    }

    /// Rejoin text set one character per line, top to bottom, into a single line.
    fn collapse_vertical_text(&self, lines: Vec<TextLine>) -> Vec<TextLine> {
        let mut result = Vec::with_capacity(lines.len());
        let mut stack: Vec<TextLine> = Vec::new();
        for line in lines {
            if !is_single_char(&line) {
                self.flush_vertical(&mut stack, &mut result);
                result.push(line);
                continue;
            }
            let aligned = stack
                .last()
                .map_or(true, |prev| (prev.x0() - line.x0()).abs() < self.config.vertical_tolerance);
            if !aligned {
                self.flush_vertical(&mut stack, &mut result);
            }
            stack.push(line);
        }
        self.flush_vertical(&mut stack, &mut result);
        result
    }

    fn flush_vertical(&self, stack: &mut Vec<TextLine>, out: &mut Vec<TextLine>) {
        if stack.len() < self.config.min_vertical_run.max(2) {
            out.append(stack);
            return;
        }
        let lines = std::mem::take(stack);
        let Some(first) = lines.first() else {
            return;
        };
        let Some(mut merged) = first.spans.first().cloned() else {
            out.extend(lines);
            return;
        };

        merged.span.text = lines.iter().map(|l| l.text().trim().to_string()).collect();
        merged.span.bbox = lines
            .iter()
            .map(|l| l.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(merged.span.bbox);
        merged.display_text = None;
        log::debug!(
            "page {}: {} stacked characters read as {:?}",
            first.page,
            lines.len(),
            merged.span.text
        );
        out.push(TextLine::from_spans(first.id, vec![merged], first.column, first.page));
    }

    /// Group lines of one column into blocks.
    fn group_lines_into_blocks(&self, lines: Vec<TextLine>, column: usize, page: u32) -> Vec<TextBlock> {
        if lines.is_empty() {
            return vec![];
        }

        let pitch = median_line_pitch(&lines);
        let mut blocks: Vec<TextBlock> = Vec::new();
        let mut current: Vec<TextLine> = Vec::new();

        for line in lines {
            let should_break = match (current.first(), current.last()) {
                (Some(first), Some(prev)) => self.should_break_block(first, prev, &line, pitch),
                _ => false,
            };

            if should_break {
                blocks.push(make_block(std::mem::take(&mut current), column, page));
            }
            current.push(line);
        }

        if !current.is_empty() {
            blocks.push(make_block(current, column, page));
        }

        blocks
    }

    /// Determine if a new block should start.
    fn should_break_block(&self, first: &TextLine, prev: &TextLine, curr: &TextLine, pitch: f32) -> bool {
        let spacing = curr.baseline - prev.baseline;

        if let SpanRole::Heading(level) = curr.role {
            // Wrapped headings continue when the spacing fits their own size
            let normal = pitch.max(curr.font_size * 1.2) * self.config.paragraph_gap_factor;
            return !(prev.role == SpanRole::Heading(level) && spacing <= normal);
        }

        if prev.role.heading_level().is_some() || curr.role.is_list_item() {
            return true;
        }

        if prev.is_monospace() != curr.is_monospace() {
            return true;
        }

        if spacing > pitch * self.config.paragraph_gap_factor {
            return true;
        }

        if (prev.font_size - curr.font_size).abs() > self.config.font_size_jump {
            return true;
        }

        let list_continuation = first.role.is_list_item() && curr.x0() >= first.x0() - 2.0;
        if !list_continuation && (prev.x0() - curr.x0()).abs() > self.config.margin_jump {
            return true;
        }

        false
    }
}

/// Build a block from consecutive lines, deriving its kind from the line roles.
pub(crate) fn make_block(lines: Vec<TextLine>, column: usize, page: u32) -> TextBlock {
    let Some(first) = lines.first() else {
        return TextBlock::new(BlockKind::Paragraph, lines, column, page);
    };
    let kind = match &first.role {
        SpanRole::Heading(_) => BlockKind::Heading(
            lines
                .iter()
                .filter_map(|l| l.role.heading_level())
                .min()
                .unwrap_or(1),
        ),
        SpanRole::ListItem(info) => BlockKind::ListItem(info.clone()),
        SpanRole::Paragraph if lines.iter().all(|l| l.is_monospace()) => BlockKind::Code,
        SpanRole::Paragraph if CAPTION_RE.is_match(first.text().trim_start()) => BlockKind::Caption,
        SpanRole::Paragraph => BlockKind::Paragraph,
    };
    TextBlock::new(kind, lines, column, page)
}

fn is_single_char(line: &TextLine) -> bool {
    line.text().trim().chars().count() == 1
}

/// Split a block into maximal runs of lines that do or do not match `pred`.
pub(crate) fn split_lines<F>(lines: Vec<TextLine>, pred: F) -> Vec<(bool, Vec<TextLine>)>
where
    F: Fn(&TextLine) -> bool,
{
    let mut runs: Vec<(bool, Vec<TextLine>)> = Vec::new();
    for line in lines {
        let matched = pred(&line);
        match runs.last_mut() {
            Some((m, run)) if *m == matched => run.push(line),
            _ => runs.push((matched, vec![line])),
        }
    }
    runs
}

/// Median baseline distance between consecutive lines.
fn median_line_pitch(lines: &[TextLine]) -> f32 {
    let mut pitches: Vec<f32> = lines
        .windows(2)
        .map(|w| w[1].baseline - w[0].baseline)
        .filter(|p| *p > 0.1)
        .collect();

    if pitches.is_empty() {
        return lines.first().map(|l| l.font_size * 1.2).unwrap_or(12.0);
    }

    pitches.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    pitches[pitches.len() / 2]
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs
    (0x4E00..=0x9FFF).contains(&code)
    // CJK Unified Ideographs Extension A
    || (0x3400..=0x4DBF).contains(&code)
    // CJK Unified Ideographs Extension B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana
    || (0x3040..=0x309F).contains(&code)
    // Katakana
    || (0x30A0..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentInput;
    use crate::parser::classifier::ClassifierConfig;

    fn make_span(text: &str, x: f32, y: f32, size: f32) -> Span {
        let width = text.chars().count() as f32 * size * 0.5;
        Span::new(text, BBox::new(x, y, x + width, y + size), 1, "Helvetica", size)
    }

    fn resolve(spans: Vec<Span>) -> PageLayout {
        let mut page = PageInput::letter(1);
        for span in spans {
            page.push_span(span);
        }
        let mut doc = DocumentInput::new();
        doc.add_page(page);

        let config = LayoutConfig::default();
        let stats = DocumentStatistics::collect(&doc, &config);
        let classifier = Classifier::new(&stats, ClassifierConfig::default());
        let mut resolver = Resolver::new(&stats, classifier, config);
        let page = doc.pages.remove(0);
        resolver.resolve_page(page)
    }

    fn block_texts(layout: &PageLayout) -> Vec<String> {
        layout
            .items
            .iter()
            .filter_map(PageItem::as_text)
            .map(|b| b.text())
            .collect()
    }

    #[test]
    fn test_column_contains() {
        let col = Column {
            left: 100.0,
            right: 200.0,
            text_left: 105.0,
            index: 0,
        };
        assert!(col.contains(100.0));
        assert!(col.contains(200.0));
        assert!(!col.contains(99.0));
        assert_eq!(col.distance(210.0), 10.0);

        // Center inside even though the left edge is not
        assert!(col.contains_span(&BBox::new(90.0, 0.0, 130.0, 10.0)));
        assert!(!col.contains_span(&BBox::new(250.0, 0.0, 280.0, 10.0)));
    }

    #[test]
    fn test_detect_two_columns() {
        let mut spans = Vec::new();
        for i in 0..6 {
            let y = 100.0 + i as f32 * 14.0;
            spans.push(make_span("left column prose runs on here", 72.0, y, 10.0));
            spans.push(make_span("right column prose runs on here", 320.0, y, 10.0));
        }
        let columns = detect_columns(&spans, &LayoutConfig::default());

        assert_eq!(columns.len(), 2);
        assert!(columns[0].right > 177.0 && columns[0].right < 320.0);
        assert_eq!(columns[1].text_left, 320.0);
    }

    #[test]
    fn test_wide_cell_grid_stays_single_column() {
        let rows = [
            ["Quarterly revenue", "Strong growth here", "Weaker second half"],
            ["Operating margin", "Held steady overall", "Slight decline seen"],
            ["Regional outlook", "Europe leads again", "Asia recovers late"],
        ];
        let mut spans = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            let y = 100.0 + r as f32 * 14.0;
            for (cell, x) in row.iter().zip([72.0, 200.0, 330.0]) {
                spans.push(make_span(cell, x, y, 10.0));
            }
        }

        // Each cell column is wider than a minimal page column
        assert!(spans.iter().all(|s| s.bbox.width() >= 80.0));
        assert_eq!(detect_columns(&spans, &LayoutConfig::default()).len(), 1);
    }

    #[test]
    fn test_single_shared_row_keeps_columns() {
        let mut spans = Vec::new();
        spans.push(make_span("Short label", 72.0, 100.0, 10.0));
        spans.push(make_span("Other label", 320.0, 100.0, 10.0));
        for i in 0..5 {
            let y = 130.0 + i as f32 * 14.0;
            spans.push(make_span("left column prose runs on here", 72.0, y, 10.0));
        }
        for i in 0..5 {
            let y = 300.0 + i as f32 * 14.0;
            spans.push(make_span("right column prose runs on here", 320.0, y, 10.0));
        }
        assert_eq!(detect_columns(&spans, &LayoutConfig::default()).len(), 2);
    }

    #[test]
    fn test_narrow_grid_stays_single_column() {
        let mut spans = Vec::new();
        for (row, y) in [100.0, 114.0, 128.0].iter().enumerate() {
            for (col, x) in [72.0, 200.0, 330.0].iter().enumerate() {
                spans.push(make_span(&format!("c{}{}", row, col), *x, *y, 10.0));
            }
        }
        assert_eq!(detect_columns(&spans, &LayoutConfig::default()).len(), 1);
    }

    #[test]
    fn test_columns_read_in_order() {
        let mut spans = Vec::new();
        for i in 0..4 {
            let y = 100.0 + i as f32 * 14.0;
            spans.push(make_span(&format!("right {} column prose with enough words", i), 320.0, y, 10.0));
            spans.push(make_span(&format!("left {} column prose with enough words", i), 72.0, y, 10.0));
        }
        // Pad both columns so they pass the width check
        spans.push(make_span("left padding line of text", 72.0, 160.0, 10.0));
        spans.push(make_span("right padding line of text", 320.0, 160.0, 10.0));

        let layout = resolve(spans);
        let texts = block_texts(&layout);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].starts_with("left 0 column prose with enough words left 1"));
        assert!(texts[1].starts_with("right 0 column prose with enough words right 1"));
    }

    #[test]
    fn test_superscript_joins_line() {
        let body = make_span("Text with marker", 72.0, 100.0, 10.0);
        let sup = Span::new("1", BBox::new(152.0, 97.0, 155.0, 103.0), 1, "Helvetica", 6.0);
        let layout = resolve(vec![body, sup]);

        let lines: Vec<&TextLine> = layout.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].baseline, 110.0);
        assert_eq!(lines[0].text(), "Text with marker1");
    }

    #[test]
    fn test_paragraph_gap_splits_blocks() {
        let layout = resolve(vec![
            make_span("First paragraph line one", 72.0, 100.0, 10.0),
            make_span("First paragraph line two", 72.0, 112.0, 10.0),
            make_span("First paragraph line three", 72.0, 124.0, 10.0),
            make_span("Second paragraph starts", 72.0, 160.0, 10.0),
            make_span("Second paragraph ends", 72.0, 172.0, 10.0),
        ]);
        assert_eq!(layout.items.len(), 2);
    }

    #[test]
    fn test_heading_and_list_blocks() {
        let layout = resolve(vec![
            make_span("Overview", 72.0, 60.0, 18.0),
            make_span("Body text long enough to be the dominant size", 72.0, 100.0, 10.0),
            make_span("- first item", 72.0, 112.0, 10.0),
            make_span("- second item", 72.0, 124.0, 10.0),
            make_span("continues here", 80.0, 136.0, 10.0),
        ]);

        let kinds: Vec<&BlockKind> = layout
            .items
            .iter()
            .filter_map(PageItem::as_text)
            .map(|b| &b.kind)
            .collect();
        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[0], &BlockKind::Heading(1));
        assert_eq!(kinds[1], &BlockKind::Paragraph);
        assert!(matches!(kinds[2], BlockKind::ListItem(_)));
        assert!(matches!(kinds[3], BlockKind::ListItem(_)));

        let last = layout.items[3].as_text().unwrap();
        assert_eq!(last.lines.len(), 2);
    }

    #[test]
    fn test_wrapped_heading_merges() {
        let layout = resolve(vec![
            make_span("A Rather Long Title", 72.0, 60.0, 18.0),
            make_span("Over Two Lines", 72.0, 82.0, 18.0),
            make_span("Body text long enough to be the dominant size here", 72.0, 120.0, 10.0),
        ]);
        let first = layout.items[0].as_text().unwrap();
        assert_eq!(first.kind, BlockKind::Heading(1));
        assert_eq!(first.text(), "A Rather Long Title Over Two Lines");
    }

    #[test]
    fn test_code_and_caption_blocks() {
        let mut code1 = make_span("fn main() {", 72.0, 100.0, 10.0);
        code1.font_name = "Courier".into();
        let mut code2 = make_span("}", 72.0, 112.0, 10.0);
        code2.font_name = "Courier".into();

        let layout = resolve(vec![
            make_span("Figure 2: Results overview", 72.0, 60.0, 10.0),
            code1,
            code2,
        ]);
        let kinds: Vec<&BlockKind> = layout
            .items
            .iter()
            .filter_map(PageItem::as_text)
            .map(|b| &b.kind)
            .collect();
        assert_eq!(kinds, vec![&BlockKind::Caption, &BlockKind::Code]);
    }

    #[test]
    fn test_stacked_characters_read_horizontally() {
        let spans: Vec<Span> = "VERTICAL"
            .chars()
            .enumerate()
            .map(|(i, c)| make_span(&c.to_string(), 40.0 + (i % 2) as f32, 100.0 + i as f32 * 12.0, 10.0))
            .collect();

        let layout = resolve(spans);
        assert_eq!(layout.lines().count(), 1);
        assert_eq!(block_texts(&layout), vec!["VERTICAL"]);
    }

    #[test]
    fn test_short_character_stack_kept() {
        let spans = vec![
            make_span("A", 40.0, 100.0, 10.0),
            make_span("B", 40.0, 112.0, 10.0),
            make_span("C", 40.0, 124.0, 10.0),
        ];

        let layout = resolve(spans);
        assert_eq!(layout.lines().count(), 3);
    }

    #[test]
    fn test_line_ids_are_unique() {
        let layout = resolve(vec![
            make_span("one", 72.0, 100.0, 10.0),
            make_span("two", 72.0, 112.0, 10.0),
        ]);
        let ids: Vec<u64> = layout.lines().map(|l| l.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_cjk_spacing() {
        let a = PlacedSpan::new(
            Span::new("漢字", BBox::new(0.0, 0.0, 20.0, 10.0), 1, "Mincho", 10.0),
            SpanRole::Paragraph,
        );
        let b = PlacedSpan::new(
            Span::new("文字", BBox::new(25.0, 0.0, 45.0, 10.0), 1, "Mincho", 10.0),
            SpanRole::Paragraph,
        );
        let c = PlacedSpan::new(
            Span::new("word", BBox::new(50.0, 0.0, 70.0, 10.0), 1, "Mincho", 10.0),
            SpanRole::Paragraph,
        );
        assert!(!needs_space(&a, &b));
        assert!(needs_space(&b, &c));
    }
}
