//! Table reconstruction.
//!
//! Two paths produce [`TableGrid`]s. Bordered regions arrive with their
//! cell text and replace the lines they cover. Borderless tables are
//! inferred from text alignment (in the manner of Camelot's Stream mode):
//! runs of lines split into cells by wide gaps whose cell left edges line up
//! across rows.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::Warning;
use crate::model::{BBox, TableGrid, TableRegion};

use super::layout::{make_block, needs_space, split_lines, BlockKind, PageItem, PageLayout, PlacedSpan, TextLine};

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Left-edge distance within which cells share a column (points)
    pub alignment_tolerance: f32,
    /// Minimum horizontal gap between spans that separates cells (points)
    pub min_cell_gap: f32,
    /// Maximum vertical gap between consecutive rows (points)
    pub max_row_gap: f32,
    /// Infer tables from text alignment
    pub detect_borderless: bool,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            alignment_tolerance: 5.0,
            min_cell_gap: 10.0,
            max_row_gap: 50.0,
            detect_borderless: true,
        }
    }
}

/// A cell of a candidate row: contiguous spans without a wide gap.
#[derive(Debug, Clone, PartialEq)]
pub struct CellText {
    /// Cell text
    pub text: String,
    /// Left edge
    pub x0: f32,
    /// Right edge
    pub x1: f32,
}

/// A borderless table found in a run of lines.
#[derive(Debug, Clone)]
struct DetectedTable {
    line_ids: Vec<u64>,
    grid: TableGrid,
    bbox: BBox,
    column: usize,
}

/// Detects tables on laid-out pages.
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self {
            config: TableDetectorConfig::default(),
        }
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Replace bordered regions and aligned text on one page with tables.
    ///
    /// Rejected borderless candidates are reported in `warnings` and stay text.
    pub fn apply_page(&self, mut page: PageLayout, regions: Vec<TableRegion>, warnings: &mut Vec<Warning>) -> PageLayout {
        for region in regions {
            page = self.insert_region(page, region);
        }
        if self.config.detect_borderless {
            page = self.detect_borderless(page, warnings);
        }
        page
    }

    /// Insert one bordered region, removing the lines it covers.
    fn insert_region(&self, mut page: PageLayout, region: TableRegion) -> PageLayout {
        let grid = TableGrid::from_rows(region.rows);
        if grid.is_empty() {
            log::debug!("page {}: skipping empty table region {:?}", page.number, region.bbox);
            return page;
        }
        let bbox = region.bbox;
        let inside = |line: &TextLine| bbox.contains_point(line.bbox.center_x(), line.bbox.center_y(), 1.0);

        let mut items = Vec::with_capacity(page.items.len() + 1);
        for item in std::mem::take(&mut page.items) {
            match item {
                PageItem::Text(block) if block.lines.iter().any(&inside) => {
                    let (kind, column, block_page) = (block.kind.clone(), block.column, block.page);
                    for (i, (covered, run)) in split_lines(block.lines, &inside).into_iter().enumerate() {
                        if covered {
                            continue;
                        }
                        let mut rebuilt = make_block(run, column, block_page);
                        // Lines before the region keep the block's kind
                        if i == 0 {
                            rebuilt.kind = kind.clone();
                        }
                        items.push(PageItem::Text(rebuilt));
                    }
                }
                other => items.push(other),
            }
        }

        let column = page
            .columns
            .iter()
            .position(|c| c.contains(bbox.center_x()))
            .unwrap_or(0);
        let position = items
            .iter()
            .position(|item| item.column() > column || (item.column() == column && item.top() > bbox.y0))
            .unwrap_or(items.len());

        log::debug!(
            "page {}: bordered table {}x{} inserted at {}",
            page.number,
            grid.row_count(),
            grid.column_count(),
            position
        );
        items.insert(position, PageItem::Table { grid, bbox, column });
        page.items = items;
        page
    }

    /// Find aligned runs of lines and replace them with tables.
    fn detect_borderless(&self, mut page: PageLayout, warnings: &mut Vec<Warning>) -> PageLayout {
        let mut tables: Vec<DetectedTable> = Vec::new();
        {
            let mut run: Vec<(&TextLine, Vec<CellText>)> = Vec::new();
            for item in &page.items {
                let Some(block) = item.as_text().filter(|b| is_table_eligible(&b.kind)) else {
                    tables.extend(self.examine_run(std::mem::take(&mut run), page.number, warnings));
                    continue;
                };
                for line in &block.lines {
                    let cells = self.split_cells(line);
                    if cells.len() < self.config.min_columns {
                        tables.extend(self.examine_run(std::mem::take(&mut run), page.number, warnings));
                        continue;
                    }
                    let continues = run.last().map_or(true, |(prev, _)| {
                        prev.column == line.column && line.bbox.y0 - prev.bbox.y1 <= self.config.max_row_gap
                    });
                    if !continues {
                        tables.extend(self.examine_run(std::mem::take(&mut run), page.number, warnings));
                    }
                    run.push((line, cells));
                }
            }
            tables.extend(self.examine_run(run, page.number, warnings));
        }

        if tables.is_empty() {
            return page;
        }

        let table_lines: HashSet<u64> = tables.iter().flat_map(|t| t.line_ids.iter().copied()).collect();
        let mut starts: HashMap<u64, DetectedTable> = tables
            .into_iter()
            .filter_map(|t| t.line_ids.first().copied().map(|id| (id, t)))
            .collect();

        let mut items = Vec::with_capacity(page.items.len());
        for item in std::mem::take(&mut page.items) {
            match item {
                PageItem::Text(block) if block.lines.iter().any(|l| table_lines.contains(&l.id)) => {
                    let (column, block_page) = (block.column, block.page);
                    for (in_table, run) in split_lines(block.lines, |l| table_lines.contains(&l.id)) {
                        if !in_table {
                            items.push(PageItem::Text(make_block(run, column, block_page)));
                            continue;
                        }
                        for line in run {
                            if let Some(table) = starts.remove(&line.id) {
                                items.push(PageItem::Table {
                                    grid: table.grid,
                                    bbox: table.bbox,
                                    column: table.column,
                                });
                            }
                        }
                    }
                }
                other => items.push(other),
            }
        }
        page.items = items;
        page.prune();
        page
    }

    /// Split a line into cells at horizontal gaps of at least `min_cell_gap`.
    pub fn split_cells(&self, line: &TextLine) -> Vec<CellText> {
        let mut cells: Vec<CellText> = Vec::new();
        let mut prev: Option<&PlacedSpan> = None;

        for placed in line.spans.iter().filter(|s| !s.text().trim().is_empty()) {
            let bbox = placed.span.bbox;
            match (prev, cells.last_mut()) {
                (Some(p), Some(cell)) if bbox.x0 - p.span.bbox.x1 < self.config.min_cell_gap => {
                    if needs_space(p, placed) {
                        cell.text.push(' ');
                    }
                    cell.text.push_str(placed.text());
                    cell.x1 = cell.x1.max(bbox.x1);
                }
                _ => cells.push(CellText {
                    text: placed.text().to_string(),
                    x0: bbox.x0,
                    x1: bbox.x1,
                }),
            }
            prev = Some(placed);
        }

        for cell in &mut cells {
            cell.text = cell.text.trim().to_string();
        }
        cells
    }

    /// Turn a run of multi-cell lines into zero or more tables.
    fn examine_run(
        &self,
        run: Vec<(&TextLine, Vec<CellText>)>,
        page: u32,
        warnings: &mut Vec<Warning>,
    ) -> Vec<DetectedTable> {
        if run.len() < self.config.min_rows {
            return vec![];
        }

        let rows: Vec<&[CellText]> = run.iter().map(|(_, cells)| cells.as_slice()).collect();
        let boundaries = self.column_boundaries(&rows);
        if boundaries.len() < self.config.min_columns {
            return vec![];
        }

        // Maximal sub-runs of rows with at least two cells on the boundaries
        let on_boundaries = |cells: &[CellText]| {
            cells
                .iter()
                .filter(|c| boundaries.iter().any(|b| (c.x0 - b).abs() <= self.config.alignment_tolerance))
                .count()
                >= self.config.min_columns
        };

        let mut tables = Vec::new();
        let mut start = 0;
        while start < run.len() {
            if !on_boundaries(&run[start].1) {
                start += 1;
                continue;
            }
            let mut end = start;
            while end + 1 < run.len() && on_boundaries(&run[end + 1].1) {
                end += 1;
            }
            if end + 1 - start >= self.config.min_rows {
                if let Some(table) = self.build_table(&run[start..=end], page, warnings) {
                    tables.push(table);
                }
            }
            start = end + 1;
        }
        tables
    }

    fn build_table(
        &self,
        rows: &[(&TextLine, Vec<CellText>)],
        page: u32,
        warnings: &mut Vec<Warning>,
    ) -> Option<DetectedTable> {
        let cells: Vec<&[CellText]> = rows.iter().map(|(_, c)| c.as_slice()).collect();
        let boundaries = self.column_boundaries(&cells);

        if boundaries.len() < self.config.min_columns {
            return None;
        }
        if boundaries.len() > self.config.max_columns {
            log::debug!(
                "page {}: skipping aligned run, too many columns ({} > {})",
                page,
                boundaries.len(),
                self.config.max_columns
            );
            return None;
        }

        let mut grid_rows: Vec<Vec<String>> = Vec::with_capacity(rows.len());
        for row in &cells {
            let mut slots: Vec<Option<String>> = vec![None; boundaries.len()];
            for cell in row.iter() {
                let idx = nearest_boundary(&boundaries, cell.x0);
                if slots[idx].is_some() {
                    log::debug!("page {}: two cells on boundary {} of an aligned run", page, idx);
                    warnings.push(Warning::AmbiguousTable {
                        page,
                        rows: rows.len(),
                    });
                    return None;
                }
                slots[idx] = Some(cell.text.clone());
            }
            grid_rows.push(slots.into_iter().map(Option::unwrap_or_default).collect());
        }

        if is_list_pattern(&cells, boundaries.len()) {
            log::debug!("page {}: skipping aligned run, detected as list pattern", page);
            return None;
        }

        let bbox = rows
            .iter()
            .map(|(line, _)| line.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();

        log::debug!(
            "page {}: borderless table with {} rows and {} columns",
            page,
            grid_rows.len(),
            boundaries.len()
        );

        Some(DetectedTable {
            line_ids: rows.iter().map(|(line, _)| line.id).collect(),
            grid: TableGrid::from_rows(grid_rows),
            bbox,
            column: rows.first().map(|(line, _)| line.column).unwrap_or(0),
        })
    }

    /// Cluster cell left edges; clusters present in enough rows become boundaries.
    fn column_boundaries(&self, rows: &[&[CellText]]) -> Vec<f32> {
        let mut edges: Vec<(f32, usize)> = rows
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| cells.iter().map(move |c| (c.x0, row)))
            .collect();
        edges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut clusters: Vec<(f32, Vec<f32>, HashSet<usize>)> = Vec::new();
        for (x, row) in edges {
            match clusters.last_mut() {
                Some((first, xs, rows)) if x - *first <= self.config.alignment_tolerance => {
                    xs.push(x);
                    rows.insert(row);
                }
                _ => clusters.push((x, vec![x], HashSet::from([row]))),
            }
        }

        clusters
            .into_iter()
            .filter(|(_, _, rows)| rows.len() >= self.config.min_rows)
            .map(|(_, xs, _)| xs.iter().sum::<f32>() / xs.len() as f32)
            .collect()
    }
}

impl Default for TableDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn is_table_eligible(kind: &BlockKind) -> bool {
    matches!(kind, BlockKind::Paragraph | BlockKind::Caption)
}

fn nearest_boundary(boundaries: &[f32], x: f32) -> usize {
    boundaries
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().partial_cmp(&(x - **b).abs()).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Check if aligned rows actually represent a numbered or bulleted list.
///
/// A list whose markers are set apart from the item text looks like a
/// two-column table: marker column plus text column.
fn is_list_pattern(rows: &[&[CellText]], columns: usize) -> bool {
    if columns < 2 || rows.is_empty() {
        return false;
    }

    let mut bullet_count = 0;
    let mut number_count = 0;
    for row in rows {
        let Some(first) = row.first() else { continue };
        if is_bullet_marker(&first.text) {
            bullet_count += 1;
        } else if is_number_marker(&first.text) {
            number_count += 1;
        }
    }

    let bullet_ratio = bullet_count as f32 / rows.len() as f32;
    let total_ratio = (bullet_count + number_count) as f32 / rows.len() as f32;

    // Bullet markers are almost never real table data; numbered first
    // columns only disqualify two-column runs
    bullet_ratio >= 0.5 || (columns == 2 && total_ratio >= 0.5)
}

/// Check if text is a bullet marker (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "□" | "◆" | "▶" | "➤"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    // Just a bare number
    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let mut chars = cleaned.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), Some('.' | ')'), None) => letter.is_alphabetic(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;
    use crate::parser::classifier::SpanRole;
    use crate::parser::layout::TextBlock;

    fn make_span(text: &str, x: f32, y: f32) -> PlacedSpan {
        let width = text.chars().count() as f32 * 6.0;
        let span = Span::new(text, BBox::new(x, y, x + width, y + 10.0), 1, "Helvetica", 10.0);
        PlacedSpan::new(span, SpanRole::Paragraph)
    }

    fn make_line(id: u64, cells: &[(&str, f32)], y: f32) -> TextLine {
        let spans = cells.iter().map(|(t, x)| make_span(t, *x, y)).collect();
        TextLine::from_spans(id, spans, 0, 1)
    }

    fn page_of(blocks: Vec<Vec<TextLine>>) -> PageLayout {
        PageLayout {
            number: 1,
            width: 612.0,
            height: 792.0,
            items: blocks
                .into_iter()
                .map(|lines| PageItem::Text(make_block(lines, 0, 1)))
                .collect(),
            columns: Vec::new(),
        }
    }

    fn tables(page: &PageLayout) -> Vec<&TableGrid> {
        page.items
            .iter()
            .filter_map(|item| match item {
                PageItem::Table { grid, .. } => Some(grid),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_split_cells() {
        let detector = TableDetector::new();
        let line = make_line(0, &[("Total", 72.0), ("cost", 104.0), ("42", 300.0)], 100.0);
        let cells = detector.split_cells(&line);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].text, "Total cost");
        assert_eq!(cells[1].text, "42");
    }

    #[test]
    fn test_detect_simple_table() {
        let page = page_of(vec![
            vec![make_line(0, &[("Intro paragraph", 72.0)], 80.0)],
            vec![
                make_line(1, &[("Name", 72.0), ("Age", 200.0), ("City", 330.0)], 100.0),
                make_line(2, &[("Alice", 72.0), ("30", 200.0), ("Paris", 330.0)], 114.0),
                make_line(3, &[("Bob", 72.0), ("25", 200.0), ("Rome", 330.0)], 128.0),
            ],
        ]);

        let mut warnings = Vec::new();
        let page = TableDetector::new().apply_page(page, vec![], &mut warnings);
        let grids = tables(&page);

        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].row_count(), 3);
        assert!(grids[0].rows.iter().all(|r| r.len() == 3));
        assert_eq!(grids[0].cell(1, 2), Some("Paris"));
        assert!(warnings.is_empty());
        assert!(matches!(page.items[0], PageItem::Text(_)));
    }

    #[test]
    fn test_missing_cells_are_padded() {
        let page = page_of(vec![vec![
            make_line(0, &[("Item", 72.0), ("Qty", 200.0), ("Note", 330.0)], 100.0),
            make_line(1, &[("Pen", 72.0), ("2", 200.0)], 114.0),
            make_line(2, &[("Ink", 72.0), ("1", 200.0), ("blue", 330.0)], 128.0),
        ]]);
        let page = TableDetector::new().apply_page(page, vec![], &mut Vec::new());
        let grids = tables(&page);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].cell(1, 2), Some(""));
    }

    #[test]
    fn test_no_table_single_column() {
        let page = page_of(vec![vec![
            make_line(0, &[("Line 1", 72.0)], 100.0),
            make_line(1, &[("Line 2", 72.0)], 114.0),
        ]]);
        let page = TableDetector::new().apply_page(page, vec![], &mut Vec::new());
        assert!(tables(&page).is_empty());
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_ambiguous_run_stays_text() {
        // Second row has two cells near the same boundary
        let page = page_of(vec![vec![
            make_line(0, &[("alpha", 72.0), ("beta", 200.0)], 100.0),
            make_line(1, &[("gamma", 72.0), ("delta", 200.0)], 114.0),
            make_line(2, &[("a", 72.0), ("b", 200.0), ("c", 220.0)], 128.0),
        ]]);
        let mut warnings = Vec::new();
        let page = TableDetector::new().apply_page(page, vec![], &mut warnings);
        assert!(tables(&page).is_empty());
        assert_eq!(warnings, vec![Warning::AmbiguousTable { page: 1, rows: 3 }]);
    }

    #[test]
    fn test_numbered_two_column_run_is_list() {
        let page = page_of(vec![vec![
            make_line(0, &[("1.", 72.0), ("First step", 100.0)], 100.0),
            make_line(1, &[("2.", 72.0), ("Second step", 100.0)], 114.0),
        ]]);
        let page = TableDetector::new().apply_page(page, vec![], &mut Vec::new());
        assert!(tables(&page).is_empty());
    }

    #[test]
    fn test_too_many_columns_rejected() {
        let xs = [72.0, 130.0, 190.0, 250.0, 310.0, 370.0, 430.0];
        let row = |id: u64, y: f32| {
            let cells: Vec<(&str, f32)> = xs.iter().map(|x| ("x", *x)).collect();
            make_line(id, &cells, y)
        };
        let page = page_of(vec![vec![row(0, 100.0), row(1, 114.0)]]);
        let page = TableDetector::new().apply_page(page, vec![], &mut Vec::new());
        assert!(tables(&page).is_empty());
    }

    #[test]
    fn test_bordered_region_replaces_lines() {
        let page = page_of(vec![
            vec![make_line(0, &[("Before", 72.0)], 80.0)],
            vec![
                make_line(1, &[("a", 72.0)], 210.0),
                make_line(2, &[("b", 72.0)], 230.0),
            ],
            vec![make_line(3, &[("After", 72.0)], 400.0)],
        ]);
        let region = TableRegion {
            bbox: BBox::new(60.0, 200.0, 500.0, 260.0),
            rows: vec![
                vec!["H1".into(), "H2".into()],
                vec!["x\ny".into()],
            ],
        };

        let page = TableDetector::new().apply_page(page, vec![region], &mut Vec::new());
        assert_eq!(page.items.len(), 3);
        assert!(matches!(page.items[0], PageItem::Text(_)));
        match &page.items[1] {
            PageItem::Table { grid, .. } => {
                assert_eq!(grid.rows, vec![vec!["H1", "H2"], vec!["x y", ""]]);
            }
            other => panic!("expected table, got {:?}", other),
        }
        assert_eq!(page.items[2].as_text().map(TextBlock::text), Some("After".to_string()));
    }

    #[test]
    fn test_empty_region_skipped() {
        let page = page_of(vec![vec![make_line(0, &[("Text", 72.0)], 210.0)]]);
        let region = TableRegion {
            bbox: BBox::new(60.0, 200.0, 500.0, 260.0),
            rows: vec![],
        };
        let page = TableDetector::new().apply_page(page, vec![region], &mut Vec::new());
        assert_eq!(page.items.len(), 1);
        assert!(tables(&page).is_empty());
    }

    #[test]
    fn test_markers() {
        assert!(is_bullet_marker("•"));
        assert!(is_number_marker("12."));
        assert!(is_number_marker("b)"));
        assert!(is_number_marker("42"));
        assert!(!is_number_marker("Total"));
    }
}
