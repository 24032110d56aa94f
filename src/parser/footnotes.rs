//! Footnote linking.
//!
//! Markers are small raised numbers inside body lines. Definitions are
//! small lines in the bottom band of a page that start with a number.
//! A marker links to the definition with the same key on its own page;
//! wider searches are an explicit opt-in.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Warning;
use crate::model::{FootnoteDefinition, FootnoteMarker};

use super::dehyphen::join_fragments;
use super::layout::{needs_space, PageItem, PageLayout, PlacedSpan, TextLine};

lazy_static! {
    static ref DEFINITION_RE: Regex =
        Regex::new(r"^(?:\[(\d{1,3})\]|\((\d{1,3})\)|(\d{1,3})(?:[.):]|\s))\s*(\S.*)$").unwrap();
}

/// Where a marker may find its definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FootnoteScope {
    /// Only the marker's own page
    #[default]
    SamePage,
    /// The own page first, then following pages (nearest first), then earlier ones
    Document,
}

/// Footnote linker configuration.
#[derive(Debug, Clone)]
pub struct FootnoteConfig {
    /// Definition search scope
    pub scope: FootnoteScope,
    /// Height of the bottom band holding definitions, as a fraction of page height
    pub footnote_band: f32,
    /// Minimum raise of a marker above the baseline, as a fraction of the line's size
    pub superscript_raise: f32,
    /// Maximum marker size relative to the largest other span on the line
    pub size_ratio: f32,
}

impl Default for FootnoteConfig {
    fn default() -> Self {
        Self {
            scope: FootnoteScope::SamePage,
            footnote_band: 0.15,
            superscript_raise: 0.15,
            size_ratio: 0.9,
        }
    }
}

/// A definition found on a page, before linking.
#[derive(Debug, Clone)]
struct FoundDefinition {
    key: u32,
    page: u32,
    text: String,
    line_ids: Vec<u64>,
    label: Option<String>,
}

/// Location of a marker span.
#[derive(Debug, Clone)]
struct MarkerSite {
    marker: FootnoteMarker,
    page_index: usize,
    line_id: u64,
    span_index: usize,
}

/// Result of linking: pages with markers annotated and definitions removed.
#[derive(Debug, Clone)]
pub struct LinkedFootnotes {
    /// Pages with linked definition lines removed
    pub pages: Vec<PageLayout>,
    /// Linked definitions in order of first reference
    pub definitions: Vec<FootnoteDefinition>,
    /// Markers left unresolved
    pub warnings: Vec<Warning>,
}

/// Pairs footnote markers with definitions.
pub struct FootnoteLinker {
    config: FootnoteConfig,
    body_size: f32,
}

impl FootnoteLinker {
    /// Create a linker for a document with the given body font size.
    pub fn new(config: FootnoteConfig, body_size: f32) -> Self {
        Self { config, body_size }
    }

    /// Link markers and definitions across all pages.
    pub fn link(&self, mut pages: Vec<PageLayout>) -> LinkedFootnotes {
        let mut definitions: Vec<Vec<FoundDefinition>> = pages.iter().map(|p| self.find_definitions(p)).collect();

        let mut sites = Vec::new();
        for (page_index, page) in pages.iter().enumerate() {
            let definition_lines: HashSet<u64> = definitions[page_index]
                .iter()
                .flat_map(|d| d.line_ids.iter().copied())
                .collect();
            for line in page.lines().filter(|l| !definition_lines.contains(&l.id)) {
                for span_index in self.marker_spans(line) {
                    let placed = &line.spans[span_index];
                    let Ok(key) = placed.text().trim().parse::<u32>() else {
                        continue;
                    };
                    sites.push(MarkerSite {
                        marker: FootnoteMarker {
                            key,
                            page: page.number,
                            anchor: anchor_text(line, span_index),
                        },
                        page_index,
                        line_id: line.id,
                        span_index,
                    });
                }
            }
        }

        let mut warnings = Vec::new();
        let mut used_labels: HashSet<String> = HashSet::new();
        let mut order: Vec<(usize, usize)> = Vec::new();
        let mut links: HashMap<(u64, usize), String> = HashMap::new();

        for site in &sites {
            let Some((pi, di)) = self.resolve(&definitions, site.page_index, site.marker.key) else {
                log::debug!(
                    "page {}: footnote marker {} after {:?} has no definition",
                    site.marker.page,
                    site.marker.key,
                    site.marker.anchor
                );
                warnings.push(Warning::UnresolvedFootnote {
                    page: site.marker.page,
                    key: site.marker.key,
                });
                continue;
            };

            let definition = &mut definitions[pi][di];
            let label = match &definition.label {
                Some(label) => label.clone(),
                None => {
                    let mut label = definition.key.to_string();
                    if used_labels.contains(&label) {
                        label = format!("{}-{}", definition.key, definition.page);
                    }
                    used_labels.insert(label.clone());
                    definition.label = Some(label.clone());
                    order.push((pi, di));
                    label
                }
            };
            links.insert((site.line_id, site.span_index), label);
        }

        let removed: HashSet<u64> = order
            .iter()
            .flat_map(|&(pi, di)| definitions[pi][di].line_ids.iter().copied())
            .collect();

        for page in &mut pages {
            for item in &mut page.items {
                if let PageItem::Text(block) = item {
                    block.lines.retain(|line| !removed.contains(&line.id));
                    for line in &mut block.lines {
                        for (span_index, placed) in line.spans.iter_mut().enumerate() {
                            if let Some(label) = links.get(&(line.id, span_index)) {
                                placed.footnote = Some(label.clone());
                            }
                        }
                    }
                }
            }
            page.prune();
        }

        let definitions: Vec<FootnoteDefinition> = order
            .into_iter()
            .filter_map(|(pi, di)| {
                let d = &definitions[pi][di];
                d.label
                    .as_ref()
                    .map(|label| FootnoteDefinition::new(d.key, d.page, label.clone(), d.text.clone()))
            })
            .collect();

        LinkedFootnotes {
            pages,
            definitions,
            warnings,
        }
    }

    /// Find the definition for a key within the configured scope.
    fn resolve(&self, definitions: &[Vec<FoundDefinition>], page_index: usize, key: u32) -> Option<(usize, usize)> {
        let find = |pi: usize| {
            definitions
                .get(pi)
                .and_then(|defs| defs.iter().position(|d| d.key == key))
                .map(|di| (pi, di))
        };

        if let Some(found) = find(page_index) {
            return Some(found);
        }
        match self.config.scope {
            FootnoteScope::SamePage => None,
            FootnoteScope::Document => (page_index + 1..definitions.len())
                .chain((0..page_index).rev())
                .find_map(find),
        }
    }

    /// Definitions in the bottom band of a page, with their continuation lines.
    fn find_definitions(&self, page: &PageLayout) -> Vec<FoundDefinition> {
        let band_top = page.height * (1.0 - self.config.footnote_band);
        let mut found: Vec<FoundDefinition> = Vec::new();
        let mut open = false;

        for line in page.lines() {
            let small = line.font_size < self.body_size - 0.25;
            if line.bbox.y0 < band_top || !small {
                open = false;
                continue;
            }

            if let Some((key, text)) = parse_definition(line) {
                found.push(FoundDefinition {
                    key,
                    page: page.number,
                    text,
                    line_ids: vec![line.id],
                    label: None,
                });
                open = true;
            } else if open {
                if let Some(current) = found.last_mut() {
                    join_fragments(&mut current.text, &line.text());
                    current.line_ids.push(line.id);
                }
            }
        }

        if !found.is_empty() {
            log::debug!("page {}: {} footnote definitions", page.number, found.len());
        }
        found
    }

    /// Indices of the spans of a line that look like footnote markers.
    fn marker_spans(&self, line: &TextLine) -> Vec<usize> {
        let mut result = Vec::new();
        for (i, placed) in line.spans.iter().enumerate() {
            let text = placed.text().trim();
            if text.is_empty() || text.len() > 3 || !text.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }

            let largest_other = line
                .spans
                .iter()
                .enumerate()
                .filter(|(j, s)| *j != i && !s.text().trim().is_empty())
                .map(|(_, s)| s.span.font_size)
                .fold(0.0f32, f32::max);
            if largest_other <= 0.0 {
                continue;
            }

            let span = &placed.span;
            let raised = line.baseline - span.bbox.y1 > self.config.superscript_raise * largest_other;
            let small = span.font_size < self.config.size_ratio * largest_other;
            // The extractor's superscript flag stands in for the raise, never for the size
            if small && (raised || span.flags.superscript) {
                result.push(i);
            }
        }
        result
    }
}

/// Split a definition line into its key and body text.
fn parse_definition(line: &TextLine) -> Option<(u32, String)> {
    let visible: Vec<&PlacedSpan> = line.spans.iter().filter(|s| !s.text().trim().is_empty()).collect();
    let first = visible.first()?;

    // Key set as its own (often raised) span
    let first_text = first.text().trim();
    if visible.len() > 1 && first_text.len() <= 3 && first_text.chars().all(|c| c.is_ascii_digit()) {
        let key = first_text.parse().ok()?;
        let mut text = String::new();
        for (i, s) in visible.iter().enumerate().skip(1) {
            if i > 1 && needs_space(visible[i - 1], s) {
                text.push(' ');
            }
            text.push_str(s.text());
        }
        return Some((key, text.trim().to_string()));
    }

    let full = line.text();
    let caps = DEFINITION_RE.captures(full.trim())?;
    let key = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))?
        .as_str()
        .parse()
        .ok()?;
    let text = caps.get(4)?.as_str().trim().to_string();
    Some((key, text))
}

/// Text of the span before the marker, used in diagnostics.
fn anchor_text(line: &TextLine, span_index: usize) -> String {
    span_index
        .checked_sub(1)
        .and_then(|i| line.spans.get(i))
        .map(|s| s.text().trim().to_string())
        .unwrap_or_default()
}
