//! Table-of-contents entries.
//!
//! A line ending in a dotted leader and a page number is a contents entry.
//! Entries become bullet list items without the leader and page number,
//! nested by their indentation among the page's entries.
//!
//! The entries also name the document's sections. Each title is looked up on
//! the page it points to, shifted by the gap between printed and physical
//! page numbers, and the matching block becomes a heading at the entry's
//! depth.

use std::cmp::Ordering;
use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::ListInfo;

use super::classifier::SpanRole;
use super::layout::{make_block, split_lines, BlockKind, PageItem, PageLayout, TextBlock, TextLine};

lazy_static! {
    static ref ENTRY_RE: Regex = Regex::new(r"(?:\.{3,}|(?:\.\s){2,}\.?|…+)\s*\d{1,4}\s*$").unwrap();
    static ref LEADER_RE: Regex = Regex::new(r"\.{3,}|(?:\.\s){2,}|…").unwrap();
}

const INDENT_TOLERANCE: f32 = 4.0;

/// Normalized characters a heading may carry beyond the entry title, such as
/// a section number the contents page leaves out.
const MAX_EXTRA_CHARS: usize = 6;

/// Number of leading entries tried when measuring the page offset.
const OFFSET_SAMPLES: usize = 3;

/// One contents entry: a section title and the page it is printed on.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Title without leader and page number
    pub title: String,
    /// Page number as printed in the contents
    pub page: u32,
    /// Nesting depth, 0 for the outermost entries
    pub depth: u8,
}

impl TocEntry {
    /// Heading level the entry's section is rendered at.
    ///
    /// Outermost entries map to level 2, leaving level 1 to the document title.
    pub fn heading_level(&self) -> u8 {
        (self.depth.saturating_add(2)).min(6)
    }
}

/// Whether a line of text is a contents entry.
pub fn is_toc_entry(text: &str) -> bool {
    let trimmed = text.trim();
    match ENTRY_RE.find(trimmed) {
        // Something has to precede the leader
        Some(m) => trimmed[..m.start()].chars().any(char::is_alphanumeric),
        None => false,
    }
}

/// Rewrites contents entries of every page into list items and promotes
/// the sections they name to headings.
#[derive(Debug, Clone)]
pub struct TocDetector {
    /// Minimum number of entries a page needs before its lines are rewritten
    pub min_entries: usize,
    /// Turn the blocks the entries point at into headings
    pub map_headings: bool,
}

impl Default for TocDetector {
    fn default() -> Self {
        Self {
            min_entries: 2,
            map_headings: true,
        }
    }
}

impl TocDetector {
    /// Rewrite the contents entries of all pages.
    pub fn apply(&self, pages: Vec<PageLayout>) -> Vec<PageLayout> {
        let mut entries = Vec::new();
        let mut contents_pages = HashSet::new();
        let mut pages: Vec<PageLayout> = pages
            .into_iter()
            .map(|page| {
                let (page, found) = self.apply_page(page);
                if !found.is_empty() {
                    contents_pages.insert(page.number);
                    entries.extend(found);
                }
                page
            })
            .collect();

        if self.map_headings && !entries.is_empty() {
            map_entries(&mut pages, &entries, &contents_pages);
        }
        pages
    }

    fn apply_page(&self, mut page: PageLayout) -> (PageLayout, Vec<TocEntry>) {
        let entry_x: Vec<f32> = page
            .items
            .iter()
            .filter_map(PageItem::as_text)
            .filter(|b| b.kind != BlockKind::Code)
            .flat_map(|b| b.lines.iter())
            .filter(|l| is_toc_entry(&l.text()))
            .map(TextLine::x0)
            .collect();

        if entry_x.len() < self.min_entries {
            return (page, Vec::new());
        }

        let levels = indent_levels(&entry_x);
        log::debug!(
            "page {}: {} contents entries over {} indent levels",
            page.number,
            entry_x.len(),
            levels.len()
        );

        let mut entries = Vec::new();
        let mut items = Vec::with_capacity(page.items.len());
        for item in std::mem::take(&mut page.items) {
            match item {
                PageItem::Text(block) if block.kind != BlockKind::Code => {
                    items.extend(
                        rewrite_block(block, &levels, &mut entries)
                            .into_iter()
                            .map(PageItem::Text),
                    );
                }
                other => items.push(other),
            }
        }
        page.items = items;
        (page, entries)
    }
}

/// Uppercased letters and digits only, the form titles are compared in.
fn normalize_for_match(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Whether a block's normalized text is the entry title, possibly numbered.
fn names_title(block_norm: &str, title_norm: &str) -> bool {
    !title_norm.is_empty()
        && block_norm.contains(title_norm)
        && block_norm.chars().count() <= title_norm.chars().count() + MAX_EXTRA_CHARS
}

/// Where on a page an entry title was found.
enum TitleMatch {
    /// A single block carries the whole title
    Block(usize),
    /// The title wraps over this block and the next
    Pair(usize),
}

/// Find an entry title among the text blocks of a page, by item index.
fn find_title(page: &PageLayout, title_norm: &str) -> Option<TitleMatch> {
    let blocks: Vec<(usize, String)> = page
        .items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.as_text().map(|b| (i, b)))
        .filter(|(_, b)| b.kind != BlockKind::Code)
        .map(|(i, b)| (i, normalize_for_match(&b.text())))
        .collect();

    for (k, (index, norm)) in blocks.iter().enumerate() {
        if names_title(norm, title_norm) {
            return Some(TitleMatch::Block(*index));
        }
        if let Some((next_index, next_norm)) = blocks.get(k + 1) {
            let head = norm.trim_start_matches(|c: char| c.is_ascii_digit());
            let adjacent = *next_index == index + 1;
            let combined = format!("{}{}", norm, next_norm);
            if adjacent && !head.is_empty() && title_norm.starts_with(head) && names_title(&combined, title_norm) {
                return Some(TitleMatch::Pair(*index));
            }
        }
    }
    None
}

/// Physical minus printed page number, measured on the first entries found.
fn page_offset(pages: &[PageLayout], entries: &[TocEntry], contents_pages: &HashSet<u32>) -> i64 {
    for entry in entries.iter().take(OFFSET_SAMPLES) {
        let title_norm = normalize_for_match(&entry.title);
        let found = pages
            .iter()
            .filter(|p| !contents_pages.contains(&p.number))
            .find(|p| find_title(p, &title_norm).is_some());
        if let Some(page) = found {
            return page.number as i64 - entry.page as i64;
        }
    }
    0
}

/// Promote the blocks the entries point at to headings.
fn map_entries(pages: &mut [PageLayout], entries: &[TocEntry], contents_pages: &HashSet<u32>) {
    let offset = page_offset(pages, entries, contents_pages);
    if offset != 0 {
        log::debug!("contents page numbers are offset by {}", offset);
    }

    let mut mapped = 0;
    for entry in entries {
        let target = entry.page as i64 + offset;
        let Some(page) = pages
            .iter_mut()
            .find(|p| p.number as i64 == target && !contents_pages.contains(&p.number))
        else {
            continue;
        };
        let title_norm = normalize_for_match(&entry.title);
        let index = match find_title(page, &title_norm) {
            Some(TitleMatch::Block(index)) => index,
            Some(TitleMatch::Pair(index)) => {
                // Second half of a wrapped title joins the first
                if let PageItem::Text(tail) = page.items.remove(index + 1) {
                    if let Some(PageItem::Text(head)) = page.items.get_mut(index) {
                        head.lines.extend(tail.lines);
                    }
                }
                index
            }
            None => continue,
        };
        if let Some(PageItem::Text(block)) = page.items.get_mut(index) {
            promote(block, entry.heading_level());
            mapped += 1;
        }
    }
    log::debug!("{} of {} contents entries matched a heading", mapped, entries.len());
}

fn promote(block: &mut TextBlock, level: u8) {
    block.kind = BlockKind::Heading(level);
    for line in &mut block.lines {
        line.role = SpanRole::Heading(level);
    }
}

fn rewrite_block(block: TextBlock, levels: &[f32], entries: &mut Vec<TocEntry>) -> Vec<TextBlock> {
    let TextBlock {
        lines, column, page, ..
    } = block;

    let mut blocks = Vec::new();
    for (is_entry, run) in split_lines(lines, |l| is_toc_entry(&l.text())) {
        if !is_entry {
            blocks.push(make_block(run, column, page));
            continue;
        }
        for mut line in run {
            let depth = nearest_level(levels, line.x0());
            let info = match &line.role {
                SpanRole::ListItem(info) => info.clone().at_level(depth),
                _ => ListInfo::bullet(depth),
            };
            let printed = printed_page(&line.text());
            strip_leader(&mut line);
            if let Some(number) = printed {
                entries.push(TocEntry {
                    title: line.text().trim().to_string(),
                    page: number,
                    depth,
                });
            }
            line.role = SpanRole::ListItem(info.clone());
            blocks.push(TextBlock::new(BlockKind::ListItem(info), vec![line], column, page));
        }
    }
    blocks
}

/// The page number an entry line ends in.
fn printed_page(text: &str) -> Option<u32> {
    let trimmed = text.trim_end();
    let digits = trimmed.len() - trimmed.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    trimmed[trimmed.len() - digits..].parse().ok()
}

/// Hide the leader and the page number of an entry line.
fn strip_leader(line: &mut TextLine) {
    let mut past_leader = false;
    for placed in &mut line.spans {
        if past_leader {
            placed.display_text = Some(String::new());
            continue;
        }
        if let Some(m) = LEADER_RE.find(placed.text()) {
            let kept = placed.text()[..m.start()].trim_end().to_string();
            placed.display_text = Some(kept);
            past_leader = true;
        }
    }

    // Leader split into single-dot spans: blank the trailing dots and number
    if !past_leader {
        for placed in line.spans.iter_mut().rev() {
            let text = placed.text();
            if text.chars().all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '.' || c == '…') {
                placed.display_text = Some(String::new());
            } else {
                let kept = text.trim_end_matches(|c: char| c.is_ascii_digit() || c.is_whitespace() || c == '.' || c == '…');
                placed.display_text = Some(kept.to_string());
                break;
            }
        }
    }
}

/// Distinct entry indentations, ascending, clustered within the tolerance.
fn indent_levels(xs: &[f32]) -> Vec<f32> {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut levels: Vec<f32> = Vec::new();
    for x in sorted {
        match levels.last() {
            Some(&last) if x - last <= INDENT_TOLERANCE => {}
            _ => levels.push(x),
        }
    }
    levels
}

fn nearest_level(levels: &[f32], x: f32) -> u8 {
    levels
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (x - **a)
                .abs()
                .partial_cmp(&(x - **b).abs())
                .unwrap_or(Ordering::Equal)
        })
        .map(|(i, _)| i.min(u8::MAX as usize) as u8)
        .unwrap_or(0)
}
