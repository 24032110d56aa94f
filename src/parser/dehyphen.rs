//! Line joining and de-hyphenation.
//!
//! Lines of a block are joined with single spaces. A line ending in a
//! hyphen joins without a separator, and the hyphen itself is dropped when
//! the word clearly continues ("exam-" + "ple" is "example", "co-" +
//! "Operate" stays "co-Operate"). Paragraphs cut by a page break are merged
//! before the blocks are turned into document paragraphs.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Block, InlineContent, Page, Paragraph, ParagraphRole, TextRun, TextStyle};

use super::classifier::{split_list_marker, SpanRole};
use super::layout::{needs_space, BlockKind, PageItem, PageLayout, PlacedSpan, TextBlock, TextLine};

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"(?:https?://|www\.)[^\s<>\[\]()]+").unwrap();
}

const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', ':', ';', '"', '”', '…'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    Space,
    Concat,
    DropHyphen,
}

/// Check if a line ends with a hyphen that splits a word.
///
/// A letter has to precede the hyphen, so "- item" and "2-" do not count.
pub fn is_continuation_hyphen(text: &str) -> bool {
    let Some(before) = text.trim_end().strip_suffix('-') else {
        return false;
    };
    before.chars().last().is_some_and(|c| c.is_alphabetic())
}

fn join_kind(prev: &str, next: &str) -> Join {
    let prev = prev.trim_end();
    let Some(before) = prev.strip_suffix('-') else {
        return Join::Space;
    };
    // A free-standing dash is punctuation, not a break
    if before.is_empty() || before.ends_with(char::is_whitespace) {
        return Join::Space;
    }
    let next_lower = next.trim_start().chars().next().is_some_and(|c| c.is_lowercase());
    if is_continuation_hyphen(prev) && next_lower {
        Join::DropHyphen
    } else {
        Join::Concat
    }
}

/// Append `next` to `acc` the way consecutive lines are joined.
pub fn join_fragments(acc: &mut String, next: &str) {
    let next = next.trim();
    if next.is_empty() {
        return;
    }
    acc.truncate(acc.trim_end().len());
    if acc.is_empty() {
        acc.push_str(next);
        return;
    }
    match join_kind(acc, next) {
        Join::Space => acc.push(' '),
        Join::Concat => {}
        Join::DropHyphen => {
            acc.pop();
        }
    }
    acc.push_str(next);
}

/// Whether a paragraph ending in `prev` continues with one starting with `next`.
pub fn continues_paragraph(prev: &str, next: &str) -> bool {
    let prev = prev.trim_end();
    let open = !prev.is_empty() && !prev.ends_with(TERMINAL_PUNCTUATION);
    let lower = next.trim_start().chars().next().is_some_and(|c| c.is_lowercase());
    open && lower
}

/// Merge paragraphs split by page breaks into the block on the earlier page.
///
/// A page emptied by a merge passes the open paragraph on, so a paragraph
/// spanning three or more pages ends up in a single block.
pub fn merge_across_pages(mut pages: Vec<PageLayout>) -> Vec<PageLayout> {
    // Last page that still holds content
    let mut open: Option<usize> = None;
    for i in 0..pages.len() {
        if let Some(target_index) = open {
            let (head, tail) = pages.split_at_mut(i);
            let (prev, next) = (&mut head[target_index], &mut tail[0]);

            let mergeable = match (prev.items.last(), next.items.first()) {
                (Some(PageItem::Text(a)), Some(PageItem::Text(b))) => {
                    a.kind == BlockKind::Paragraph
                        && b.kind == BlockKind::Paragraph
                        && continues_paragraph(&a.text(), &b.text())
                }
                _ => false,
            };
            if mergeable {
                if let (PageItem::Text(moved), Some(PageItem::Text(target))) =
                    (next.items.remove(0), prev.items.last_mut())
                {
                    log::debug!("merging paragraph continued from page {} into page {}", next.number, prev.number);
                    target.lines.extend(moved.lines);
                }
            }
        }
        if !pages[i].items.is_empty() {
            open = Some(i);
        }
    }
    pages
}

/// A piece of inline content before runs are merged.
#[derive(Debug, Clone)]
enum Piece {
    Text(TextRun),
    Space,
    Note(String),
}

/// Turns laid-out blocks into document paragraphs, tables and code blocks.
#[derive(Debug, Clone)]
pub struct LineJoiner {
    /// Turn URLs into links
    pub link_urls: bool,
    /// Keep monospace blocks as code
    pub detect_code: bool,
}

impl Default for LineJoiner {
    fn default() -> Self {
        Self {
            link_urls: true,
            detect_code: true,
        }
    }
}

impl LineJoiner {
    /// Convert one page layout into a document page.
    pub fn join_page(&self, layout: PageLayout) -> Page {
        let mut page = Page::new(layout.number, layout.width, layout.height);
        for item in layout.items {
            match item {
                PageItem::Table { grid, .. } => page.add_table(grid),
                PageItem::Text(block) => {
                    if let Some(block) = self.join_block(&block) {
                        page.add_block(block);
                    }
                }
            }
        }
        page
    }

    /// Convert one text block, or `None` when nothing visible remains.
    pub fn join_block(&self, block: &TextBlock) -> Option<Block> {
        if block.kind == BlockKind::Code && self.detect_code {
            let text = code_text(&block.lines);
            return (!text.trim().is_empty()).then_some(Block::Code { text });
        }

        let (role, plain) = match &block.kind {
            BlockKind::Heading(level) => (ParagraphRole::Heading(*level), true),
            BlockKind::ListItem(info) => (ParagraphRole::ListItem(info.clone()), false),
            BlockKind::Caption => (ParagraphRole::Caption, false),
            BlockKind::Paragraph | BlockKind::Code => (ParagraphRole::Body, false),
        };

        let strip_marker = matches!(block.kind, BlockKind::ListItem(_))
            && block.lines.first().is_some_and(|l| l.role.is_list_item());

        let mut pieces: Vec<Piece> = Vec::new();
        for (i, line) in block.lines.iter().enumerate() {
            let line_pieces = line_pieces(line, plain, strip_marker && i == 0);
            let Some(first_text) = line_pieces.iter().find_map(|p| match p {
                Piece::Text(run) => Some(run.text.clone()),
                _ => None,
            }) else {
                pieces.extend(line_pieces);
                continue;
            };

            let has_pieces = !pieces.is_empty();
            let join = last_text_mut(&mut pieces).map(|last| join_kind(&last.text, &first_text));
            match join {
                Some(Join::Space) => pieces.push(Piece::Space),
                None if has_pieces => pieces.push(Piece::Space),
                None => {}
                Some(kind) => {
                    if let Some(last) = last_text_mut(&mut pieces) {
                        last.text.truncate(last.text.trim_end().len());
                        if kind == Join::DropHyphen {
                            last.text.pop();
                        }
                    }
                }
            }
            pieces.extend(line_pieces);
        }

        let mut paragraph = Paragraph::new();
        paragraph.role = role;
        for (i, piece) in pieces.iter().enumerate() {
            match piece {
                Piece::Text(run) => paragraph.add_run(run.clone()),
                Piece::Note(label) => paragraph.add_footnote_ref(label.clone()),
                Piece::Space => {
                    let style = match (style_before(&pieces, i), style_after(&pieces, i)) {
                        (Some(a), Some(b)) if a == b => a,
                        _ => TextStyle::default(),
                    };
                    paragraph.add_run(TextRun::styled(" ", style));
                }
            }
        }

        trim_edges(&mut paragraph);
        if self.link_urls {
            paragraph.content = link_urls(paragraph.content);
        }

        (!paragraph.is_empty()).then_some(Block::Paragraph(paragraph))
    }
}

fn line_pieces(line: &TextLine, plain: bool, strip_marker: bool) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut prev: Option<&PlacedSpan> = None;
    let mut marker_pending = strip_marker && matches!(line.role, SpanRole::ListItem(_));

    for placed in &line.spans {
        let mut text = placed.text();
        if marker_pending && !text.trim().is_empty() {
            marker_pending = false;
            if let Some((_, rest)) = split_list_marker(text) {
                text = rest;
            }
        }
        if text.is_empty() {
            continue;
        }

        if let Some(p) = prev {
            if needs_space(p, placed) {
                pieces.push(Piece::Space);
            }
        }

        match &placed.footnote {
            Some(label) => pieces.push(Piece::Note(label.clone())),
            None => {
                let style = if plain {
                    TextStyle::default()
                } else {
                    TextStyle {
                        bold: placed.span.is_bold(),
                        italic: placed.span.is_italic(),
                        superscript: placed.span.flags.superscript,
                    }
                };
                pieces.push(Piece::Text(TextRun::styled(text, style)));
            }
        }
        prev = Some(placed);
    }
    pieces
}

fn last_text_mut(pieces: &mut [Piece]) -> Option<&mut TextRun> {
    match pieces.last_mut() {
        Some(Piece::Text(run)) => Some(run),
        _ => None,
    }
}

fn style_before(pieces: &[Piece], i: usize) -> Option<TextStyle> {
    pieces[..i].iter().rev().find_map(|p| match p {
        Piece::Text(run) => Some(run.style),
        Piece::Note(_) => Some(TextStyle::default()),
        Piece::Space => None,
    })
}

fn style_after(pieces: &[Piece], i: usize) -> Option<TextStyle> {
    pieces[i + 1..].iter().find_map(|p| match p {
        Piece::Text(run) => Some(run.style),
        Piece::Note(_) => Some(TextStyle::default()),
        Piece::Space => None,
    })
}

/// Drop leading and trailing whitespace of the paragraph.
fn trim_edges(paragraph: &mut Paragraph) {
    if let Some(InlineContent::Text(run)) = paragraph.content.first_mut() {
        run.text = run.text.trim_start().to_string();
    }
    if let Some(InlineContent::Text(run)) = paragraph.content.last_mut() {
        run.text = run.text.trim_end().to_string();
    }
    paragraph
        .content
        .retain(|c| !matches!(c, InlineContent::Text(run) if run.text.is_empty()));
}

/// Split text runs around URLs into link items.
fn link_urls(content: Vec<InlineContent>) -> Vec<InlineContent> {
    let mut result = Vec::with_capacity(content.len());
    for item in content {
        let InlineContent::Text(run) = item else {
            result.push(item);
            continue;
        };

        let mut last = 0;
        for m in URL_RE.find_iter(&run.text) {
            let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
            if url.len() <= "www.".len() {
                continue;
            }
            let end = m.start() + url.len();
            if m.start() > last {
                result.push(InlineContent::Text(TextRun::styled(&run.text[last..m.start()], run.style)));
            }
            let href = if url.starts_with("www.") {
                format!("https://{}", url)
            } else {
                url.to_string()
            };
            result.push(InlineContent::Link {
                text: url.to_string(),
                url: href,
            });
            last = end;
        }

        if last == 0 {
            result.push(InlineContent::Text(run));
        } else if last < run.text.len() {
            result.push(InlineContent::Text(TextRun::styled(&run.text[last..], run.style)));
        }
    }
    result
}

/// Code lines joined by newlines, indented by their offset from the leftmost line.
fn code_text(lines: &[TextLine]) -> String {
    let min_x = lines.iter().map(TextLine::x0).fold(f32::INFINITY, f32::min);
    lines
        .iter()
        .map(|line| {
            let char_width = (line.font_size * 0.6).max(1.0);
            let indent = ((line.x0() - min_x) / char_width).round().max(0.0) as usize;
            format!("{}{}", " ".repeat(indent), line.text().trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
