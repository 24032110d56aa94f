//! Markdown rendering for reconstructed documents.

use std::collections::HashSet;

use crate::error::Result;
use crate::model::{
    Block, Document, FootnoteDefinition, InlineContent, ListInfo, ListStyle, NumberStyle, Page, Paragraph,
    ParagraphRole, TableGrid, TextRun,
};

use super::{ExtractionStats, RenderOptions, RenderResult};

/// Convert a document to Markdown.
pub fn to_markdown(doc: &Document, options: &RenderOptions) -> Result<String> {
    let renderer = MarkdownRenderer::new(options.clone());
    renderer.render(doc)
}

/// Convert a document to Markdown with statistics.
pub fn to_markdown_with_stats(doc: &Document, options: &RenderOptions) -> Result<RenderResult> {
    let renderer = MarkdownRenderer::new(options.clone());
    renderer.render_with_stats(doc)
}

/// Convert a document to one Markdown string per page.
pub fn to_markdown_pages(doc: &Document, options: &RenderOptions) -> Result<Vec<String>> {
    let renderer = MarkdownRenderer::new(options.clone());
    renderer.render_pages(doc)
}

/// One rendered block. List items are separated by a single newline,
/// everything else by a blank line.
struct Chunk {
    text: String,
    list_item: bool,
}

impl Chunk {
    fn block(text: String) -> Self {
        Self { text, list_item: false }
    }

    fn list(text: String) -> Self {
        Self { text, list_item: true }
    }
}

/// Markdown renderer.
pub struct MarkdownRenderer {
    options: RenderOptions,
    stats: ExtractionStats,
    /// Source depths of the currently open list levels
    list_stack: Vec<u8>,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            stats: ExtractionStats::new(),
            list_stack: Vec::new(),
        }
    }

    /// Render a document to Markdown.
    pub fn render(mut self, doc: &Document) -> Result<String> {
        self.render_internal(doc)
    }

    /// Render a document to Markdown with extraction statistics.
    pub fn render_with_stats(mut self, doc: &Document) -> Result<RenderResult> {
        self.options.collect_stats = true;
        let content = self.render_internal(doc)?;

        self.stats.footnote_count = doc.footnotes.len() as u32;
        self.stats.count_text(&content);

        Ok(RenderResult::new(content, doc.metadata.clone(), self.stats))
    }

    /// Render every page on its own; each page carries the definitions of
    /// the footnotes it references.
    pub fn render_pages(mut self, doc: &Document) -> Result<Vec<String>> {
        let mut pages = Vec::with_capacity(doc.pages.len());
        for page in &doc.pages {
            self.list_stack.clear();
            let chunks = self.page_chunks(page);
            let mut output = join_chunks(&chunks);

            let labels = referenced_labels(page);
            let notes: Vec<&FootnoteDefinition> = doc
                .footnotes
                .iter()
                .filter(|def| labels.contains(def.label.as_str()))
                .collect();
            if !notes.is_empty() {
                if !output.is_empty() {
                    output.push_str("\n\n");
                }
                output.push_str(&self.footnote_section(&notes));
            }
            pages.push(output);
        }
        Ok(pages)
    }

    fn render_internal(&mut self, doc: &Document) -> Result<String> {
        let mut output = String::new();

        if self.options.include_frontmatter {
            output.push_str(&doc.metadata.to_yaml_frontmatter());
            output.push('\n');
        }

        let mut body = String::new();
        let mut prev_list = false;
        for page in &doc.pages {
            if self.options.page_breaks {
                self.list_stack.clear();
            }
            let chunks = self.page_chunks(page);
            let (Some(first), Some(last)) = (chunks.first(), chunks.last()) else {
                continue;
            };

            if !body.is_empty() {
                if self.options.page_breaks {
                    body.push_str("\n\n---\n\n");
                } else if prev_list && first.list_item {
                    body.push('\n');
                } else {
                    body.push_str("\n\n");
                }
            }
            prev_list = last.list_item;
            body.push_str(&join_chunks(&chunks));
        }
        output.push_str(&body);

        if !doc.footnotes.is_empty() {
            let notes: Vec<&FootnoteDefinition> = doc.footnotes.iter().collect();
            output.push_str("\n\n");
            output.push_str(&self.footnote_section(&notes));
        }

        Ok(output.trim().to_string())
    }

    fn page_chunks(&mut self, page: &Page) -> Vec<Chunk> {
        if self.options.collect_stats {
            self.stats.add_page();
        }

        let mut chunks = Vec::with_capacity(page.elements.len());
        for block in &page.elements {
            match block {
                Block::Paragraph(p) => {
                    if let Some(chunk) = self.render_paragraph(p) {
                        chunks.push(chunk);
                    }
                }
                Block::Table(grid) => {
                    self.list_stack.clear();
                    if let Some(table) = self.render_table(grid) {
                        if self.options.collect_stats {
                            self.stats.add_table();
                        }
                        chunks.push(Chunk::block(table));
                    }
                }
                Block::Code { text } => {
                    self.list_stack.clear();
                    if self.options.collect_stats {
                        self.stats.add_code_block();
                    }
                    chunks.push(Chunk::block(fence(text)));
                }
            }
        }
        chunks
    }

    fn render_paragraph(&mut self, para: &Paragraph) -> Option<Chunk> {
        if para.is_empty() {
            return None;
        }

        match &para.role {
            ParagraphRole::Heading(level) => {
                self.list_stack.clear();
                if self.options.collect_stats {
                    self.stats.add_heading();
                }
                let level = (*level).clamp(1, self.options.max_heading_level.max(1));
                let prefix = "#".repeat(level as usize);
                Some(Chunk::block(format!("{} {}", prefix, self.render_inline(&para.content))))
            }
            ParagraphRole::ListItem(info) => {
                if self.options.collect_stats {
                    self.stats.add_list_item();
                }
                Some(Chunk::list(self.render_list_item(para, info)))
            }
            ParagraphRole::Caption => {
                self.list_stack.clear();
                if self.options.collect_stats {
                    self.stats.add_paragraph();
                }
                let text = self.escape(para.plain_text().trim());
                Some(Chunk::block(format!("*{}*", text)))
            }
            ParagraphRole::Body => {
                self.list_stack.clear();
                if self.options.collect_stats {
                    self.stats.add_paragraph();
                }
                let text = self.render_inline(&para.content);
                let text = if self.options.escape_special_chars {
                    escape_line_start(&text)
                } else {
                    text
                };
                Some(Chunk::block(text))
            }
        }
    }

    fn render_list_item(&mut self, para: &Paragraph, info: &ListInfo) -> String {
        let nesting = self.nesting(info.level);
        let indent = " ".repeat(nesting * self.options.list_indent);
        format!("{}{} {}", indent, list_marker(info), self.render_inline(&para.content))
    }

    /// Map a source depth onto the open list levels. Nesting grows by at
    /// most one level per item however far the source depth jumps.
    fn nesting(&mut self, depth: u8) -> usize {
        while matches!(self.list_stack.last(), Some(&top) if top > depth) {
            self.list_stack.pop();
        }
        if self.list_stack.last() != Some(&depth) {
            self.list_stack.push(depth);
        }
        self.list_stack.len() - 1
    }

    fn render_inline(&self, content: &[InlineContent]) -> String {
        let mut output = String::new();
        let mut pending: Option<TextRun> = None;

        for item in content {
            match item {
                InlineContent::Text(run) => match pending.as_mut() {
                    Some(open) if open.style == run.style => open.text.push_str(&run.text),
                    _ => {
                        self.flush_run(&mut output, &mut pending);
                        pending = Some(run.clone());
                    }
                },
                InlineContent::Link { text, url } => {
                    self.flush_run(&mut output, &mut pending);
                    output.push_str(&format!("[{}]({})", self.escape(text), url));
                }
                InlineContent::FootnoteRef { label } => {
                    self.flush_run(&mut output, &mut pending);
                    output.push_str(&format!("[^{}]", label));
                }
            }
        }
        self.flush_run(&mut output, &mut pending);

        output
    }

    fn flush_run(&self, output: &mut String, pending: &mut Option<TextRun>) {
        if let Some(run) = pending.take() {
            self.render_text_run(output, &run);
        }
    }

    fn render_text_run(&self, output: &mut String, run: &TextRun) {
        let text = self.escape(&run.text);

        let marker = match (run.style.bold, run.style.italic) {
            (true, true) => "***",
            (true, false) => "**",
            (false, true) => "*",
            (false, false) => {
                output.push_str(&text);
                return;
            }
        };

        // Emphasis markers must hug the text.
        let core = text.trim();
        if core.is_empty() {
            output.push_str(&text);
            return;
        }
        let lead = &text[..text.len() - text.trim_start().len()];
        let trail = &text[text.trim_end().len()..];

        output.push_str(lead);
        output.push_str(marker);
        output.push_str(core);
        output.push_str(marker);
        output.push_str(trail);
    }

    fn render_table(&self, table: &TableGrid) -> Option<String> {
        if table.is_empty() {
            return None;
        }

        let col_count = table.column_count();
        let mut lines = Vec::with_capacity(table.row_count() + 1);
        for (i, row) in table.rows.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|cell| self.table_cell(cell)).collect();
            lines.push(format!("| {} |", cells.join(" | ")));

            // Row 0 is always the header row
            if i == 0 {
                lines.push(format!("|{}", " --- |".repeat(col_count)));
            }
        }

        Some(lines.join("\n"))
    }

    fn table_cell(&self, cell: &str) -> String {
        let cell = cell.replace('\n', " ");
        if self.options.escape_special_chars {
            escape_markdown(cell.trim())
        } else {
            cell.trim().replace('|', "\\|")
        }
    }

    fn footnote_section(&self, notes: &[&FootnoteDefinition]) -> String {
        notes
            .iter()
            .map(|def| format!("[^{}]: {}", def.label, self.escape(def.text.trim())))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn escape(&self, text: &str) -> String {
        if self.options.escape_special_chars {
            escape_markdown(text)
        } else {
            text.to_string()
        }
    }
}

fn join_chunks(chunks: &[Chunk]) -> String {
    let mut output = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            if chunk.list_item && chunks[i - 1].list_item {
                output.push('\n');
            } else {
                output.push_str("\n\n");
            }
        }
        output.push_str(&chunk.text);
    }
    output
}

fn referenced_labels(page: &Page) -> HashSet<&str> {
    page.elements
        .iter()
        .filter_map(Block::as_paragraph)
        .flat_map(|p| p.content.iter())
        .filter_map(|item| match item {
            InlineContent::FootnoteRef { label } => Some(label.as_str()),
            _ => None,
        })
        .collect()
}

fn list_marker(info: &ListInfo) -> String {
    match &info.style {
        ListStyle::Unordered { .. } => "-".to_string(),
        ListStyle::Ordered { number_style, .. } => {
            let num = info.item_number.unwrap_or(1).max(1);
            match number_style {
                NumberStyle::Decimal => format!("{}.", num),
                NumberStyle::LowerAlpha => format!("{}.", to_alpha(num).to_lowercase()),
                NumberStyle::UpperAlpha => format!("{}.", to_alpha(num)),
                NumberStyle::LowerRoman => format!("{}.", to_roman(num).to_lowercase()),
                NumberStyle::UpperRoman => format!("{}.", to_roman(num)),
            }
        }
    }
}

fn fence(text: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    let fence = "`".repeat((longest + 1).max(3));
    format!("{}\n{}\n{}", fence, text.trim_end_matches('\n'), fence)
}

/// Escape special Markdown characters.
/// Only characters that could be misinterpreted inside running text are escaped.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

/// Escape a body paragraph whose first characters would read as block syntax.
fn escape_line_start(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some('#' | '>') => format!("\\{}", text),
        Some(c @ ('-' | '+' | '=')) => {
            let rest = chars.as_str();
            if rest.starts_with(' ') || rest.chars().all(|r| r == c) {
                format!("\\{}", text)
            } else {
                text.to_string()
            }
        }
        Some(c) if c.is_ascii_digit() => {
            let digits = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
            let rest = &text[digits..];
            if rest.starts_with(". ") || rest.starts_with(") ") {
                format!("{}\\{}", &text[..digits], rest)
            } else {
                text.to_string()
            }
        }
        _ => text.to_string(),
    }
}

/// Convert number to letters: 1 → A, 26 → Z, 27 → AA.
fn to_alpha(mut num: u32) -> String {
    let mut letters = Vec::new();
    while num > 0 {
        let rem = ((num - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        num = (num - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert number to Roman numerals.
fn to_roman(mut num: u32) -> String {
    let numerals = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut result = String::new();
    for (value, symbol) in numerals {
        while num >= value {
            result.push_str(symbol);
            num -= value;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextStyle;

    fn single_page(blocks: Vec<Block>) -> Document {
        let mut doc = Document::new();
        let mut page = Page::letter(1);
        for block in blocks {
            page.add_block(block);
        }
        doc.add_page(page);
        doc
    }

    fn item(text: &str, info: ListInfo) -> Block {
        Block::Paragraph(Paragraph::list_item(text, info))
    }

    fn render(doc: &Document) -> String {
        to_markdown(doc, &RenderOptions::default()).unwrap()
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Hello *world*"), "Hello \\*world\\*");
        assert_eq!(escape_markdown("[link]"), "\\[link\\]");
        assert_eq!(escape_markdown("a|b"), "a\\|b");
    }

    #[test]
    fn test_escape_line_start() {
        assert_eq!(escape_line_start("# not a heading"), "\\# not a heading");
        assert_eq!(escape_line_start("1. not a list"), "1\\. not a list");
        assert_eq!(escape_line_start("---"), "\\---");
        assert_eq!(escape_line_start("-5 degrees"), "-5 degrees");
        assert_eq!(escape_line_start("2024 was a year"), "2024 was a year");
    }

    #[test]
    fn test_to_roman() {
        assert_eq!(to_roman(1), "I");
        assert_eq!(to_roman(4), "IV");
        assert_eq!(to_roman(14), "XIV");
        assert_eq!(to_roman(2024), "MMXXIV");
    }

    #[test]
    fn test_to_alpha() {
        assert_eq!(to_alpha(1), "A");
        assert_eq!(to_alpha(26), "Z");
        assert_eq!(to_alpha(27), "AA");
    }

    #[test]
    fn test_render_heading_and_paragraph() {
        let doc = single_page(vec![
            Block::Paragraph(Paragraph::heading("Chapter 1", 2)),
            Block::Paragraph(Paragraph::with_text("Hello, world!")),
        ]);
        assert_eq!(render(&doc), "## Chapter 1\n\nHello, world!");
    }

    #[test]
    fn test_max_heading_level() {
        let doc = single_page(vec![Block::Paragraph(Paragraph::heading("Deep", 5))]);
        let options = RenderOptions::new().with_max_heading(3);
        assert_eq!(to_markdown(&doc, &options).unwrap(), "### Deep");
    }

    #[test]
    fn test_nested_list_depth_never_jumps() {
        let doc = single_page(vec![
            item("a", ListInfo::bullet(0)),
            item("b", ListInfo::bullet(2)),
            item("c", ListInfo::bullet(2)),
            item("d", ListInfo::bullet(0)),
        ]);
        assert_eq!(render(&doc), "- a\n  - b\n  - c\n- d");
    }

    #[test]
    fn test_ordered_markers_keep_style() {
        let doc = single_page(vec![
            item("first", ListInfo::numbered(0, 1)),
            item("sub", ListInfo::ordered(1, 2, NumberStyle::LowerAlpha)),
            item("roman", ListInfo::ordered(2, 3, NumberStyle::LowerRoman)),
            item("upper", ListInfo::ordered(0, 2, NumberStyle::UpperAlpha)),
        ]);
        assert_eq!(render(&doc), "1. first\n  b. sub\n    iii. roman\nB. upper");
    }

    #[test]
    fn test_list_indent_option() {
        let doc = single_page(vec![item("a", ListInfo::bullet(0)), item("b", ListInfo::bullet(1))]);
        let options = RenderOptions::new().with_list_indent(4);
        assert_eq!(to_markdown(&doc, &options).unwrap(), "- a\n    - b");
    }

    #[test]
    fn test_paragraph_ends_list() {
        let doc = single_page(vec![
            item("a", ListInfo::bullet(0)),
            Block::Paragraph(Paragraph::with_text("after")),
            item("b", ListInfo::bullet(1)),
        ]);
        assert_eq!(render(&doc), "- a\n\nafter\n\n- b");
    }

    #[test]
    fn test_table_rendering() {
        let grid = TableGrid::from_rows(vec![
            vec!["Name".into(), "Value".into(), "Note".into()],
            vec!["a".into(), "1|2".into(), "".into()],
        ]);
        let doc = single_page(vec![Block::Table(grid)]);
        assert_eq!(
            render(&doc),
            "| Name | Value | Note |\n| --- | --- | --- |\n| a | 1\\|2 |  |"
        );
    }

    #[test]
    fn test_inline_styles() {
        let mut p = Paragraph::new();
        p.add_run(TextRun::bold("bold "));
        p.add_text("plain ");
        p.add_run(TextRun::italic("slanted"));
        p.add_run(TextRun::styled(
            " both",
            TextStyle {
                bold: true,
                italic: true,
                superscript: false,
            },
        ));
        let doc = single_page(vec![Block::Paragraph(p)]);
        assert_eq!(render(&doc), "**bold** plain *slanted* ***both***");
    }

    #[test]
    fn test_adjacent_runs_merge_when_rendered() {
        let p = Paragraph {
            content: vec![
                InlineContent::Text(TextRun::bold("one ")),
                InlineContent::Text(TextRun::bold("two")),
            ],
            role: ParagraphRole::Body,
        };
        let doc = single_page(vec![Block::Paragraph(p)]);
        assert_eq!(render(&doc), "**one two**");
    }

    #[test]
    fn test_links_and_footnotes() {
        let mut p = Paragraph::with_text("See ");
        p.add_link("example.com", "https://example.com");
        p.add_text(" here");
        p.add_footnote_ref("1");
        let mut doc = single_page(vec![Block::Paragraph(p)]);
        doc.footnotes.push(FootnoteDefinition::new(1, 1, "1", "Some note."));

        assert_eq!(
            render(&doc),
            "See [example.com](https://example.com) here[^1]\n\n[^1]: Some note."
        );
    }

    #[test]
    fn test_caption_and_code() {
        let doc = single_page(vec![
            Block::Paragraph(Paragraph::caption("Table 1: Results")),
            Block::Code {
                text: "let x = `a`;".into(),
            },
        ]);
        assert_eq!(render(&doc), "*Table 1: Results*\n\n```\nlet x = `a`;\n```");
    }

    #[test]
    fn test_fence_grows_past_backticks() {
        assert_eq!(fence("```"), "````\n```\n````");
    }

    #[test]
    fn test_page_breaks_skip_empty_pages() {
        let mut doc = Document::new();
        for (number, text) in [(1, Some("A")), (2, None), (3, Some("C"))] {
            let mut page = Page::letter(number);
            if let Some(text) = text {
                page.add_paragraph(Paragraph::with_text(text));
            }
            doc.add_page(page);
        }

        let options = RenderOptions::new().with_page_breaks(true);
        assert_eq!(to_markdown(&doc, &options).unwrap(), "A\n\n---\n\nC");
        assert_eq!(render(&doc), "A\n\nC");
    }

    #[test]
    fn test_list_continues_across_pages() {
        let mut doc = Document::new();
        let mut first = Page::letter(1);
        first.add_paragraph(Paragraph::list_item("a", ListInfo::bullet(0)));
        let mut second = Page::letter(2);
        second.add_paragraph(Paragraph::list_item("b", ListInfo::bullet(1)));
        doc.add_page(first);
        doc.add_page(second);

        assert_eq!(render(&doc), "- a\n  - b");
    }

    #[test]
    fn test_render_pages_carry_their_footnotes() {
        let mut doc = Document::new();
        let mut first = Page::letter(1);
        let mut p = Paragraph::with_text("Noted");
        p.add_footnote_ref("1");
        first.add_paragraph(p);
        let mut second = Page::letter(2);
        second.add_paragraph(Paragraph::with_text("Plain"));
        doc.add_page(first);
        doc.add_page(second);
        doc.footnotes.push(FootnoteDefinition::new(1, 1, "1", "Note."));

        let pages = to_markdown_pages(&doc, &RenderOptions::default()).unwrap();
        assert_eq!(pages, vec!["Noted[^1]\n\n[^1]: Note.".to_string(), "Plain".to_string()]);
    }

    #[test]
    fn test_render_with_frontmatter() {
        let mut doc = single_page(vec![Block::Paragraph(Paragraph::with_text("Body"))]);
        doc.metadata.title = Some("Test Doc".to_string());

        let options = RenderOptions::new().with_frontmatter(true);
        let result = to_markdown(&doc, &options).unwrap();
        assert!(result.starts_with("---\ntitle: \"Test Doc\""));
        assert!(result.ends_with("---\n\nBody"));
    }

    #[test]
    fn test_stats() {
        let doc = single_page(vec![
            Block::Paragraph(Paragraph::heading("Title", 1)),
            Block::Paragraph(Paragraph::with_text("one two three")),
            item("x", ListInfo::bullet(0)),
            Block::Table(TableGrid::from_rows(vec![vec!["a".into(), "b".into()]])),
        ]);
        let result = to_markdown_with_stats(&doc, &RenderOptions::default()).unwrap();
        assert_eq!(result.stats.page_count, 1);
        assert_eq!(result.stats.heading_count, 1);
        assert_eq!(result.stats.paragraph_count, 1);
        assert_eq!(result.stats.list_item_count, 1);
        assert_eq!(result.stats.table_count, 1);
        assert!(result.stats.word_count > 0);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let doc = single_page(vec![
            Block::Paragraph(Paragraph::heading("Title", 1)),
            item("a", ListInfo::bullet(0)),
        ]);
        assert_eq!(render(&doc), render(&doc));
    }
}
