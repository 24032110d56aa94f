//! End-to-end reconstruction tests over synthetic span dumps.

use unspan::parser::join_fragments;
use unspan::{
    convert, convert_with_report, BBox, ConvertOptions, DocumentInput, FootnoteScope, PageInput, ParseOptions,
    Span, Warning,
};

fn make_span(text: &str, x: f32, y: f32, size: f32) -> Span {
    let width = text.chars().count() as f32 * size * 0.5;
    Span::new(text, BBox::new(x, y, x + width, y + size), 1, "Helvetica", size)
}

fn document(pages: Vec<Vec<Span>>) -> DocumentInput {
    let mut input = DocumentInput::new();
    for (i, spans) in pages.into_iter().enumerate() {
        let mut page = PageInput::letter(i as u32 + 1);
        for span in spans {
            page.push_span(span);
        }
        input.add_page(page);
    }
    input
}

fn heading_lines(markdown: &str) -> Vec<&str> {
    markdown.lines().filter(|l| l.starts_with('#')).collect()
}

#[test]
fn test_heading_levels_follow_size_rank() {
    let input = document(vec![vec![
        make_span("Annual Report", 72.0, 60.0, 24.0),
        make_span("This opening paragraph is long enough to set the body size.", 72.0, 100.0, 10.0),
        make_span("Background", 72.0, 140.0, 18.0),
        make_span("The second paragraph describes where the company came from.", 72.0, 170.0, 10.0),
        make_span("Early Years", 72.0, 210.0, 14.0),
        make_span("The third paragraph covers the first decade of operations.", 72.0, 240.0, 10.0),
    ]]);

    let markdown = convert(&input, &ConvertOptions::default()).unwrap();
    assert_eq!(
        heading_lines(&markdown),
        vec!["# Annual Report", "## Background", "### Early Years"]
    );
    assert!(markdown.contains("\n\nThe third paragraph covers the first decade of operations."));
}

#[test]
fn test_larger_size_never_gets_deeper_level() {
    // Sizes appear out of order on the page
    let input = document(vec![vec![
        make_span("Minor Note", 72.0, 60.0, 12.0),
        make_span("Body text that clearly dominates the character count here.", 72.0, 90.0, 10.0),
        make_span("Major Part", 72.0, 130.0, 20.0),
        make_span("More body text that also dominates the character count.", 72.0, 160.0, 10.0),
    ]]);

    let markdown = convert(&input, &ConvertOptions::default()).unwrap();
    assert_eq!(heading_lines(&markdown), vec!["## Minor Note", "# Major Part"]);
}

#[test]
fn test_max_heading_clamps_levels() {
    let input = document(vec![vec![
        make_span("Top", 72.0, 60.0, 24.0),
        make_span("Middle", 72.0, 100.0, 18.0),
        make_span("Body text that clearly dominates the character count here.", 72.0, 140.0, 10.0),
    ]]);

    let options = ConvertOptions::new().with_max_heading(1);
    let markdown = convert(&input, &options).unwrap();
    assert_eq!(heading_lines(&markdown), vec!["# Top", "# Middle"]);
}

#[test]
fn test_rendering_is_deterministic() {
    let input = document(vec![
        vec![
            make_span("Title", 72.0, 60.0, 18.0),
            make_span("Some body text on the first page.", 72.0, 100.0, 10.0),
            make_span("- a list item", 72.0, 130.0, 10.0),
        ],
        vec![make_span("Another page of body text.", 72.0, 100.0, 10.0)],
    ]);

    let options = ConvertOptions::default();
    let first = convert(&input, &options).unwrap();
    for _ in 0..5 {
        assert_eq!(convert(&input, &options).unwrap(), first);
    }
}

#[test]
fn test_running_footer_removed_from_every_page() {
    let pages: Vec<Vec<Span>> = (1..=5)
        .map(|n| {
            vec![
                make_span(&format!("Body text on page {}.", n), 72.0, 300.0, 10.0),
                make_span(&format!("Page {} of 5", n), 270.0, 760.0, 10.0),
            ]
        })
        .collect();
    let input = document(pages);

    let result = convert_with_report(&input, &ConvertOptions::default()).unwrap();
    assert!(!result.content.contains("of 5"));
    for n in 1..=5 {
        assert!(result.content.contains(&format!("Body text on page {}.", n)));
    }
    assert_eq!(result.stats.removed_line_count, 5);
}

#[test]
fn test_repetition_removal_can_be_disabled() {
    let pages: Vec<Vec<Span>> = (1..=5)
        .map(|n| {
            vec![
                make_span(&format!("Body text on page {}.", n), 72.0, 300.0, 10.0),
                make_span(&format!("Page {} of 5", n), 270.0, 760.0, 10.0),
            ]
        })
        .collect();
    let input = document(pages);

    let options = ConvertOptions::new().with_parse_options(ParseOptions::new().with_repetition_removal(false));
    let result = convert_with_report(&input, &options).unwrap();
    assert!(result.content.contains("Page 3 of 5"));
    assert_eq!(result.stats.removed_line_count, 0);
}

#[test]
fn test_aligned_grid_becomes_table() {
    let mut spans = vec![make_span("The figures are listed below.", 72.0, 60.0, 10.0)];
    let rows = [
        ["Name", "Age", "City"],
        ["Alice", "30", "Paris"],
        ["Bob", "25", "Rome"],
    ];
    for (r, row) in rows.iter().enumerate() {
        let y = 100.0 + r as f32 * 14.0;
        for (cell, x) in row.iter().zip([72.0, 200.0, 330.0]) {
            spans.push(make_span(cell, x, y, 10.0));
        }
    }
    let input = document(vec![spans]);

    let result = convert_with_report(&input, &ConvertOptions::default()).unwrap();
    let markdown = &result.content;
    assert!(markdown.starts_with("The figures are listed below."));
    assert!(markdown.contains("| Name | Age | City |\n| --- | --- | --- |\n| Alice | 30 | Paris |\n| Bob | 25 | Rome |"));
    assert_eq!(result.stats.table_count, 1);
}

#[test]
fn test_wide_cell_grid_becomes_table() {
    // No full-width line above the grid to hold the columns together
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
    let input = document(vec![spans]);

    let result = convert_with_report(&input, &ConvertOptions::default()).unwrap();
    assert_eq!(result.stats.table_count, 1);
    assert!(result.content.starts_with(
        "| Quarterly revenue | Strong growth here | Weaker second half |\n| --- | --- | --- |\n\
         | Operating margin | Held steady overall | Slight decline seen |"
    ));
}

#[test]
fn test_duplicate_page_numbers_rejected() {
    let mut input = DocumentInput::new();
    for _ in 0..5 {
        let mut page = PageInput::letter(1);
        page.push_span(make_span("Body text on a page.", 72.0, 100.0, 10.0));
        input.add_page(page);
    }

    let err = convert(&input, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, unspan::Error::InvalidField { page: 1, field: "number", .. }));
}

#[test]
fn test_hyphenated_words_rejoined() {
    let mut acc = String::from("exam-");
    join_fragments(&mut acc, "ple test");
    assert_eq!(acc, "example test");

    let mut acc = String::from("co-");
    join_fragments(&mut acc, "Operate now");
    assert_eq!(acc, "co-Operate now");

    let input = document(vec![vec![
        make_span("This paragraph shows an exam-", 72.0, 100.0, 10.0),
        make_span("ple test of the joiner.", 72.0, 112.0, 10.0),
    ]]);
    let markdown = convert(&input, &ConvertOptions::default()).unwrap();
    assert_eq!(markdown, "This paragraph shows an example test of the joiner.");
}

#[test]
fn test_paragraph_continues_across_page_break() {
    let input = document(vec![
        vec![make_span("The argument continues on the", 72.0, 100.0, 10.0)],
        vec![make_span("next page without a break.", 72.0, 100.0, 10.0)],
    ]);

    let markdown = convert(&input, &ConvertOptions::default()).unwrap();
    assert_eq!(markdown, "The argument continues on the next page without a break.");
}

#[test]
fn test_nested_list_indentation() {
    let input = document(vec![vec![
        make_span("- first item", 72.0, 100.0, 10.0),
        make_span("- second item", 72.0, 112.0, 10.0),
        make_span("- nested item", 90.0, 124.0, 10.0),
        make_span("- third item", 72.0, 136.0, 10.0),
    ]]);

    let markdown = convert(&input, &ConvertOptions::default()).unwrap();
    assert_eq!(markdown, "- first item\n- second item\n  - nested item\n- third item");
}

fn footnote_pages(definition_page: usize) -> DocumentInput {
    let mut pages = vec![
        vec![make_span("Opening text of the document sets the body size.", 72.0, 100.0, 10.0)],
        vec![
            make_span("Claim with a source", 72.0, 200.0, 10.0),
            make_span("1", 167.0, 198.0, 6.0),
        ],
        vec![make_span("Closing text on the last page of the document.", 72.0, 100.0, 10.0)],
    ];
    pages[definition_page - 1].push(make_span("1. Some note.", 72.0, 740.0, 8.0));
    document(pages)
}

#[test]
fn test_footnote_on_same_page_is_linked() {
    let result = convert_with_report(&footnote_pages(2), &ConvertOptions::default()).unwrap();

    assert!(result.content.contains("Claim with a source[^1]"));
    assert!(result.content.ends_with("[^1]: Some note."));
    assert_eq!(result.stats.footnote_count, 1);
    assert!(result.is_clean());
}

#[test]
fn test_footnote_on_other_page_stays_plain() {
    let result = convert_with_report(&footnote_pages(3), &ConvertOptions::default()).unwrap();

    assert!(!result.content.contains("[^1]"));
    assert_eq!(result.warnings, vec![Warning::UnresolvedFootnote { page: 2, key: 1 }]);
}

#[test]
fn test_footnote_across_pages_when_enabled() {
    let options = ConvertOptions::new().with_footnote_scope(FootnoteScope::Document);
    let result = convert_with_report(&footnote_pages(3), &options).unwrap();

    assert!(result.content.contains("[^1]: Some note."));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_page_breaks_separate_pages() {
    let input = document(vec![
        vec![make_span("First page ends here.", 72.0, 100.0, 10.0)],
        vec![make_span("Second page starts here.", 72.0, 100.0, 10.0)],
    ]);

    let options = ConvertOptions::new().with_page_breaks(true);
    let markdown = convert(&input, &options).unwrap();
    assert_eq!(markdown, "First page ends here.\n\n---\n\nSecond page starts here.");
}
