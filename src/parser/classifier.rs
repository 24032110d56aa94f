//! Span role classification from statistical and stylistic evidence.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::model::{ListInfo, ListStyle, NumberStyle, Span};

use super::layout::PlacedSpan;
use super::stats::DocumentStatistics;

lazy_static! {
    static ref BULLET_RE: Regex = Regex::new(r"^([•●○■□◦▪▸►\-–—*·])(?:\s+|$)").unwrap();
    static ref DECIMAL_RE: Regex = Regex::new(r"^(?:\((\d{1,3})\)|(\d{1,3})[.)])(?:\s+|$)").unwrap();
    static ref LETTER_RE: Regex =
        Regex::new(r"^(?:\(([A-Za-z]{1,4})\)|([A-Za-z]{1,4})[.)])(?:\s+|$)").unwrap();
    static ref ROMAN_RE: Regex =
        Regex::new(r"^(?i)m{0,3}(cm|cd|d?c{0,3})(xc|xl|l?x{0,3})(ix|iv|v?i{0,3})$").unwrap();
    static ref NUMERIC_RE: Regex = Regex::new(r"^[\d.,:/\-–\s]+$").unwrap();
}

/// Classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Spans with more words than this never become headings
    pub max_heading_words: usize,
    /// Promote bold/colored body-size spans to headings
    pub style_headings: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_heading_words: 12,
            style_headings: false,
        }
    }
}

/// Role of a span, and of a line once its spans are combined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpanRole {
    /// Heading with level 1-6
    Heading(u8),
    /// List item; the span starts with a list marker
    ListItem(ListInfo),
    /// Ordinary text
    Paragraph,
}

impl SpanRole {
    /// Heading level, if this is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            SpanRole::Heading(level) => Some(*level),
            _ => None,
        }
    }

    /// Whether this is a list item.
    pub fn is_list_item(&self) -> bool {
        matches!(self, SpanRole::ListItem(_))
    }
}

/// A recognized list marker at the start of a text.
#[derive(Debug, Clone, PartialEq)]
pub struct ListMarker {
    /// Ordered or unordered style
    pub style: ListStyle,
    /// Item number for ordered markers
    pub number: Option<u32>,
}

impl ListMarker {
    /// List information at the given depth.
    pub fn into_info(self, level: u8) -> ListInfo {
        ListInfo {
            style: self.style,
            level,
            item_number: self.number,
        }
    }
}

/// Split a leading list marker off a text.
///
/// Returns the marker and the remaining text. A marker must be followed by
/// whitespace or end the text, so "1.5 m" and "e.g." are not markers.
pub fn split_list_marker(text: &str) -> Option<(ListMarker, &str)> {
    let trimmed = text.trim_start();

    if let Some(caps) = BULLET_RE.captures(trimmed) {
        let marker = caps.get(1)?.as_str().chars().next()?;
        let rest = &trimmed[caps.get(0)?.end()..];
        return Some((
            ListMarker {
                style: ListStyle::Unordered { marker },
                number: None,
            },
            rest,
        ));
    }

    if let Some(caps) = DECIMAL_RE.captures(trimmed) {
        let digits = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let number = digits.parse().ok()?;
        let rest = &trimmed[caps.get(0)?.end()..];
        return Some((
            ListMarker {
                style: ordered(NumberStyle::Decimal),
                number: Some(number),
            },
            rest,
        ));
    }

    if let Some(caps) = LETTER_RE.captures(trimmed) {
        let letters = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let (number_style, number) = letter_marker(letters)?;
        let rest = &trimmed[caps.get(0)?.end()..];
        return Some((
            ListMarker {
                style: ordered(number_style),
                number: Some(number),
            },
            rest,
        ));
    }

    None
}

fn ordered(number_style: NumberStyle) -> ListStyle {
    ListStyle::Ordered {
        start: 1,
        number_style,
    }
}

/// Interpret an alphabetic marker as a letter or roman numeral.
///
/// Single letters are alphabetic except i, v and x, which read as roman.
fn letter_marker(letters: &str) -> Option<(NumberStyle, u32)> {
    let upper = letters.chars().all(|c| c.is_ascii_uppercase());
    let lower = letters.chars().all(|c| c.is_ascii_lowercase());
    if !upper && !lower {
        return None;
    }

    let mut chars = letters.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if !matches!(c.to_ascii_lowercase(), 'i' | 'v' | 'x') {
            let number = c.to_ascii_lowercase() as u32 - 'a' as u32 + 1;
            let style = if upper {
                NumberStyle::UpperAlpha
            } else {
                NumberStyle::LowerAlpha
            };
            return Some((style, number));
        }
    }

    let value = parse_roman(letters)?;
    let style = if upper {
        NumberStyle::UpperRoman
    } else {
        NumberStyle::LowerRoman
    };
    Some((style, value))
}

/// Value of a well-formed roman numeral.
pub fn parse_roman(text: &str) -> Option<u32> {
    if text.is_empty() || !ROMAN_RE.is_match(text) {
        return None;
    }

    let digit = |c: char| match c.to_ascii_lowercase() {
        'i' => 1,
        'v' => 5,
        'x' => 10,
        'l' => 50,
        'c' => 100,
        'd' => 500,
        'm' => 1000,
        _ => 0,
    };

    let values: Vec<u32> = text.chars().map(digit).collect();
    let mut total = 0;
    for (i, &v) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(&next) if next > v => total -= v as i64,
            _ => total += v as i64,
        }
    }
    u32::try_from(total).ok().filter(|&t| t > 0)
}

/// Whether the text is only a number (possibly with separators).
pub fn is_pure_number(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.chars().any(|c| c.is_ascii_digit()) && NUMERIC_RE.is_match(trimmed)
}

/// Labels spans with their structural role.
pub struct Classifier<'a> {
    stats: &'a DocumentStatistics,
    config: ClassifierConfig,
}

impl<'a> Classifier<'a> {
    /// Create a classifier over the given statistics.
    pub fn new(stats: &'a DocumentStatistics, config: ClassifierConfig) -> Self {
        Self { stats, config }
    }

    /// Classify a span. `indent` is its left edge relative to the column's text edge.
    pub fn classify(&self, span: &Span, indent: f32) -> SpanRole {
        let short = span.word_count() <= self.config.max_heading_words;

        if !self.stats.is_single_level() && short && !is_pure_number(&span.text) {
            if let Some(rank) = self.stats.heading_rank(span.font_size) {
                return SpanRole::Heading(rank.min(6) as u8);
            }

            if self.config.style_headings && self.stats.is_style_deviant(span) {
                return SpanRole::Heading(self.stats.style_heading_level());
            }
        }

        if let Some((marker, _)) = split_list_marker(&span.text) {
            let depth = self.stats.indent_depth(indent.max(0.0));
            return SpanRole::ListItem(marker.into_info(depth));
        }

        SpanRole::Paragraph
    }
}

/// Combine span roles into the role of a line.
///
/// A list marker on the first span makes a list line. A line whose
/// non-numeric spans are all headings is a heading line at the smallest
/// level number present. Everything else is a paragraph line.
pub fn line_role(spans: &[PlacedSpan]) -> SpanRole {
    let Some(first) = spans.iter().find(|s| !s.span.is_blank()) else {
        return SpanRole::Paragraph;
    };
    if let SpanRole::ListItem(info) = &first.role {
        return SpanRole::ListItem(info.clone());
    }

    let mut level: Option<u8> = None;
    for placed in spans {
        if placed.span.is_blank() || is_pure_number(&placed.span.text) {
            continue;
        }
        match placed.role {
            SpanRole::Heading(l) => level = Some(level.map_or(l, |cur| cur.min(l))),
            _ => return SpanRole::Paragraph,
        }
    }

    level.map(SpanRole::Heading).unwrap_or(SpanRole::Paragraph)
}
