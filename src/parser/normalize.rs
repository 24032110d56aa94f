//! Span text normalization, run before statistics are collected.

use unicode_normalization::UnicodeNormalization;

use crate::error::Warning;
use crate::model::{DocumentInput, Span};

/// Options for span text normalization.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Normalize Unicode to NFC form
    pub normalize_unicode: bool,

    /// Expand typographic ligatures (ﬁ, ﬂ, ...)
    pub fix_ligatures: bool,

    /// Map soft hyphens and no-break spaces to their plain forms
    pub fix_special_spaces: bool,

    /// Report replacement, private-use and control characters
    pub detect_anomalies: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            fix_ligatures: true,
            fix_special_spaces: true,
            detect_anomalies: true,
        }
    }
}

/// Normalizes span text and collects encoding anomalies.
pub struct TextNormalizer {
    options: NormalizeOptions,
    ligature_map: Vec<(char, &'static str)>,
}

impl TextNormalizer {
    /// Create a new normalizer with the given options.
    pub fn new(options: NormalizeOptions) -> Self {
        Self {
            options,
            ligature_map: vec![
                ('\u{FB00}', "ff"),  // ﬀ
                ('\u{FB01}', "fi"),  // ﬁ
                ('\u{FB02}', "fl"),  // ﬂ
                ('\u{FB03}', "ffi"), // ﬃ
                ('\u{FB04}', "ffl"), // ﬄ
                ('\u{FB05}', "st"),  // ﬅ (long s + t)
                ('\u{FB06}', "st"),  // ﬆ
            ],
        }
    }

    /// Normalize every span of the document.
    ///
    /// Spans are rebuilt rather than edited; anomalous glyphs are kept and
    /// reported once per span.
    pub fn normalize_document(&self, input: DocumentInput) -> (DocumentInput, Vec<Warning>) {
        let mut warnings = Vec::new();
        let DocumentInput { metadata, pages } = input;

        let pages = pages
            .into_iter()
            .map(|mut page| {
                let spans = std::mem::take(&mut page.spans);
                page.spans = spans
                    .into_iter()
                    .map(|span| {
                        let span = self.normalize_span(span);
                        if self.options.detect_anomalies {
                            if let Some(c) = find_anomaly(&span.text) {
                                log::warn!(
                                    "page {}: unmappable glyph U+{:04X} in {:?}",
                                    span.page,
                                    c as u32,
                                    span.text
                                );
                                warnings.push(Warning::EncodingAnomaly {
                                    page: span.page,
                                    codepoint: c as u32,
                                    text: span.text.clone(),
                                });
                            }
                        }
                        span
                    })
                    .collect();
                page
            })
            .collect();

        (DocumentInput { metadata, pages }, warnings)
    }

    fn normalize_span(&self, span: Span) -> Span {
        let text = self.normalize_text(&span.text);
        Span { text, ..span }
    }

    /// Normalize a single string.
    pub fn normalize_text(&self, text: &str) -> String {
        let mut result: String = if self.options.normalize_unicode {
            text.nfc().collect()
        } else {
            text.to_string()
        };

        if self.options.fix_ligatures && result.chars().any(|c| ('\u{FB00}'..='\u{FB06}').contains(&c)) {
            let mut expanded = String::with_capacity(result.len() + 4);
            for c in result.chars() {
                match self.ligature_map.iter().find(|(lig, _)| *lig == c) {
                    Some((_, replacement)) => expanded.push_str(replacement),
                    None => expanded.push(c),
                }
            }
            result = expanded;
        }

        if self.options.fix_special_spaces {
            result = result
                .chars()
                .map(|c| match c {
                    '\u{00AD}' => '-',
                    '\u{00A0}' | '\u{202F}' | '\u{2007}' => ' ',
                    c => c,
                })
                .collect();
        }

        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(NormalizeOptions::default())
    }
}

/// First replacement, private-use or control character in the text.
pub fn find_anomaly(text: &str) -> Option<char> {
    text.chars().find(|&c| is_anomalous(c))
}

fn is_anomalous(c: char) -> bool {
    let code = c as u32;
    c == '\u{FFFD}'
        || (0xE000..=0xF8FF).contains(&code)
        || (0xF0000..=0xFFFFD).contains(&code)
        || (0x100000..=0x10FFFD).contains(&code)
        || (c.is_control() && c != '\t' && c != '\n' && c != '\r')
}
