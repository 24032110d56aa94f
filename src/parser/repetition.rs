//! Running header, footer and page-number removal.
//!
//! Only lines fully inside the top or bottom margin band are candidates.
//! Candidates are reduced to a text template (digit runs become `#`) and a
//! position bucket; templates that recur on enough pages are removed.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::layout::{PageItem, PageLayout, TextLine};

lazy_static! {
    static ref DIGITS_RE: Regex = Regex::new(r"\d+").unwrap();
    static ref SPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Repetition detector configuration.
#[derive(Debug, Clone)]
pub struct RepetitionConfig {
    /// Height of the top and bottom margin bands, as a fraction of page height
    pub margin_band: f32,
    /// Page coverage a pattern must exceed to be removed
    pub coverage_threshold: f32,
    /// Allowed deviation from 0.5 coverage for odd/even alternating patterns
    pub alternating_tolerance: f32,
    /// Minimum number of pages a pattern must appear on
    pub min_pages: usize,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            margin_band: 0.10,
            coverage_threshold: 0.6,
            alternating_tolerance: 0.15,
            min_pages: 2,
        }
    }
}

/// Top or bottom margin band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    /// Top margin
    Top,
    /// Bottom margin
    Bottom,
}

/// Horizontal third of the page holding a line's center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HAlign {
    /// Left third
    Left,
    /// Middle third
    Center,
    /// Right third
    Right,
}

/// Where on the page a candidate line sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionBucket {
    /// Margin band
    pub band: Band,
    /// Horizontal alignment
    pub align: HAlign,
}

/// A recurring margin line: template, position and the pages it appears on.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningPattern {
    /// Normalized text with digit runs replaced by `#`
    pub template: String,
    /// Position bucket
    pub bucket: PositionBucket,
    /// Pages the pattern appears on
    pub pages: BTreeSet<u32>,
    /// Ids of the matching lines
    pub lines: Vec<u64>,
}

impl RunningPattern {
    /// Fraction of the document's pages carrying the pattern.
    pub fn coverage(&self, page_count: usize) -> f32 {
        if page_count == 0 {
            return 0.0;
        }
        self.pages.len() as f32 / page_count as f32
    }

    fn all_odd(&self) -> bool {
        self.pages.iter().all(|p| p % 2 == 1)
    }

    fn all_even(&self) -> bool {
        self.pages.iter().all(|p| p % 2 == 0)
    }
}

/// Counts of removed lines per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepetitionStats {
    /// Running header lines removed
    pub removed_headers: usize,
    /// Running footer lines removed
    pub removed_footers: usize,
    /// Page number lines removed
    pub removed_page_numbers: usize,
}

impl RepetitionStats {
    /// Total removed lines.
    pub fn total(&self) -> usize {
        self.removed_headers + self.removed_footers + self.removed_page_numbers
    }
}

/// Normalize a line into its repetition template.
pub fn template(text: &str) -> String {
    let replaced = DIGITS_RE.replace_all(text, "#");
    SPACE_RE.replace_all(replaced.trim(), " ").into_owned()
}

/// Whether a template is a bare page number, possibly decorated ("- # -", "[#]").
pub fn is_page_number_template(template: &str) -> bool {
    let stripped = template.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '–' | '—' | '•' | '·' | '|' | '[' | ']' | '(' | ')')
    });
    stripped == "#"
}

struct Candidate {
    id: u64,
    page: u32,
    bucket: PositionBucket,
    template: String,
    number: Option<u64>,
}

/// Detects and removes running headers, footers and page numbers.
pub struct RepetitionDetector {
    config: RepetitionConfig,
}

impl RepetitionDetector {
    /// Create a detector with the given configuration.
    pub fn new(config: RepetitionConfig) -> Self {
        Self { config }
    }

    /// Remove repeated margin lines from every page.
    pub fn remove(&self, mut pages: Vec<PageLayout>) -> (Vec<PageLayout>, RepetitionStats) {
        let page_count = pages.len();
        let candidates: Vec<Candidate> = pages.iter().flat_map(|p| self.candidates(p)).collect();

        let mut stats = RepetitionStats::default();
        let mut removed: HashSet<u64> = HashSet::new();

        // Page numbers: grouped per band regardless of alignment
        let mut number_groups: BTreeMap<Band, Vec<&Candidate>> = BTreeMap::new();
        for c in candidates.iter().filter(|c| is_page_number_template(&c.template)) {
            number_groups.entry(c.bucket.band).or_default().push(c);
        }
        let min_number_pages = page_count.min(2);
        for (band, group) in number_groups {
            let pages_covered: BTreeSet<u32> = group.iter().map(|c| c.page).collect();
            if pages_covered.len() < min_number_pages || !is_non_decreasing(&group) {
                continue;
            }
            log::debug!("removing page numbers in {:?} band on {} pages", band, pages_covered.len());
            for c in group {
                if removed.insert(c.id) {
                    stats.removed_page_numbers += 1;
                }
            }
        }

        // Running patterns keyed by template and bucket; bare numbers are
        // only ever removed as page-number sequences
        let mut patterns: BTreeMap<(String, PositionBucket), RunningPattern> = BTreeMap::new();
        for c in candidates.iter().filter(|c| !is_page_number_template(&c.template)) {
            let pattern = patterns
                .entry((c.template.clone(), c.bucket))
                .or_insert_with(|| RunningPattern {
                    template: c.template.clone(),
                    bucket: c.bucket,
                    pages: BTreeSet::new(),
                    lines: Vec::new(),
                });
            pattern.pages.insert(c.page);
            pattern.lines.push(c.id);
        }
        let patterns: Vec<RunningPattern> = patterns
            .into_values()
            .filter(|p| p.pages.len() >= self.config.min_pages)
            .collect();

        let mut accepted: Vec<&RunningPattern> = patterns
            .iter()
            .filter(|p| p.coverage(page_count) > self.config.coverage_threshold)
            .collect();

        // Odd/even alternating pairs in the same band
        for (i, a) in patterns.iter().enumerate() {
            for b in patterns.iter().skip(i + 1) {
                if self.is_alternating_pair(a, b, page_count) {
                    accepted.push(a);
                    accepted.push(b);
                }
            }
        }

        for pattern in accepted {
            log::debug!(
                "removing running {:?} pattern {:?} (coverage {:.2})",
                pattern.bucket.band,
                pattern.template,
                pattern.coverage(page_count)
            );
            for &id in &pattern.lines {
                if removed.insert(id) {
                    match pattern.bucket.band {
                        Band::Top => stats.removed_headers += 1,
                        Band::Bottom => stats.removed_footers += 1,
                    }
                }
            }
        }

        if !removed.is_empty() {
            for page in &mut pages {
                for item in &mut page.items {
                    if let PageItem::Text(block) = item {
                        block.lines.retain(|line| !removed.contains(&line.id));
                    }
                }
                page.prune();
            }
        }

        (pages, stats)
    }

    fn is_alternating_pair(&self, a: &RunningPattern, b: &RunningPattern, page_count: usize) -> bool {
        if a.bucket.band != b.bucket.band || !a.pages.is_disjoint(&b.pages) {
            return false;
        }
        let near_half = |p: &RunningPattern| (p.coverage(page_count) - 0.5).abs() <= self.config.alternating_tolerance;
        let parity = (a.all_odd() && b.all_even()) || (a.all_even() && b.all_odd());
        let combined = a.coverage(page_count) + b.coverage(page_count);
        near_half(a) && near_half(b) && parity && combined > self.config.coverage_threshold
    }

    fn candidates(&self, page: &PageLayout) -> Vec<Candidate> {
        let band_height = page.height * self.config.margin_band;
        page.lines()
            .filter_map(|line| {
                let band = if line.bbox.y1 <= band_height {
                    Band::Top
                } else if line.bbox.y0 >= page.height - band_height {
                    Band::Bottom
                } else {
                    return None;
                };
                let text = line.text();
                let template = template(&text);
                if template.is_empty() {
                    return None;
                }
                Some(Candidate {
                    id: line.id,
                    page: page.number,
                    bucket: PositionBucket {
                        band,
                        align: horizontal_align(line, page.width),
                    },
                    number: DIGITS_RE.find(&text).and_then(|m| m.as_str().parse().ok()),
                    template,
                })
            })
            .collect()
    }
}

impl Default for RepetitionDetector {
    fn default() -> Self {
        Self::new(RepetitionConfig::default())
    }
}

fn horizontal_align(line: &TextLine, page_width: f32) -> HAlign {
    let center = line.bbox.center_x();
    if center < page_width / 3.0 {
        HAlign::Left
    } else if center > page_width * 2.0 / 3.0 {
        HAlign::Right
    } else {
        HAlign::Center
    }
}

/// Numbers never decrease in page order; gaps are allowed.
fn is_non_decreasing(group: &[&Candidate]) -> bool {
    let mut ordered: Vec<(u32, Option<u64>)> = group.iter().map(|c| (c.page, c.number)).collect();
    ordered.sort();
    let numbers: Option<Vec<u64>> = ordered.into_iter().map(|(_, n)| n).collect();
    match numbers {
        Some(numbers) => numbers.windows(2).all(|w| w[0] <= w[1]),
        None => false,
    }
}
