//! Rendering options and configuration.

/// Options for rendering a reconstructed document.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Emit `---` between pages
    pub page_breaks: bool,

    /// Include YAML frontmatter with metadata
    pub include_frontmatter: bool,

    /// Spaces per list nesting level
    pub list_indent: usize,

    /// Escape special Markdown characters
    pub escape_special_chars: bool,

    /// Maximum heading level (1-6)
    pub max_heading_level: u8,

    /// Collect extraction statistics during rendering
    pub collect_stats: bool,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable page break rules.
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.page_breaks = enabled;
        self
    }

    /// Enable or disable frontmatter.
    pub fn with_frontmatter(mut self, include: bool) -> Self {
        self.include_frontmatter = include;
        self
    }

    /// Set the number of spaces per list level.
    pub fn with_list_indent(mut self, spaces: usize) -> Self {
        self.list_indent = spaces.clamp(1, 8);
        self
    }

    /// Enable or disable Markdown escaping.
    pub fn with_escaping(mut self, escape: bool) -> Self {
        self.escape_special_chars = escape;
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }

    /// Enable statistics collection during rendering.
    pub fn with_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_breaks: false,
            include_frontmatter: false,
            list_indent: 2,
            escape_special_chars: true,
            max_heading_level: 6,
            collect_stats: false,
        }
    }
}
