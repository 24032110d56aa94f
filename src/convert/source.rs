//! Span sources: the boundary to the extraction collaborator.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::DocumentInput;
use crate::parser::parse_json_slice;

use super::{convert_document, ConvertOptions, ConvertResult};

/// Something that can deliver validated spans for a document.
///
/// Implement this trait to accept another dump format.
pub trait SpanSource: Send + Sync {
    /// Get the supported file extensions for this source.
    ///
    /// Extensions should be lowercase without the leading dot (e.g., `["json"]`).
    fn supported_extensions(&self) -> &[&str];

    /// Get the name of this source.
    fn name(&self) -> &str;

    /// Load spans from bytes.
    fn load_bytes(&self, bytes: &[u8]) -> Result<DocumentInput>;

    /// Load spans from a file.
    fn load(&self, path: &Path) -> Result<DocumentInput> {
        let bytes = fs::read(path)?;
        self.load_bytes(&bytes)
    }

    /// Check if this source supports the given extension.
    fn supports_extension(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.supported_extensions().iter().any(|e| *e == ext_lower)
    }
}

/// Reads the JSON span dump.
#[derive(Debug, Clone, Default)]
pub struct JsonSpanSource {
    _private: (),
}

impl JsonSpanSource {
    /// Create a new JSON span source.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl SpanSource for JsonSpanSource {
    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }

    fn name(&self) -> &str {
        "json"
    }

    fn load_bytes(&self, bytes: &[u8]) -> Result<DocumentInput> {
        parse_json_slice(bytes)
    }
}

/// Registry mapping file extensions to span sources.
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn SpanSource>>,
    by_name: HashMap<String, Arc<dyn SpanSource>>,
}

impl SourceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Create a registry with the JSON source registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonSpanSource::new()));
        registry
    }

    /// Register a source for all its supported extensions.
    pub fn register(&mut self, source: Arc<dyn SpanSource>) {
        for ext in source.supported_extensions() {
            self.sources.insert(ext.to_lowercase(), source.clone());
        }
        self.by_name.insert(source.name().to_lowercase(), source);
    }

    /// Get a source by file extension.
    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn SpanSource>> {
        self.sources.get(&ext.to_lowercase()).cloned()
    }

    /// Get a source by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn SpanSource>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Check if an extension is supported.
    pub fn supports(&self, ext: &str) -> bool {
        self.sources.contains_key(&ext.to_lowercase())
    }

    /// Check if a path has a supported extension.
    pub fn supports_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.supports(ext))
            .unwrap_or(false)
    }

    /// Get all supported extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        exts.sort_unstable();
        exts
    }

    /// Load spans from a file using the source for its extension.
    pub fn load(&self, path: &Path) -> Result<DocumentInput> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::Other(format!("File has no extension: {}", path.display())))?;

        let source = self
            .get_by_extension(ext)
            .ok_or_else(|| Error::Other(format!("No span source for extension: {}", ext)))?;

        log::debug!("loading {} with the {} source", path.display(), source.name());
        source.load(path)
    }

    /// Load and convert a file.
    pub fn convert(&self, path: &Path, options: &ConvertOptions) -> Result<ConvertResult> {
        let input = self.load(path)?;
        convert_document(input, options)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
