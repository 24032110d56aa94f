//! Integration tests for span sources, the registry and batch conversion.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use unspan::convert::{
    BatchConverter, BatchOptions, ConvertOptions, DocumentOutcome, JsonSpanSource, SourceRegistry, SpanSource,
};
use unspan::error::{Error, Result};
use unspan::model::{BBox, DocumentInput, PageInput, Span};

/// Mock source producing one fixed line of text per document.
struct MockSource {
    extensions: Vec<&'static str>,
    name: &'static str,
}

impl MockSource {
    fn new(extensions: Vec<&'static str>, name: &'static str) -> Self {
        Self { extensions, name }
    }
}

impl SpanSource for MockSource {
    fn supported_extensions(&self) -> &[&str] {
        &self.extensions
    }

    fn name(&self) -> &str {
        self.name
    }

    fn load_bytes(&self, bytes: &[u8]) -> Result<DocumentInput> {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        if text.is_empty() {
            return Err(Error::Extraction("empty file".into()));
        }
        let mut page = PageInput::letter(1);
        page.push_span(Span::new(
            text,
            BBox::new(72.0, 200.0, 300.0, 210.0),
            1,
            "Helvetica",
            10.0,
        ));
        let mut input = DocumentInput::new();
        input.add_page(page);
        Ok(input)
    }
}

fn dump(text: &str) -> String {
    format!(
        r#"{{"metadata": {{"title": "{0}"}},
            "pages": [{{"number": 1, "width": 612, "height": 792,
                "spans": [{{"text": "{0}", "bbox": [72, 200, 300, 210], "font_name": "Times-Roman", "font_size": 11}}]}}]}}"#,
        text
    )
}

#[test]
fn test_source_registry_new() {
    let registry = SourceRegistry::new();
    assert!(!registry.supports("json"));
    assert!(registry.supported_extensions().is_empty());
}

#[test]
fn test_source_registry_register() {
    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(MockSource::new(vec!["txt", "text"], "plain")));

    assert!(registry.supports("txt"));
    assert!(registry.supports("TEXT"));
    assert!(registry.get_by_name("PLAIN").is_some());
    assert!(!registry.supports("json"));
}

#[test]
fn test_source_registry_multiple_sources() {
    let mut registry = SourceRegistry::with_defaults();
    registry.register(Arc::new(MockSource::new(vec!["txt"], "plain")));

    assert_eq!(registry.supported_extensions(), vec!["json", "txt"]);
    let source = registry.get_by_extension("txt").unwrap();
    assert!(source.supports_extension("TXT"));
    assert!(!source.supports_extension("json"));
}

#[test]
fn test_json_source_extensions() {
    let source = JsonSpanSource::new();
    assert_eq!(source.supported_extensions(), &["json"]);
    assert_eq!(source.name(), "json");
    assert!(source.supports_extension("JSON"));
}

#[test]
fn test_registry_convert_with_mock_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    fs::write(&path, "A plain note.").unwrap();

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(MockSource::new(vec!["txt"], "plain")));

    let result = registry.convert(&path, &ConvertOptions::default()).unwrap();
    assert_eq!(result.content, "A plain note.");
    assert_eq!(result.content_len(), 13);
}

#[test]
fn test_missing_file_is_extraction_failure() {
    let err = SourceRegistry::with_defaults()
        .load(Path::new("/definitely/not/here.json"))
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(err.is_extraction_failure());
}

#[test]
fn test_batch_of_five_with_one_failure_yields_four_outputs() {
    let input = tempfile::tempdir().unwrap();
    for name in ["alpha", "beta", "gamma", "delta"] {
        fs::write(input.path().join(format!("{}.json", name)), dump(name)).unwrap();
    }
    fs::write(input.path().join("epsilon.json"), r#"{"error": "cannot open document"}"#).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let batch = BatchOptions::new()
        .with_workers(3)
        .with_queue_capacity(2)
        .with_progress(move |path, done, total| {
            record.lock().unwrap().push((path.to_path_buf(), done, total));
        });

    let converter = BatchConverter::new(ConvertOptions::default(), batch);
    let report = converter.convert_dir(input.path()).unwrap();

    assert_eq!(report.total(), 5);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);

    // Report order follows paths, not completion
    let names: Vec<String> = report
        .documents
        .keys()
        .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "delta", "epsilon", "gamma"]);

    match report.get(&input.path().join("epsilon.json")) {
        Some(DocumentOutcome::Failed { error, extraction }) => {
            assert!(error.contains("cannot open document"));
            assert!(*extraction);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|(_, _, total)| *total == 5));
    let mut counts: Vec<usize> = seen.iter().map(|(_, done, _)| *done).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2, 3, 4, 5]);

    let output = tempfile::tempdir().unwrap();
    let written = report.write_outputs(input.path(), output.path()).unwrap();
    assert_eq!(written.len(), 4);
    assert_eq!(fs::read_to_string(output.path().join("gamma.md")).unwrap(), "gamma");
    assert!(!output.path().join("epsilon.md").exists());
}

#[test]
fn test_batch_results_match_single_conversion() {
    let input = tempfile::tempdir().unwrap();
    let path = input.path().join("doc.json");
    fs::write(&path, dump("Same output either way")).unwrap();

    let options = ConvertOptions::default();
    let single = SourceRegistry::with_defaults().convert(&path, &options).unwrap();

    let report = BatchConverter::new(options, BatchOptions::new().with_workers(2))
        .convert_paths(vec![path.clone()])
        .unwrap();
    let batched = report.get(&path).and_then(DocumentOutcome::result).unwrap();

    assert_eq!(batched.content, single.content);
    assert_eq!(batched.stats, single.stats);
}

#[test]
fn test_batch_with_mixed_sources() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("a.json"), dump("json doc")).unwrap();
    fs::write(input.path().join("b.txt"), "text doc").unwrap();
    fs::write(input.path().join("c.txt"), "").unwrap();

    let mut registry = SourceRegistry::with_defaults();
    registry.register(Arc::new(MockSource::new(vec!["txt"], "plain")));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let batch = BatchOptions::new().with_progress(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let report = BatchConverter::new(ConvertOptions::default(), batch)
        .with_registry(registry)
        .convert_dir(input.path())
        .unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.failures().len(), 1);
}
