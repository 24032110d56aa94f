//! Bulk conversion over a fixed worker pool.
//!
//! Paths are fed through a bounded task channel to long-running workers on a
//! rayon pool; each worker converts whole documents with its own pipeline
//! and answers on a result channel. A failing or panicking document is
//! recorded in the report and never stops its siblings.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;

use crate::error::{Error, Result};

use super::{ConvertOptions, ConvertResult, SourceRegistry};

/// Progress hook: finished path, documents done, documents total.
pub type ProgressFn = Arc<dyn Fn(&Path, usize, usize) + Send + Sync>;

/// Options for bulk conversion.
#[derive(Clone)]
pub struct BatchOptions {
    /// Number of worker threads
    pub workers: usize,

    /// Capacity of the task queue
    pub queue_capacity: usize,

    /// Descend into subdirectories when collecting inputs
    pub recursive: bool,

    /// Called once per finished document
    pub progress: Option<ProgressFn>,
}

impl BatchOptions {
    /// Create batch options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the task queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Descend into subdirectories.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the progress hook.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&Path, usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = cpus.min(4);
        Self {
            workers,
            queue_capacity: workers * 2,
            recursive: false,
            progress: None,
        }
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("recursive", &self.recursive)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// What happened to one document of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Converted successfully
    Converted(ConvertResult),
    /// Conversion failed; siblings were unaffected
    Failed {
        /// Error message
        error: String,
        /// Whether no usable spans could be obtained
        extraction: bool,
    },
}

impl DocumentOutcome {
    /// Whether the document converted.
    pub fn is_converted(&self) -> bool {
        matches!(self, DocumentOutcome::Converted(_))
    }

    /// The conversion result, if any.
    pub fn result(&self) -> Option<&ConvertResult> {
        match self {
            DocumentOutcome::Converted(result) => Some(result),
            DocumentOutcome::Failed { .. } => None,
        }
    }
}

/// Outcomes of a batch keyed by source path, independent of completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Outcome per source path
    pub documents: BTreeMap<PathBuf, DocumentOutcome>,
}

impl BatchReport {
    /// Number of documents in the batch.
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    /// Number of converted documents.
    pub fn succeeded(&self) -> usize {
        self.documents.values().filter(|o| o.is_converted()).count()
    }

    /// Number of failed documents.
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Outcome for one path.
    pub fn get(&self, path: &Path) -> Option<&DocumentOutcome> {
        self.documents.get(path)
    }

    /// Failed paths with their error messages.
    pub fn failures(&self) -> Vec<(&Path, &str)> {
        self.documents
            .iter()
            .filter_map(|(path, outcome)| match outcome {
                DocumentOutcome::Failed { error, .. } => Some((path.as_path(), error.as_str())),
                DocumentOutcome::Converted(_) => None,
            })
            .collect()
    }

    /// Write one `.md` file per converted document, mirroring the input
    /// layout below `input_root`. Returns the written paths.
    pub fn write_outputs(&self, input_root: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (path, outcome) in &self.documents {
            let Some(result) = outcome.result() else {
                continue;
            };

            let relative = match path.strip_prefix(input_root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => PathBuf::from(path.file_name().unwrap_or(path.as_os_str())),
            };
            let target = output_dir.join(relative).with_extension("md");
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &result.content)?;
            written.push(target);
        }
        Ok(written)
    }
}

/// Converts many documents in parallel.
pub struct BatchConverter {
    options: ConvertOptions,
    batch: BatchOptions,
    registry: Arc<SourceRegistry>,
}

impl BatchConverter {
    /// Create a batch converter using the default span sources.
    pub fn new(options: ConvertOptions, batch: BatchOptions) -> Self {
        Self {
            options,
            batch,
            registry: Arc::new(SourceRegistry::with_defaults()),
        }
    }

    /// Use a custom source registry.
    pub fn with_registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Collect convertible files in a directory, sorted by path.
    pub fn collect_inputs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        self.walk(dir, &mut found)?;
        found.sort();
        Ok(found)
    }

    fn walk(&self, dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if self.batch.recursive {
                    self.walk(&path, found)?;
                }
            } else if self.registry.supports_path(&path) {
                found.push(path);
            }
        }
        Ok(())
    }

    /// Convert every convertible file in a directory.
    pub fn convert_dir(&self, dir: &Path) -> Result<BatchReport> {
        let paths = self.collect_inputs(dir)?;
        self.convert_paths(paths)
    }

    /// Convert the given files.
    ///
    /// Only pool setup can fail; per-document errors land in the report.
    pub fn convert_paths(&self, paths: Vec<PathBuf>) -> Result<BatchReport> {
        let total = paths.len();
        let mut report = BatchReport::default();
        if total == 0 {
            return Ok(report);
        }

        let workers = self.batch.workers.clamp(1, total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("unspan-worker-{}", i))
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;
        log::debug!("converting {} documents on {} workers", total, workers);

        let (task_tx, task_rx) = bounded::<PathBuf>(self.batch.queue_capacity.max(1));
        let (result_tx, result_rx) = unbounded::<(PathBuf, DocumentOutcome)>();

        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let registry = Arc::clone(&self.registry);
            let options = self.options.clone();
            pool.spawn(move || {
                for path in task_rx.iter() {
                    let outcome = run_task(&registry, &path, &options);
                    if result_tx.send((path, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        thread::scope(|scope| {
            scope.spawn(move || {
                for path in paths {
                    if task_tx.send(path).is_err() {
                        break;
                    }
                }
            });

            for (done, (path, outcome)) in result_rx.iter().enumerate() {
                if let Some(progress) = &self.batch.progress {
                    progress(&path, done + 1, total);
                }
                report.documents.insert(path, outcome);
            }
        });

        log::debug!(
            "batch finished: {} converted, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }
}

fn run_task(registry: &SourceRegistry, path: &Path, options: &ConvertOptions) -> DocumentOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| registry.convert(path, options))) {
        Ok(Ok(result)) => DocumentOutcome::Converted(result),
        Ok(Err(err)) => {
            log::warn!("{}: {}", path.display(), err);
            DocumentOutcome::Failed {
                error: err.to_string(),
                extraction: err.is_extraction_failure(),
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!("{}: worker panicked: {}", path.display(), message);
            DocumentOutcome::Failed {
                error: format!("panic during conversion: {}", message),
                extraction: false,
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
