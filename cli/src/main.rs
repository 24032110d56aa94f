//! unspan CLI - structural Markdown from positioned text span dumps

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use unspan::render::{to_markdown_with_stats, JsonFormat};
use unspan::{parse_file, BatchConverter, BatchOptions, ConvertOptions, FootnoteScope, Unspan, Warning};

#[derive(Parser)]
#[command(name = "unspan")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Reconstruct structured Markdown from positioned text spans", long_about = None)]
struct Cli {
    /// Input span dump, or a directory of dumps
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file, or output directory for a directory input
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Insert `---` between pages
    #[arg(long)]
    page_breaks: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one span dump to Markdown
    #[command(alias = "md")]
    Markdown {
        /// Input span dump
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Insert `---` between pages
        #[arg(long)]
        page_breaks: bool,

        /// Include YAML frontmatter
        #[arg(short, long)]
        frontmatter: bool,

        /// Treat bold or colored body-size lines as headings
        #[arg(long, env = "UNSPAN_STYLE_HEADINGS")]
        style_headings: bool,

        /// Look for footnote definitions on other pages too
        #[arg(long)]
        footnotes_across_pages: bool,

        /// Maximum heading level (1-6)
        #[arg(long, default_value = "6")]
        max_heading: u8,
    },

    /// Convert every span dump in a directory
    Batch {
        /// Input directory
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Output directory (next to the inputs if not specified)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Number of worker threads (default: min(4, CPUs))
        #[arg(short, long, env = "UNSPAN_WORKERS")]
        workers: Option<usize>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Insert `---` between pages
        #[arg(long)]
        page_breaks: bool,
    },

    /// Print the reconstructed document tree as JSON
    Json {
        /// Input span dump
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Show statistics and warnings for one span dump
    Info {
        /// Input span dump
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

/// Flags shared by the single-document commands.
struct MarkdownFlags {
    page_breaks: bool,
    frontmatter: bool,
    style_headings: bool,
    footnotes_across_pages: bool,
    max_heading: u8,
}

impl MarkdownFlags {
    fn convert_options(&self) -> ConvertOptions {
        let scope = if self.footnotes_across_pages {
            FootnoteScope::Document
        } else {
            FootnoteScope::SamePage
        };
        ConvertOptions::new()
            .with_page_breaks(self.page_breaks)
            .with_frontmatter(self.frontmatter)
            .with_style_headings(self.style_headings)
            .with_footnote_scope(scope)
            .with_max_heading(self.max_heading)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Markdown {
            input,
            output,
            page_breaks,
            frontmatter,
            style_headings,
            footnotes_across_pages,
            max_heading,
        }) => {
            let flags = MarkdownFlags {
                page_breaks,
                frontmatter,
                style_headings,
                footnotes_across_pages,
                max_heading,
            };
            cmd_markdown(&input, output.as_deref(), &flags)
        }
        Some(Commands::Batch {
            input,
            output,
            workers,
            recursive,
            page_breaks,
        }) => cmd_batch(&input, output.as_deref(), workers, recursive, page_breaks),
        Some(Commands::Json {
            input,
            output,
            compact,
        }) => cmd_json(&input, output.as_deref(), compact),
        Some(Commands::Info { input, json }) => cmd_info(&input, json),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => match cli.input {
            // Default behavior: a directory is a batch, a file a single document
            Some(input) if input.is_dir() => {
                cmd_batch(&input, cli.output.as_deref(), None, false, cli.page_breaks)
            }
            Some(input) => {
                let flags = MarkdownFlags {
                    page_breaks: cli.page_breaks,
                    frontmatter: false,
                    style_headings: false,
                    footnotes_across_pages: false,
                    max_heading: 6,
                };
                cmd_markdown(&input, cli.output.as_deref(), &flags)
            }
            None => {
                println!("{}", "Usage: unspan <INPUT> [OUTPUT]".yellow());
                println!("       unspan --help for more information");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_markdown(
    input: &Path,
    output: Option<&Path>,
    flags: &MarkdownFlags,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = parse_file(input)?;
    let report = unspan::convert_with_report(&document, &flags.convert_options())?;

    for warning in &report.warnings {
        eprintln!("{} {}", "warning:".yellow(), warning);
    }

    if let Some(path) = output {
        fs::write(path, &report.content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", report.content);
    }

    Ok(())
}

fn cmd_batch(
    input: &Path,
    output: Option<&Path>,
    workers: Option<usize>,
    recursive: bool,
    page_breaks: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut batch = BatchOptions::new().with_recursive(recursive);
    if let Some(n) = workers {
        batch = batch.with_workers(n);
    }
    let options = ConvertOptions::new().with_page_breaks(page_breaks);

    let collector = BatchConverter::new(options.clone(), batch.clone());
    let paths = collector.collect_inputs(input)?;
    if paths.is_empty() {
        println!("{} no span dumps found in {}", "Nothing to do:".yellow(), input.display());
        return Ok(());
    }

    println!(
        "{} {} documents with {} workers",
        "Converting".cyan().bold(),
        paths.len().to_string().cyan(),
        batch.workers
    );

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let progress = pb.clone();
    let batch = batch.with_progress(move |path, _, _| {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        progress.set_message(name);
        progress.inc(1);
    });

    let report = BatchConverter::new(options, batch).convert_paths(paths)?;
    pb.finish_and_clear();

    let output_dir = output.unwrap_or(input);
    let written = report.write_outputs(input, output_dir)?;
    log::debug!("wrote {} files below {}", written.len(), output_dir.display());

    let failures = report.failures();
    if !failures.is_empty() {
        println!("\n{}", "Failed:".red().bold());
        for (path, error) in &failures {
            println!("  {} {}: {}", "✗".red(), path.display(), error);
        }
    }

    println!(
        "\n{} {}/{}",
        "Converted".green().bold(),
        report.succeeded(),
        report.total()
    );

    Ok(())
}

fn cmd_json(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = Unspan::new().load(input)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let json = result.to_json(format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_info(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let document = parse_file(input)?;
    let span_count = document.span_count();
    let result = Unspan::new().reconstruct(document)?;
    let reconstruction = result.reconstruction();
    let rendered = to_markdown_with_stats(result.document(), &Default::default())?;
    let metadata = &reconstruction.document.metadata;

    if json {
        let report = serde_json::json!({
            "file": input.display().to_string(),
            "metadata": metadata,
            "spans": span_count,
            "layout": reconstruction.statistics,
            "content": rendered.stats,
            "removed": reconstruction.repetition,
            "warnings": reconstruction.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), metadata.page_count);
    println!("{}: {}", "Spans".bold(), span_count);

    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }
    if let Some(ref created) = metadata.created {
        println!("{}: {}", "Created".bold(), created);
    }

    let statistics = &reconstruction.statistics;
    println!();
    println!("{}", "Layout".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}pt", "Body size".bold(), statistics.body_size);
    let sizes: Vec<String> = statistics.heading_sizes.iter().map(|s| format!("{}pt", s)).collect();
    println!(
        "{}: {}",
        "Heading sizes".bold(),
        if sizes.is_empty() { "none".to_string() } else { sizes.join(", ") }
    );
    let max_columns = statistics.page_columns.values().map(|c| c.len()).max().unwrap_or(0);
    println!("{}: {}", "Max columns".bold(), max_columns);

    let stats = &rendered.stats;
    let repetition = &reconstruction.repetition;
    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Headings".bold(), stats.heading_count);
    println!("{}: {}", "Paragraphs".bold(), stats.paragraph_count);
    println!("{}: {}", "List items".bold(), stats.list_item_count);
    println!("{}: {}", "Tables".bold(), stats.table_count);
    println!("{}: {}", "Code blocks".bold(), stats.code_block_count);
    println!("{}: {}", "Footnotes".bold(), stats.footnote_count);
    println!(
        "{}: {} headers, {} footers, {} page numbers",
        "Removed".bold(),
        repetition.removed_headers,
        repetition.removed_footers,
        repetition.removed_page_numbers
    );
    println!("{}: {}", "Words".bold(), stats.word_count);
    println!("{}: {}", "Characters".bold(), stats.char_count);

    let warnings = result.warnings();
    if !warnings.is_empty() {
        println!();
        println!("{}", "Warnings".yellow().bold());
        println!("{}", "─".repeat(40).dimmed());
        for warning in warnings {
            println!("  {} {}", warning_tag(warning).yellow(), warning);
        }
    }

    Ok(())
}

fn warning_tag(warning: &Warning) -> &'static str {
    match warning {
        Warning::AmbiguousTable { .. } => "[table]",
        Warning::UnresolvedFootnote { .. } => "[footnote]",
        Warning::EncodingAnomaly { .. } => "[encoding]",
    }
}

fn cmd_version() {
    println!("{} {}", "unspan".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Structural Markdown reconstruction from text spans");
    println!();
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_flags_map_onto_options() {
        let flags = MarkdownFlags {
            page_breaks: true,
            frontmatter: false,
            style_headings: true,
            footnotes_across_pages: true,
            max_heading: 3,
        };
        let options = flags.convert_options();
        assert!(options.render.page_breaks);
        assert!(options.parse.classifier.style_headings);
        assert_eq!(options.parse.footnotes.scope, FootnoteScope::Document);
        assert_eq!(options.render.max_heading_level, 3);
    }

    #[test]
    fn test_cli_parses_batch() {
        let cli = Cli::try_parse_from(["unspan", "batch", "dumps", "--workers", "2", "-r"]).unwrap();
        match cli.command {
            Some(Commands::Batch {
                workers, recursive, ..
            }) => {
                assert_eq!(workers, Some(2));
                assert!(recursive);
            }
            _ => panic!("expected batch command"),
        }
    }

    #[test]
    fn test_batch_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let dump = r#"{"pages": [{"number": 1, "width": 612, "height": 792,
            "spans": [{"text": "Hello", "bbox": [72, 100, 100, 110], "font": "Helvetica", "size": 10}]}]}"#;
        fs::write(dir.path().join("a.json"), dump).unwrap();
        let out = tempfile::tempdir().unwrap();

        cmd_batch(dir.path(), Some(out.path()), Some(1), false, false).unwrap();
        assert_eq!(fs::read_to_string(out.path().join("a.md")).unwrap(), "Hello");
    }
}
