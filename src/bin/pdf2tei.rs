//! CLI binary for pdf2tei.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig` / `BatchConfig` and prints results.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2tei::config::{validate_tag, DEFAULT_CHECKPOINT_CADENCE, DEFAULT_TAG};
use pdf2tei::{
    BatchConfig, BatchProgressCallback, BatchRunner, CheckpointSink, ConversionRequest, Converter,
    ConverterConfig, GitCheckpoint, LogCheckpoint, OutputFormat, ProgressCallback, RunSummary,
    SkipReason,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the whole corpus, with a log
/// line per converted or failed document. Skips only advance the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Scanning");
        bar.set_message("Enumerating documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>5}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.set_message("");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_documents} documents"))
        ));
    }

    fn on_document_skipped(
        &self,
        _position: usize,
        _total: usize,
        _path: &Path,
        _reason: SkipReason,
    ) {
        self.bar.inc(1);
    }

    fn on_document_start(&self, _position: usize, _total: usize, path: &Path) {
        self.bar.set_message(file_name(path));
    }

    fn on_document_complete(&self, position: usize, total: usize, path: &Path) {
        self.bar.println(format!(
            "  {} {:>5}/{:<5}  {}",
            green("✓"),
            position,
            total,
            path.display()
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, position: usize, total: usize, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {:>5}/{:<5}  {}  {}",
            red("✗"),
            position,
            total,
            path.display(),
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_checkpoint(&self, files: usize, message: &str) {
        self.bar
            .println(format!("  {} {}", cyan("⚑"), dim(&format!("{message} ({files} files)"))));
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        eprintln!(
            "{} {} converted, {} already converted, {} staged{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&summary.converted.to_string()),
            summary.skipped_existing,
            summary.skipped_staged,
            if failed == 0 {
                String::new()
            } else {
                format!(", {} failed", red(&failed.to_string()))
            },
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one paper to Markdown (TEI is written alongside)
  pdf2tei convert data/papers/2301.00001/2301.00001.pdf

  # TEI only, reusing an existing TEI file if present
  pdf2tei convert --format tei --regenerate-tei false paper.pdf

  # Write to an explicit location: out.tei.xml and out.md
  pdf2tei convert paper.pdf -o out

  # Convert everything under data/papers, committing every 5 documents
  pdf2tei batch

  # Dry run without git, summary as JSON
  pdf2tei batch corpus/ --no-commit --json

LAYOUT:
  <dir>/<id>.pdf
  <dir>/features/tei-xml-<tag>/<id>.xml
  <dir>/features/markdown-<tag>/<id>.md

ENVIRONMENT VARIABLES:
  GROBID_HOST   Host running GROBID on port 8070 (default: localhost)
  RUST_LOG      Overrides the log filter (e.g. pdf2tei=debug)
"#;

/// Convert PDFs to TEI XML and Markdown through GROBID.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tei",
    version,
    about = "Convert PDFs to TEI XML and Markdown through GROBID",
    long_about = "Convert scholarly PDFs to TEI XML with a GROBID server, render the TEI to \
cleaned-up Markdown, and keep a whole corpus converted incrementally with periodic git \
checkpoints.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2TEI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2TEI_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2TEI_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a single PDF.
    Convert(ConvertArgs),
    /// Convert every pending PDF under a corpus directory.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Host running GROBID (port 8070).
    #[arg(long, env = "GROBID_HOST", default_value = "localhost")]
    grobid_host: String,

    /// Per-request GROBID timeout in seconds.
    #[arg(long, env = "PDF2TEI_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// TEI → Markdown stylesheet (JSON). Defaults to the bundled one.
    #[arg(long, env = "PDF2TEI_STYLESHEET")]
    stylesheet: Option<PathBuf>,

    /// Re-fetch TEI even if it already exists.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    regenerate_tei: bool,

    /// Feature-directory tag.
    #[arg(long, env = "PDF2TEI_TAG", default_value = DEFAULT_TAG)]
    tag: String,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF file to convert.
    input: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Write `<OUTPUT>.tei.xml` / `<OUTPUT>.md` instead of the feature layout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the conversion outcome as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Corpus root.
    #[arg(default_value = "data/papers")]
    data_path: PathBuf,

    /// Documents examined between checkpoints.
    #[arg(long, env = "PDF2TEI_CHECKPOINT_CADENCE", default_value_t = DEFAULT_CHECKPOINT_CADENCE)]
    checkpoint_cadence: usize,

    /// Abort on the first failing document.
    #[arg(long)]
    fail_fast: bool,

    /// Log checkpoints instead of committing them.
    #[arg(long)]
    no_commit: bool,

    /// `git push` after each checkpoint commit.
    #[arg(long, conflicts_with = "no_commit")]
    push: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FormatArg {
    Markdown,
    Tei,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Tei => OutputFormat::Tei,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs in batch mode.
    let json = match cli.command {
        Command::Convert(ref a) => a.json,
        Command::Batch(ref a) => a.json,
    };
    let show_progress =
        matches!(cli.command, Command::Batch(_)) && !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert(ref args) => run_convert(args, cli.quiet).await,
        Command::Batch(ref args) => run_batch(args, show_progress, cli.quiet).await,
    }
}

async fn run_convert(args: &ConvertArgs, quiet: bool) -> Result<()> {
    let converter = build_converter(&args.service)?;

    let mut request = ConversionRequest::new(&args.input)
        .format(args.format.clone().into())
        .tag(args.service.tag.clone())
        .regenerate_markup(args.service.regenerate_tei);
    if let Some(ref output) = args.output {
        request = request.output_override(output);
    }

    let outcome = converter
        .convert(&request)
        .await
        .with_context(|| format!("Conversion of {} failed", args.input.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
        );
    } else if !quiet {
        for path in outcome.artifacts() {
            println!("{}", path.display());
        }
        eprintln!(
            "{}  {}  {}ms{}",
            green("✔"),
            bold(&outcome.document_id),
            outcome.duration_ms,
            if outcome.dropped_lines.is_empty() {
                String::new()
            } else {
                dim(&format!("  ({} noisy lines dropped)", outcome.dropped_lines.len()))
            }
        );
    }
    Ok(())
}

async fn run_batch(args: &BatchArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let converter = build_converter(&args.service)?;

    let config = BatchConfig::builder()
        .tag(args.service.tag.clone())
        .checkpoint_cadence(args.checkpoint_cadence)
        .regenerate_markup(args.service.regenerate_tei)
        .fail_fast(args.fail_fast)
        .build()
        .context("Invalid batch configuration")?;

    let sink: Arc<dyn CheckpointSink> = if args.no_commit {
        Arc::new(LogCheckpoint)
    } else {
        Arc::new(GitCheckpoint::new(&args.data_path).push(args.push))
    };

    let mut runner = BatchRunner::new(converter, sink, config);
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        runner = runner.with_progress(cb);
    }

    let summary = runner
        .run(&args.data_path)
        .await
        .with_context(|| format!("Batch over {} aborted", args.data_path.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !quiet && !show_progress {
        eprintln!(
            "Examined {} documents in {}ms: {} converted, {} already converted, \
             {} staged, {} failed",
            summary.examined,
            summary.duration_ms,
            summary.converted,
            summary.skipped_existing,
            summary.skipped_staged,
            summary.failures.len()
        );
    }
    if !quiet {
        for failure in &summary.failures {
            eprintln!("  {} {}", red("✗"), failure);
        }
    }

    summary.into_result()?;
    Ok(())
}

/// Map the shared service flags to a GROBID-backed `Converter`.
fn build_converter(args: &ServiceArgs) -> Result<Converter> {
    validate_tag(&args.tag).context("Invalid --tag")?;

    let mut builder = ConverterConfig::builder()
        .host(args.grobid_host.clone())
        .timeout_secs(args.timeout);
    if let Some(ref path) = args.stylesheet {
        builder = builder.stylesheet_path(path);
    }
    let config = builder.build().context("Invalid configuration")?;
    Converter::grobid(config).context("Failed to create GROBID client")
}
