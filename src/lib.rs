//! # pdf2tei
//!
//! Convert a corpus of PDFs into TEI XML and Markdown through a GROBID
//! server, incrementally, with periodic checkpoints.
//!
//! ## Why this crate?
//!
//! GROBID produces excellent structured TEI for scholarly papers, but a
//! corpus of thousands of PDFs needs more than a single request: a stable
//! on-disk layout keyed by a tag, skipping of work already done, cleanup of
//! extraction noise, and durable checkpoints so an interrupted run resumes
//! instead of starting over.
//!
//! ## Pipeline Overview
//!
//! ```text
//! <dir>/<id>.pdf
//!  │
//!  ├─ 1. Layout     resolve <dir>/features/{tei-xml,markdown}-<tag>/<id>.*
//!  ├─ 2. Service    POST to GROBID processFulltextDocument → TEI XML
//!  ├─ 3. Transform  TEI → Markdown with a declarative stylesheet
//!  ├─ 4. Sanitize   collapse blank runs, drop gibberish lines
//!  └─ 5. Batch      skip converted / staged docs, checkpoint every N
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2tei::{ConversionRequest, Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder().host("localhost").build()?;
//!     let converter = Converter::grobid(config)?;
//!     let outcome = converter
//!         .convert(&ConversionRequest::new("papers/2301.00001/2301.00001.pdf"))
//!         .await?;
//!     println!("{:?}", outcome.markdown_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | The `pdf2tei` binary (clap, anyhow, indicatif, tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2tei = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod convert;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{discover_documents, is_staged_source, BatchRunner, RunSummary, SkipReason};
pub use checkpoint::{CheckpointSink, GitCheckpoint, LogCheckpoint};
pub use config::{
    BatchConfig, BatchConfigBuilder, ConverterConfig, ConverterConfigBuilder, OutputFormat,
    ServiceConfig,
};
pub use convert::{write_artifact, ConversionOutcome, ConversionRequest, Converter};
pub use error::{DocumentError, Pdf2TeiError};
pub use layout::{artifact_path, document_id, feature_path, ArtifactPaths, FeatureKind};
pub use pipeline::sanitize::{sanitize_markdown, DropReason, DroppedLine, SanitizedText};
pub use pipeline::service::{GrobidClient, MarkupService};
pub use pipeline::transform::Stylesheet;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
