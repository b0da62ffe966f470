//! Error types for the pdf2tei library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2TeiError`] — **Fatal**: a single conversion cannot proceed
//!   (missing PDF, GROBID returned a non-200 status, stylesheet absent).
//!   Returned as `Err(Pdf2TeiError)` from [`crate::convert::Converter::convert`]
//!   and, in fail-fast mode, from [`crate::batch::BatchRunner::run`].
//!
//! * [`DocumentError`] — **Non-fatal**: one document in a batch failed but
//!   the run carried on. Stored inside [`crate::batch::RunSummary`] so
//!   callers can inspect what was skipped instead of losing the whole run
//!   to one bad PDF.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2tei library.
#[derive(Debug, Error)]
pub enum Pdf2TeiError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source PDF was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The source PDF (or a persisted TEI file) exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The corpus could not be enumerated.
    #[error("Failed to enumerate documents under '{root}': {detail}")]
    DiscoveryFailed { root: PathBuf, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// GROBID answered with anything other than HTTP 200.
    #[error("GROBID processing failed for '{path}': HTTP {status}\n{detail}")]
    ServiceFailure {
        path: PathBuf,
        status: u16,
        detail: String,
    },

    /// GROBID could not be reached at all.
    #[error(
        "GROBID service unreachable at {url}: {reason}\n\
         Is the server running? Check --grobid-host / GROBID_HOST."
    )]
    ServiceUnavailable { url: String, reason: String },

    /// GROBID did not answer within the configured bound.
    #[error("GROBID timed out after {secs}s processing '{path}'")]
    ServiceTimeout { path: PathBuf, secs: u64 },

    // ── Transform errors ──────────────────────────────────────────────────
    /// The configured TEI → Markdown stylesheet override does not exist.
    #[error(
        "Stylesheet not found: '{path}'\n\
         Check --stylesheet, or omit it to use the bundled one."
    )]
    MissingAsset { path: PathBuf },

    /// The stylesheet exists but is not a valid rule set.
    #[error("Invalid stylesheet '{path}': {detail}")]
    InvalidStylesheet { path: PathBuf, detail: String },

    /// The persisted TEI is not well-formed XML.
    #[error("Malformed TEI in '{path}': {detail}")]
    MalformedMarkup { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checkpoint sink refused to persist a batch of artifacts.
    #[error("Checkpoint '{message}' failed: {detail}")]
    CheckpointFailed { message: String, detail: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// At least one document failed during a batch run.
    ///
    /// Returned by [`crate::batch::RunSummary::into_result`] when the
    /// caller wants to treat any document failure as an error.
    #[error("{failed}/{attempted} documents failed during conversion")]
    PartialFailure { failed: usize, attempted: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document in a batch run.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("{document_id} ({path}): {detail}")]
pub struct DocumentError {
    pub path: PathBuf,
    pub document_id: String,
    pub detail: String,
}
