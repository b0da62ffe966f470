//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::batch::BatchRunner::with_progress`] to receive events as the
//! runner walks the corpus. The CLI renders them as a progress bar; a
//! service embedding the library might forward them to its own telemetry.
//!
//! # Example
//!
//! ```rust
//! use pdf2tei::BatchProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, position: usize, total: usize, path: &Path) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{position}/{total}] {}", path.display());
//!     }
//! }
//! ```

use crate::batch::{RunSummary, SkipReason};
use std::path::Path;
use std::sync::Arc;

/// Called by the batch runner as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `position` is 1-indexed over the whole enumeration.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after enumeration, before any document is examined.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called for documents that need no work.
    fn on_document_skipped(&self, position: usize, total: usize, path: &Path, reason: SkipReason) {
        let _ = (position, total, path, reason);
    }

    /// Called just before a document is sent for conversion.
    fn on_document_start(&self, position: usize, total: usize, path: &Path) {
        let _ = (position, total, path);
    }

    /// Called when a document's artifacts have been written.
    fn on_document_complete(&self, position: usize, total: usize, path: &Path) {
        let _ = (position, total, path);
    }

    /// Called when a document fails.
    fn on_document_error(&self, position: usize, total: usize, path: &Path, error: &str) {
        let _ = (position, total, path, error);
    }

    /// Called after each successful flush.
    fn on_checkpoint(&self, files: usize, message: &str) {
        let _ = (files, message);
    }

    /// Called once after the last document.
    fn on_batch_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored by [`crate::batch::BatchRunner`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
