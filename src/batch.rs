//! Incremental, checkpointed conversion of a whole corpus.
//!
//! ## Why checkpoints?
//!
//! Committing after every document floods the history; committing once at
//! the end loses everything when a long run dies halfway. The runner instead
//! flushes pending artifacts every `checkpoint_cadence` documents (counted by
//! enumeration position, whether or not they needed work) and once more
//! after the last one. An interrupted run loses at most one cadence worth of
//! conversions, and re-running is cheap because documents that already have
//! Markdown under the tag are skipped without touching GROBID.
//!
//! ## Failure policy
//!
//! By default a failing document is logged, recorded in the
//! [`RunSummary`], and the run moves on. With `fail_fast` the first failure
//! aborts the run instead; artifacts pending since the last checkpoint are
//! then left on disk unflushed.

use crate::checkpoint::{CheckpointSink, CHECKPOINT_MESSAGE, FINAL_CHECKPOINT_MESSAGE};
use crate::config::BatchConfig;
use crate::convert::{ConversionOutcome, ConversionRequest, Converter};
use crate::error::{DocumentError, Pdf2TeiError};
use crate::layout::{artifact_path, document_id, FeatureKind};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a document was not converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Markdown under this tag already exists.
    AlreadyConverted,
    /// Lives under the staged-uploads directory.
    StagedSource,
}

/// Totals for one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Documents enumerated (every position, skipped ones included).
    pub examined: usize,
    pub converted: usize,
    pub skipped_existing: usize,
    pub skipped_staged: usize,
    /// Successful flushes, the final one included.
    pub checkpoints: usize,
    pub artifacts_persisted: usize,
    pub failures: Vec<DocumentError>,
    pub duration_ms: u64,
}

impl RunSummary {
    /// Documents a conversion was attempted for.
    pub fn attempted(&self) -> usize {
        self.converted + self.failures.len()
    }

    /// `Err(PartialFailure)` if any document failed.
    pub fn into_result(self) -> Result<Self, Pdf2TeiError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Pdf2TeiError::PartialFailure {
                failed: self.failures.len(),
                attempted: self.attempted(),
            })
        }
    }
}

enum DocumentOutcome {
    Skipped(SkipReason),
    Converted(ConversionOutcome),
}

/// Walks a corpus and converts whatever is missing.
pub struct BatchRunner {
    converter: Converter,
    sink: Arc<dyn CheckpointSink>,
    config: BatchConfig,
    progress: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(converter: Converter, sink: Arc<dyn CheckpointSink>, config: BatchConfig) -> Self {
        Self {
            converter,
            sink,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Convert every pending document under `corpus_root`.
    ///
    /// # Errors
    /// * [`Pdf2TeiError::DiscoveryFailed`] — the corpus cannot be walked
    /// * [`Pdf2TeiError::CheckpointFailed`] — a flush failed; earlier
    ///   checkpoints stay durable
    /// * any conversion error, when `fail_fast` is set
    pub async fn run(&self, corpus_root: &Path) -> Result<RunSummary, Pdf2TeiError> {
        let start = Instant::now();
        let documents = discover_documents(corpus_root, &self.config.source_extension)?;
        let total = documents.len();
        info!(
            "Found {} .{} documents under {}",
            total,
            self.config.source_extension,
            corpus_root.display()
        );
        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total);
        }

        let mut summary = RunSummary::default();
        let mut pending: Vec<PathBuf> = Vec::new();

        for (idx, pdf) in documents.iter().enumerate() {
            let position = idx + 1;
            summary.examined += 1;

            match self.process_document(corpus_root, pdf, position, total).await {
                Ok(DocumentOutcome::Skipped(reason)) => {
                    match reason {
                        SkipReason::AlreadyConverted => summary.skipped_existing += 1,
                        SkipReason::StagedSource => summary.skipped_staged += 1,
                    }
                    if let Some(ref cb) = self.progress {
                        cb.on_document_skipped(position, total, pdf, reason);
                    }
                }
                Ok(DocumentOutcome::Converted(outcome)) => {
                    info!("Generated conversions for {}", pdf.display());
                    pending.extend(outcome.artifacts());
                    summary.converted += 1;
                    if let Some(ref cb) = self.progress {
                        cb.on_document_complete(position, total, pdf);
                    }
                }
                Err(e) => {
                    if let Some(ref cb) = self.progress {
                        cb.on_document_error(position, total, pdf, &e.to_string());
                    }
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    warn!("Skipping {} after failure: {}", pdf.display(), e);
                    summary.failures.push(DocumentError {
                        path: pdf.clone(),
                        document_id: document_id(pdf),
                        detail: e.to_string(),
                    });
                }
            }

            if position % self.config.checkpoint_cadence == 0 && !pending.is_empty() {
                self.flush(&mut pending, CHECKPOINT_MESSAGE, &mut summary)
                    .await?;
            }
        }

        if !pending.is_empty() {
            self.flush(&mut pending, FINAL_CHECKPOINT_MESSAGE, &mut summary)
                .await?;
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch complete: {} converted, {} already converted, {} staged, {} failed, \
             {} checkpoints",
            summary.converted,
            summary.skipped_existing,
            summary.skipped_staged,
            summary.failures.len(),
            summary.checkpoints
        );
        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(&summary);
        }
        Ok(summary)
    }

    async fn process_document(
        &self,
        corpus_root: &Path,
        pdf: &Path,
        position: usize,
        total: usize,
    ) -> Result<DocumentOutcome, Pdf2TeiError> {
        if is_staged_source(corpus_root, pdf, &self.config.staged_dir_name) {
            debug!("Skipping staged source {}", pdf.display());
            return Ok(DocumentOutcome::Skipped(SkipReason::StagedSource));
        }

        let markdown = artifact_path(pdf, FeatureKind::Markdown, &self.config.tag)?;
        if markdown.exists() {
            debug!("Already converted: {}", markdown.display());
            return Ok(DocumentOutcome::Skipped(SkipReason::AlreadyConverted));
        }

        if let Some(ref cb) = self.progress {
            cb.on_document_start(position, total, pdf);
        }
        let request = ConversionRequest::new(pdf)
            .tag(self.config.tag.clone())
            .regenerate_markup(self.config.regenerate_markup);
        let outcome = self.converter.convert(&request).await?;
        Ok(DocumentOutcome::Converted(outcome))
    }

    async fn flush(
        &self,
        pending: &mut Vec<PathBuf>,
        message: &str,
        summary: &mut RunSummary,
    ) -> Result<(), Pdf2TeiError> {
        self.sink.persist(pending, message).await?;
        summary.checkpoints += 1;
        summary.artifacts_persisted += pending.len();
        if let Some(ref cb) = self.progress {
            cb.on_checkpoint(pending.len(), message);
        }
        pending.clear();
        Ok(())
    }
}

/// Every `*.<extension>` file under `root`, recursively, sorted by path.
pub fn discover_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>, Pdf2TeiError> {
    let discovery_err = |detail: String| Pdf2TeiError::DiscoveryFailed {
        root: root.to_path_buf(),
        detail,
    };

    if !root.is_dir() {
        return Err(discovery_err("not a directory".into()));
    }

    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        extension
    );
    let mut documents = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| discovery_err(e.to_string()))? {
        let path = entry.map_err(|e| discovery_err(e.to_string()))?;
        if path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

/// True when a directory between `root` and `path` is named `staged_dir`.
pub fn is_staged_source(root: &Path, path: &Path, staged_dir: &str) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .parent()
        .map(|dir| {
            dir.components()
                .any(|c| matches!(c, Component::Normal(name) if name == staged_dir))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn discovery_is_recursive_and_sorted() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("b/2301.00002.pdf"));
        touch(&root.join("a/2301.00001.pdf"));
        touch(&root.join("top.pdf"));
        touch(&root.join("a/notes.txt"));

        let docs = discover_documents(root, "pdf").unwrap();
        assert_eq!(
            docs,
            vec![
                root.join("a/2301.00001.pdf"),
                root.join("b/2301.00002.pdf"),
                root.join("top.pdf"),
            ]
        );
    }

    #[test]
    fn discovery_rejects_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = discover_documents(&tmp.path().join("nope"), "pdf").unwrap_err();
        assert!(matches!(err, Pdf2TeiError::DiscoveryFailed { .. }));
    }

    #[test]
    fn staged_detection_uses_directory_components() {
        let root = Path::new("data/papers");
        assert!(is_staged_source(
            root,
            Path::new("data/papers/x/source/x.pdf"),
            "source"
        ));
        assert!(!is_staged_source(
            root,
            Path::new("data/papers/x/x.pdf"),
            "source"
        ));
        // the file name itself never counts
        assert!(!is_staged_source(
            root,
            Path::new("data/papers/x/source.pdf"),
            "source"
        ));
        // nor does a component above the corpus root
        assert!(!is_staged_source(
            Path::new("source/papers"),
            Path::new("source/papers/x/x.pdf"),
            "source"
        ));
        // a partial match is not a match
        assert!(!is_staged_source(
            root,
            Path::new("data/papers/opensource/x.pdf"),
            "source"
        ));
    }

    #[test]
    fn summary_into_result() {
        let ok = RunSummary {
            converted: 3,
            ..Default::default()
        };
        assert!(ok.into_result().is_ok());

        let failed = RunSummary {
            converted: 2,
            failures: vec![DocumentError {
                path: PathBuf::from("x.pdf"),
                document_id: "x".into(),
                detail: "HTTP 500".into(),
            }],
            ..Default::default()
        };
        match failed.into_result() {
            Err(Pdf2TeiError::PartialFailure { failed, attempted }) => {
                assert_eq!(failed, 1);
                assert_eq!(attempted, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
