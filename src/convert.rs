//! Single-document conversion: PDF → TEI XML → sanitised Markdown.
//!
//! ## Regeneration policy
//!
//! TEI is expensive (a GROBID round-trip), Markdown is cheap (a local
//! transform). So the TEI step is skipped when the artifact already exists
//! and `regenerate_markup` is off, while Markdown is always re-rendered when
//! requested. Whether a document needs converting at all is decided by the
//! batch runner, not here.
//!
//! Writes are whole-file and atomic; nothing is ever deleted.

use crate::config::{ConverterConfig, OutputFormat, DEFAULT_TAG};
use crate::error::Pdf2TeiError;
use crate::layout::{document_id, ArtifactPaths};
use crate::pipeline::sanitize::{sanitize_markdown, DroppedLine};
use crate::pipeline::service::{GrobidClient, MarkupService};
use crate::pipeline::transform;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// What to convert and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub tag: String,
    /// Write `<override>.tei.xml` / `<override>.md` instead of the
    /// standard feature layout.
    pub output_override: Option<PathBuf>,
    /// Re-fetch TEI even if it already exists.
    pub regenerate_markup: bool,
}

impl ConversionRequest {
    /// Markdown under the default tag, regenerating TEI.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            format: OutputFormat::default(),
            tag: DEFAULT_TAG.to_string(),
            output_override: None,
            regenerate_markup: true,
        }
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn output_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_override = Some(path.into());
        self
    }

    pub fn regenerate_markup(mut self, v: bool) -> Self {
        self.regenerate_markup = v;
        self
    }
}

/// What a conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutcome {
    pub document_id: String,
    pub tei_path: PathBuf,
    /// Set when Markdown was requested and written.
    pub markdown_path: Option<PathBuf>,
    /// False when an existing TEI file was reused.
    pub tei_fetched: bool,
    /// Lines removed by the gibberish filter.
    pub dropped_lines: Vec<DroppedLine>,
    pub duration_ms: u64,
}

impl ConversionOutcome {
    /// Every artifact path touched by this conversion.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let Some(ref md) = self.markdown_path {
            paths.push(md.clone());
        }
        paths.push(self.tei_path.clone());
        paths
    }
}

/// Converts documents through a [`MarkupService`].
#[derive(Clone)]
pub struct Converter {
    service: Arc<dyn MarkupService>,
    config: ConverterConfig,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("service", &"<dyn MarkupService>")
            .field("config", &self.config)
            .finish()
    }
}

impl Converter {
    pub fn new(service: Arc<dyn MarkupService>, config: ConverterConfig) -> Self {
        Self { service, config }
    }

    /// A converter backed by a real GROBID server at `config.service`.
    pub fn grobid(config: ConverterConfig) -> Result<Self, Pdf2TeiError> {
        let client = GrobidClient::new(&config.service)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert one document.
    ///
    /// # Errors
    /// * [`Pdf2TeiError::FileNotFound`] — `request.source` does not exist
    /// * [`Pdf2TeiError::ServiceFailure`] (and the other service errors) —
    ///   GROBID did not return TEI; no artifact is written
    /// * [`Pdf2TeiError::MissingAsset`] — Markdown requested but the
    ///   stylesheet is absent (the TEI has already been persisted by then)
    pub async fn convert(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, Pdf2TeiError> {
        let start = Instant::now();
        let source = request.source.as_path();
        if !source.is_file() {
            return Err(Pdf2TeiError::FileNotFound {
                path: source.to_path_buf(),
            });
        }

        // ── Step 1: Resolve artifact paths ───────────────────────────────────
        let paths = match request.output_override {
            Some(ref p) => ArtifactPaths::from_override(p),
            None => ArtifactPaths::standard(source, &request.tag)?,
        };
        info!("Processing {}", source.display());
        debug!("TEI output will go to {}", paths.tei.display());
        debug!("Markdown output will go to {}", paths.markdown.display());

        // ── Step 2: TEI via the service ──────────────────────────────────────
        let tei_fetched = request.regenerate_markup || !paths.tei.exists();
        if tei_fetched {
            let pdf = tokio::fs::read(source)
                .await
                .map_err(|e| Pdf2TeiError::ReadFailed {
                    path: source.to_path_buf(),
                    source: e,
                })?;
            let tei = self.service.process_fulltext(source, pdf).await?;
            write_artifact(&paths.tei, tei.as_bytes())?;
            info!("Saved TEI XML to {}", paths.tei.display());
        } else {
            debug!("Reusing existing TEI at {}", paths.tei.display());
        }

        // ── Step 3: Markdown via the stylesheet ──────────────────────────────
        let mut dropped_lines = Vec::new();
        let markdown_path = match request.format {
            OutputFormat::Tei => {
                info!("Output TEI XML saved at {}", paths.tei.display());
                None
            }
            OutputFormat::Markdown => {
                let stylesheet = self.config.stylesheet_path.as_deref();
                let rendered = transform::render_file(stylesheet, &paths.tei).await?;
                let sanitized = sanitize_markdown(&rendered, self.config.gibberish_cutoff);
                for dropped in &sanitized.dropped {
                    info!(
                        "Removing gibberish from {} (line {}, {:?})",
                        source.display(),
                        dropped.line_no,
                        dropped.reason
                    );
                    info!("{}", dropped.line);
                }
                write_artifact(&paths.markdown, sanitized.text.as_bytes())?;
                info!("Saved Markdown to {}", paths.markdown.display());
                dropped_lines = sanitized.dropped;
                Some(paths.markdown)
            }
        };

        Ok(ConversionOutcome {
            document_id: document_id(source),
            tei_path: paths.tei,
            markdown_path,
            tei_fetched,
            dropped_lines,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Write `contents` to `path` atomically, creating parent directories.
///
/// The bytes land in a temp file in the target directory which is then
/// renamed over `path`, so readers never observe a half-written artifact.
pub fn write_artifact(path: &Path, contents: &[u8]) -> Result<(), Pdf2TeiError> {
    let write_err = |e: std::io::Error| Pdf2TeiError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn request_defaults() {
        let r = ConversionRequest::new("a/b.pdf");
        assert_eq!(r.format, OutputFormat::Markdown);
        assert_eq!(r.tag, "grobid");
        assert!(r.regenerate_markup);
        assert!(r.output_override.is_none());
    }

    #[test]
    fn write_artifact_creates_parents_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("features/tei-xml-grobid/x.xml");
        write_artifact(&path, b"first").unwrap();
        write_artifact(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        // no temp files left behind
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn outcome_lists_markdown_then_tei() {
        let outcome = ConversionOutcome {
            document_id: "x".into(),
            tei_path: PathBuf::from("t.xml"),
            markdown_path: Some(PathBuf::from("m.md")),
            tei_fetched: true,
            dropped_lines: vec![],
            duration_ms: 0,
        };
        assert_eq!(
            outcome.artifacts(),
            vec![PathBuf::from("m.md"), PathBuf::from("t.xml")]
        );
    }
}
