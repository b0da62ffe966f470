//! Output-path derivation for feature artifacts.
//!
//! Artifacts live next to their source document:
//!
//! ```text
//! <doc-dir>/<id>.pdf
//! <doc-dir>/features/tei-xml-<tag>/<id>.xml
//! <doc-dir>/features/markdown-<tag>/<id>.md
//! ```
//!
//! Anything else reading these artifacts depends on this exact naming, so
//! the directory and extension strings below are part of the public contract.

use crate::error::Pdf2TeiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the directory that holds every feature kind.
pub const FEATURES_DIR: &str = "features";

/// The two artifacts a conversion can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Raw GROBID TEI XML.
    TeiXml,
    /// Sanitised Markdown rendered from the TEI.
    Markdown,
}

impl FeatureKind {
    /// Directory name for this kind under a given tag, e.g. `tei-xml-grobid`.
    pub fn dir_name(&self, tag: &str) -> String {
        match self {
            FeatureKind::TeiXml => format!("tei-xml-{tag}"),
            FeatureKind::Markdown => format!("markdown-{tag}"),
        }
    }

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FeatureKind::TeiXml => ".xml",
            FeatureKind::Markdown => ".md",
        }
    }
}

/// Stable document id: the source file name without its final extension.
pub fn document_id(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<base>/features/<feature_dir>/<document_id><ext>`, creating the
/// containing directory if it is missing.
///
/// Only filesystem errors from directory creation are reported.
pub fn feature_path(
    base: &Path,
    feature_dir: &str,
    document_id: &str,
    ext: &str,
) -> Result<PathBuf, Pdf2TeiError> {
    let dir = base.join(FEATURES_DIR).join(feature_dir);
    std::fs::create_dir_all(&dir).map_err(|e| Pdf2TeiError::OutputWriteFailed {
        path: dir.clone(),
        source: e,
    })?;
    Ok(dir.join(format!("{document_id}{ext}")))
}

/// Standard-layout path of one artifact kind for a source document.
pub fn artifact_path(source: &Path, kind: FeatureKind, tag: &str) -> Result<PathBuf, Pdf2TeiError> {
    feature_path(
        source_dir(source),
        &kind.dir_name(tag),
        &document_id(source),
        kind.extension(),
    )
}

fn source_dir(source: &Path) -> &Path {
    source.parent().unwrap_or_else(|| Path::new(""))
}

/// Where a conversion writes its TEI and Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub tei: PathBuf,
    pub markdown: PathBuf,
}

impl ArtifactPaths {
    /// Standard layout under the source's own directory.
    pub fn standard(source: &Path, tag: &str) -> Result<Self, Pdf2TeiError> {
        Ok(Self {
            tei: artifact_path(source, FeatureKind::TeiXml, tag)?,
            markdown: artifact_path(source, FeatureKind::Markdown, tag)?,
        })
    }

    /// Both paths derived from an explicit override by swapping the extension:
    /// `out/paper.md` → `out/paper.tei.xml` + `out/paper.md`.
    pub fn from_override(path: &Path) -> Self {
        Self {
            tei: path.with_extension("tei.xml"),
            markdown: path.with_extension("md"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dir_names_embed_tag() {
        assert_eq!(FeatureKind::TeiXml.dir_name("grobid"), "tei-xml-grobid");
        assert_eq!(FeatureKind::Markdown.dir_name("v2"), "markdown-v2");
    }

    #[test]
    fn document_id_keeps_inner_dots() {
        assert_eq!(document_id(Path::new("a/b/2301.00001.pdf")), "2301.00001");
        assert_eq!(document_id(Path::new("paper.pdf")), "paper");
    }

    #[test]
    fn feature_path_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let p = feature_path(tmp.path(), "markdown-grobid", "2301.00001", ".md").unwrap();
        assert_eq!(p, tmp.path().join("features/markdown-grobid/2301.00001.md"));
        assert!(p.parent().unwrap().is_dir());
        assert!(!p.exists());
    }

    #[test]
    fn feature_path_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let a = feature_path(tmp.path(), "tei-xml-grobid", "x", ".xml").unwrap();
        let b = feature_path(tmp.path(), "tei-xml-grobid", "x", ".xml").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn standard_paths_live_beside_source() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("2301.00001").join("2301.00001.pdf");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();

        let paths = ArtifactPaths::standard(&source, "grobid").unwrap();
        let doc_dir = tmp.path().join("2301.00001");
        assert_eq!(
            paths.tei,
            doc_dir.join("features/tei-xml-grobid/2301.00001.xml")
        );
        assert_eq!(
            paths.markdown,
            doc_dir.join("features/markdown-grobid/2301.00001.md")
        );
    }

    #[test]
    fn override_swaps_extension() {
        let paths = ArtifactPaths::from_override(Path::new("out/paper.md"));
        assert_eq!(paths.tei, PathBuf::from("out/paper.tei.xml"));
        assert_eq!(paths.markdown, PathBuf::from("out/paper.md"));

        let paths = ArtifactPaths::from_override(Path::new("out/paper"));
        assert_eq!(paths.tei, PathBuf::from("out/paper.tei.xml"));
    }
}
