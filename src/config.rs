//! Configuration types for PDF → TEI → Markdown conversion.
//!
//! Two structs split the knobs along the two entry points:
//!
//! * [`ConverterConfig`] — where GROBID lives, how long to wait for it, which
//!   stylesheet renders TEI to Markdown, and how aggressive the gibberish
//!   filter is. Used by [`crate::convert::Converter`].
//! * [`BatchConfig`] — tag, checkpoint cadence and failure policy for a
//!   corpus run. Used by [`crate::batch::BatchRunner`].
//!
//! Both are built through builders whose `build()` validates. Nothing in the
//! library reads the process environment on its own; [`ServiceConfig::from_env`]
//! exists for callers that want the `GROBID_HOST` convention.

use crate::error::Pdf2TeiError;
use crate::pipeline::sanitize::DEFAULT_GIBBERISH_CUTOFF;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Port GROBID listens on. Not configurable.
pub const GROBID_PORT: u16 = 8070;

/// Default tag embedded in feature directory names.
pub const DEFAULT_TAG: &str = "grobid";

/// Upper bound on a single GROBID call, in seconds.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 300;

/// Documents examined between two checkpoint flushes.
pub const DEFAULT_CHECKPOINT_CADENCE: usize = 5;

/// Environment variable consulted by [`ServiceConfig::from_env`].
pub const GROBID_HOST_ENV: &str = "GROBID_HOST";

/// Where the GROBID service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Host name or address. Default: `localhost`.
    pub host: String,

    /// Listening port. Always [`GROBID_PORT`] unless a test points the
    /// client somewhere else.
    pub port: u16,

    /// Per-request timeout in seconds. Default: 300.
    ///
    /// Full-text extraction of a long paper on a cold GROBID can take
    /// minutes; anything beyond five is treated as a hung service.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: GROBID_PORT,
            timeout_secs: DEFAULT_SERVICE_TIMEOUT_SECS,
        }
    }
}

impl ServiceConfig {
    /// Default config with `host` taken from `GROBID_HOST` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var(GROBID_HOST_ENV) {
            if !host.trim().is_empty() {
                config.host = host.trim().to_string();
            }
        }
        config
    }

    /// `http://<host>:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Configuration for converting a single document.
///
/// # Example
/// ```rust
/// use pdf2tei::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .host("grobid.internal")
///     .timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.service.base_url(), "http://grobid.internal:8070");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub service: ServiceConfig,

    /// TEI → Markdown rule set loaded on every Markdown conversion.
    /// `None` uses the stylesheet compiled into the crate.
    pub stylesheet_path: Option<PathBuf>,

    /// Minimum line length (in characters) before the token-sparsity
    /// heuristic may drop a line. Default: 2000.
    pub gibberish_cutoff: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            stylesheet_path: None,
            gibberish_cutoff: DEFAULT_GIBBERISH_CUTOFF,
        }
    }
}

impl ConverterConfig {
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.config.service = service;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.service.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.service.port = port;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.service.timeout_secs = secs;
        self
    }

    pub fn stylesheet_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stylesheet_path = Some(path.into());
        self
    }

    pub fn gibberish_cutoff(mut self, cutoff: usize) -> Self {
        self.config.gibberish_cutoff = cutoff;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, Pdf2TeiError> {
        let c = &self.config;
        if c.service.host.trim().is_empty() {
            return Err(Pdf2TeiError::InvalidConfig(
                "GROBID host must not be empty".into(),
            ));
        }
        if c.service.timeout_secs == 0 {
            return Err(Pdf2TeiError::InvalidConfig(
                "Service timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for a corpus run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Label embedded in feature directory names. Default: `grobid`.
    pub tag: String,

    /// Flush pending artifacts every N documents examined. Default: 5.
    ///
    /// Counts enumeration positions, not conversions: a run over a mostly
    /// converted corpus still flushes on the same positions. Killing the
    /// process loses at most this many documents' worth of artifacts.
    pub checkpoint_cadence: usize,

    /// Re-fetch TEI from GROBID even when it already exists. Default: true.
    pub regenerate_markup: bool,

    /// Extension (without dot) of source documents. Default: `pdf`.
    pub source_extension: String,

    /// Directory name marking staged uploads that are not corpus members.
    /// Default: `source`.
    pub staged_dir_name: String,

    /// Abort the run on the first failing document. Default: false.
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            checkpoint_cadence: DEFAULT_CHECKPOINT_CADENCE,
            regenerate_markup: true,
            source_extension: "pdf".to_string(),
            staged_dir_name: "source".to_string(),
            fail_fast: false,
        }
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tag = tag.into();
        self
    }

    pub fn checkpoint_cadence(mut self, n: usize) -> Self {
        self.config.checkpoint_cadence = n;
        self
    }

    pub fn regenerate_markup(mut self, v: bool) -> Self {
        self.config.regenerate_markup = v;
        self
    }

    pub fn source_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.source_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn staged_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.staged_dir_name = name.into();
        self
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.config.fail_fast = v;
        self
    }

    pub fn build(self) -> Result<BatchConfig, Pdf2TeiError> {
        let c = &self.config;
        if c.checkpoint_cadence == 0 {
            return Err(Pdf2TeiError::InvalidConfig(
                "Checkpoint cadence must be ≥ 1".into(),
            ));
        }
        validate_tag(&c.tag)?;
        if c.source_extension.is_empty() {
            return Err(Pdf2TeiError::InvalidConfig(
                "Source extension must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// A tag ends up as part of a directory name, so it must be a single
/// non-empty path component.
pub fn validate_tag(tag: &str) -> Result<(), Pdf2TeiError> {
    if tag.is_empty() || tag.contains(['/', '\\']) || tag == "." || tag == ".." {
        return Err(Pdf2TeiError::InvalidConfig(format!(
            "Tag must be a plain directory-name fragment, got {tag:?}"
        )));
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Final product of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// TEI XML followed by the Markdown transform. (default)
    #[default]
    Markdown,
    /// Stop once the TEI XML is persisted.
    Tei,
}
