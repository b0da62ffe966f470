//! GROBID interaction: upload a PDF and receive full-text TEI XML.
//!
//! The conversion code talks to GROBID only through [`MarkupService`], so
//! tests (and alternative parsers) can substitute an in-process fake without
//! a network round-trip.
//!
//! ## No retries
//!
//! A non-200 answer is a hard failure for that document. Resuming is cheap
//! because the batch runner skips documents that already have Markdown, so
//! the caller simply re-runs.

use crate::config::ServiceConfig;
use crate::error::Pdf2TeiError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// GROBID endpoint for full-document extraction.
pub const FULLTEXT_ENDPOINT: &str = "/api/processFulltextDocument";

/// Longest slice of an error body kept in [`Pdf2TeiError::ServiceFailure`].
const MAX_ERROR_BODY: usize = 500;

/// Anything that turns PDF bytes into TEI XML.
#[async_trait]
pub trait MarkupService: Send + Sync {
    /// Convert `pdf` (the bytes of `document`) into TEI XML.
    ///
    /// `document` identifies the upload in the request and in error messages.
    async fn process_fulltext(&self, document: &Path, pdf: Vec<u8>) -> Result<String, Pdf2TeiError>;
}

/// HTTP client for a GROBID server.
#[derive(Debug, Clone)]
pub struct GrobidClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl GrobidClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, Pdf2TeiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Pdf2TeiError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.base_url(), FULLTEXT_ENDPOINT),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, document: &Path, e: reqwest::Error) -> Pdf2TeiError {
        if e.is_timeout() {
            Pdf2TeiError::ServiceTimeout {
                path: document.to_path_buf(),
                secs: self.timeout_secs,
            }
        } else {
            Pdf2TeiError::ServiceUnavailable {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl MarkupService for GrobidClient {
    async fn process_fulltext(
        &self,
        document: &Path,
        pdf: Vec<u8>,
    ) -> Result<String, Pdf2TeiError> {
        let file_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let size = pdf.len();
        let part = Part::bytes(pdf)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| Pdf2TeiError::Internal(format!("Invalid multipart mime type: {e}")))?;
        let form = Form::new().part("input", part);

        info!("Submitting {} ({} bytes) to {}", document.display(), size, self.endpoint);
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/xml")
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(document, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Pdf2TeiError::ServiceFailure {
                path: document.to_path_buf(),
                status: status.as_u16(),
                detail: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let tei = response
            .text()
            .await
            .map_err(|e| self.transport_error(document, e))?;

        debug!(
            "GROBID returned {} bytes for {} in {}ms",
            tei.len(),
            document.display(),
            start.elapsed().as_millis()
        );
        Ok(tei)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_host_and_fixed_port() {
        let client = GrobidClient::new(&ServiceConfig {
            host: "grobid".into(),
            ..ServiceConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://grobid:8070/api/processFulltextDocument"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé\u{2026}");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn unreachable_service_reports_url() {
        // Port 9 (discard) on localhost is closed on any sane test host.
        let client = GrobidClient::new(&ServiceConfig {
            host: "127.0.0.1".into(),
            port: 9,
            timeout_secs: 5,
        })
        .unwrap();
        let err = client
            .process_fulltext(Path::new("x.pdf"), b"%PDF-1.4".to_vec())
            .await
            .unwrap_err();
        match err {
            Pdf2TeiError::ServiceUnavailable { url, .. } => {
                assert!(url.starts_with("http://127.0.0.1:9/"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
