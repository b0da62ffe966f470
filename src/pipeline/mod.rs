//! Pipeline stages for PDF → TEI → Markdown conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! service ──▶ transform ──▶ sanitize
//! (GROBID)    (stylesheet)   (cleanup)
//! ```
//!
//! 1. [`service`]   — upload the PDF and receive TEI XML; the only stage
//!    with network I/O
//! 2. [`transform`] — render TEI to Markdown with a declarative stylesheet
//! 3. [`sanitize`]  — collapse blank-line runs and drop extraction noise

pub mod sanitize;
pub mod service;
pub mod transform;
