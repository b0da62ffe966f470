//! TEI → Markdown rendering driven by a declarative stylesheet.
//!
//! GROBID emits TEI XML. Turning that into readable Markdown is mostly a
//! matter of deciding, per element, whether it starts a paragraph, starts a
//! line, or flows inline, and what literal text surrounds it. Those decisions
//! live in a JSON stylesheet rather than in code. The default one
//! (`assets/tei2md.json`) is compiled into the crate; a pipeline can point
//! at its own file to change the rendering without a rebuild:
//!
//! ```json
//! {
//!   "skip":  ["teiHeader/encodingDesc", "facsimile"],
//!   "rules": {
//!     "titleStmt/title": { "layout": "block", "prefix": "# " },
//!     "head":            { "layout": "block", "prefix": "## ", "number_attr": "n" },
//!     "persName":        { "separator": ", " },
//!     "p":               { "layout": "block" }
//!   }
//! }
//! ```
//!
//! Selectors are element local names, optionally qualified by their
//! ancestors (`parent/name`); a selector matches when the open-element stack
//! ends with it. The longest matching selector wins. Elements without a rule
//! contribute their text inline. A `skip` match drops the whole subtree.
//!
//! A `separator` is written only between content: it is held back when the
//! element closes and emitted before the next text, or dropped when the
//! enclosing line or block ends first. Author lists use it so the last name
//! carries no trailing comma.
//!
//! The walker is streaming (quick-xml events); the document is never built
//! into a tree.

use crate::error::Pdf2TeiError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How an element is separated from its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Blank line before and after.
    Block,
    /// Starts and ends on its own line.
    Line,
    /// Flows with the surrounding text. (default)
    #[default]
    Inline,
}

/// Rendering rule for one selector.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Attribute whose value is written right after the prefix, e.g. a
    /// section number in `<head n="2.1">`.
    #[serde(default)]
    pub number_attr: Option<String>,
    /// Written after the element only if more content follows on the same
    /// line or block.
    #[serde(default)]
    pub separator: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StylesheetFile {
    #[serde(default)]
    skip: Vec<String>,
    #[serde(default)]
    rules: BTreeMap<String, Rule>,
}

/// The default stylesheet, embedded at build time.
const BUNDLED_STYLESHEET: &str = include_str!("../../assets/tei2md.json");

/// A parsed selector: element names from outermost to innermost.
type Selector = Vec<String>;

/// A loaded TEI → Markdown rule set.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    /// Sorted longest selector first so the first match is the most specific.
    rules: Vec<(Selector, Rule)>,
    skip: Vec<Selector>,
}

impl Stylesheet {
    /// Load a stylesheet from disk.
    ///
    /// # Errors
    /// * [`Pdf2TeiError::MissingAsset`] — no file at `path`
    /// * [`Pdf2TeiError::InvalidStylesheet`] — not a valid rule set
    pub fn load(path: &Path) -> Result<Self, Pdf2TeiError> {
        if !path.is_file() {
            return Err(Pdf2TeiError::MissingAsset {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| Pdf2TeiError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let sheet = Self::from_json(&raw).map_err(|detail| Pdf2TeiError::InvalidStylesheet {
            path: path.to_path_buf(),
            detail,
        })?;
        debug!(
            "Loaded stylesheet {} ({} rules, {} skips)",
            path.display(),
            sheet.rules.len(),
            sheet.skip.len()
        );
        Ok(sheet)
    }

    /// The stylesheet compiled into the crate.
    pub fn bundled() -> Result<Self, Pdf2TeiError> {
        Self::from_json(BUNDLED_STYLESHEET).map_err(|detail| Pdf2TeiError::InvalidStylesheet {
            path: PathBuf::from("<bundled>"),
            detail,
        })
    }

    /// `path` if given, otherwise the bundled stylesheet.
    pub fn resolve(path: Option<&Path>) -> Result<Self, Pdf2TeiError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::bundled(),
        }
    }

    /// Parse a stylesheet from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let file: StylesheetFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;

        let mut rules = file
            .rules
            .into_iter()
            .map(|(sel, rule)| parse_selector(&sel).map(|s| (s, rule)))
            .collect::<Result<Vec<_>, _>>()?;
        // Stable sort keeps BTreeMap order among equal lengths.
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let skip = file
            .skip
            .iter()
            .map(|sel| parse_selector(sel))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules, skip })
    }

    fn rule_for(&self, stack: &[String]) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|(sel, _)| stack.ends_with(sel))
            .map(|(_, rule)| rule)
    }

    fn skips(&self, stack: &[String]) -> bool {
        self.skip.iter().any(|sel| stack.ends_with(sel))
    }

    /// Render TEI XML to Markdown. `source` only labels errors.
    pub fn render(&self, xml: &str, source: &Path) -> Result<String, Pdf2TeiError> {
        let malformed = |detail: String| Pdf2TeiError::MalformedMarkup {
            path: source.to_path_buf(),
            detail,
        };

        let mut reader = Reader::from_str(xml);
        let mut writer = MarkdownWriter::default();
        // One entry per open element: its name and the rule applied on open.
        let mut stack: Vec<String> = Vec::new();
        let mut applied: Vec<Option<Rule>> = Vec::new();
        let mut skip_depth = 0usize;

        loop {
            let event = reader.read_event().map_err(|e| {
                malformed(format!("at byte {}: {e}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(e) => {
                    stack.push(local_name(&e));
                    if skip_depth > 0 || self.skips(&stack) {
                        skip_depth += 1;
                        applied.push(None);
                        continue;
                    }
                    let rule = self.rule_for(&stack).cloned();
                    if let Some(ref r) = rule {
                        let number = attr_value(&e, r.number_attr.as_deref()).map_err(malformed)?;
                        writer.open(r, number.as_deref());
                    }
                    applied.push(rule);
                }
                Event::Empty(e) => {
                    stack.push(local_name(&e));
                    if skip_depth == 0 && !self.skips(&stack) {
                        if let Some(r) = self.rule_for(&stack) {
                            let number =
                                attr_value(&e, r.number_attr.as_deref()).map_err(malformed)?;
                            writer.open(r, number.as_deref());
                            writer.close(r);
                        }
                    }
                    stack.pop();
                }
                Event::End(_) => {
                    stack.pop();
                    let rule = applied.pop().flatten();
                    if skip_depth > 0 {
                        skip_depth -= 1;
                        continue;
                    }
                    if let Some(ref r) = rule {
                        writer.close(r);
                    }
                }
                Event::Text(t) => {
                    if skip_depth == 0 && !stack.is_empty() {
                        let text = t.unescape().map_err(|e| malformed(e.to_string()))?;
                        writer.text(&text);
                    }
                }
                Event::CData(c) => {
                    if skip_depth == 0 && !stack.is_empty() {
                        writer.text(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(malformed(format!(
                "document ended with <{}> still open",
                stack.join("/")
            )));
        }

        Ok(writer.finish())
    }
}

/// Render the TEI file at `tei_path` with the stylesheet at
/// `stylesheet_path`, or the bundled one.
pub async fn render_file(
    stylesheet_path: Option<&Path>,
    tei_path: &Path,
) -> Result<String, Pdf2TeiError> {
    let sheet = Stylesheet::resolve(stylesheet_path)?;
    let xml = tokio::fs::read_to_string(tei_path)
        .await
        .map_err(|e| Pdf2TeiError::ReadFailed {
            path: PathBuf::from(tei_path),
            source: e,
        })?;
    sheet.render(&xml, tei_path)
}

fn parse_selector(raw: &str) -> Result<Selector, String> {
    let parts: Vec<String> = raw.split('/').map(|p| p.trim().to_string()).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(format!("invalid selector {raw:?}: empty element name"));
    }
    Ok(parts)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr_value(e: &BytesStart<'_>, name: Option<&str>) -> Result<Option<String>, String> {
    let Some(name) = name else {
        return Ok(None);
    };
    let attr = e.try_get_attribute(name).map_err(|err| err.to_string())?;
    match attr {
        Some(a) => {
            let value = a.unescape_value().map_err(|err| err.to_string())?;
            let value = value.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        None => Ok(None),
    }
}

// ── Output assembly ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MarkdownWriter {
    out: String,
    /// Separator waiting for more content on the current line or block.
    pending_separator: Option<String>,
}

impl MarkdownWriter {
    fn open(&mut self, rule: &Rule, number: Option<&str>) {
        match rule.layout {
            Layout::Block => self.break_block(),
            Layout::Line => self.break_line(),
            Layout::Inline => {
                if !rule.prefix.is_empty() || number.is_some() {
                    self.flush_separator();
                }
            }
        }
        self.out.push_str(&rule.prefix);
        if let Some(n) = number {
            self.out.push_str(n);
            self.out.push(' ');
        }
    }

    fn close(&mut self, rule: &Rule) {
        if !rule.suffix.is_empty() {
            self.pending_separator = None;
        }
        self.out.push_str(&rule.suffix);
        match rule.layout {
            Layout::Block => self.break_block(),
            Layout::Line => self.break_line(),
            Layout::Inline => {
                if !rule.separator.is_empty() {
                    self.pending_separator = Some(rule.separator.clone());
                }
            }
        }
    }

    fn flush_separator(&mut self) {
        if let Some(sep) = self.pending_separator.take() {
            self.trim_trailing_spaces();
            self.out.push_str(&sep);
        }
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn trim_trailing_spaces(&mut self) {
        let len = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(len);
    }

    fn break_block(&mut self) {
        self.pending_separator = None;
        let len = self.out.trim_end().len();
        self.out.truncate(len);
        if !self.out.is_empty() {
            self.out.push_str("\n\n");
        }
    }

    fn break_line(&mut self) {
        self.pending_separator = None;
        self.trim_trailing_spaces();
        if !self.at_line_start() {
            self.out.push('\n');
        }
    }

    /// Append text with XML whitespace runs folded to single spaces.
    fn text(&mut self, raw: &str) {
        let mut folded = String::with_capacity(raw.len());
        let mut pending_space = false;
        for c in raw.chars() {
            if c.is_whitespace() {
                pending_space = true;
            } else {
                if pending_space {
                    folded.push(' ');
                    pending_space = false;
                }
                folded.push(c);
            }
        }
        if pending_space {
            folded.push(' ');
        }

        if folded.trim().is_empty() {
            if self.pending_separator.is_some() {
                return;
            }
        } else {
            self.flush_separator();
        }

        let mut slice = folded.as_str();
        if self.at_line_start() || self.out.ends_with(' ') {
            slice = slice.trim_start();
        }
        self.out.push_str(slice);
    }

    fn finish(self) -> String {
        let trimmed = self.out.trim();
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\n")
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
