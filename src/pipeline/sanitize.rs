//! Sanitising: deterministic cleanup of Markdown rendered from TEI.
//!
//! Two passes, in order:
//!
//! 1. Collapse every run of 3+ newlines to exactly 2.
//! 2. Drop lines that look like extraction noise rather than prose.
//!
//! The line filter is a heuristic. Each line is judged on its own content
//! only, so the same line always gets the same verdict. Nothing is logged
//! here: [`sanitize_markdown`] reports what it dropped and the caller decides
//! what to do with that.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Minimum line length (in characters) before the sparsity rule applies.
pub const DEFAULT_GIBBERISH_CUTOFF: usize = 2000;

/// Substrings left behind by the TeX-to-text step of GROBID's pipeline:
/// embedded formula hashes and leaked closing tags. Matched after removing
/// all spaces from the line.
pub const ARTIFACT_MARKERS: [&str; 2] = ["texitsha1_base64", "texit>"];

/// Why a line was dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DropReason {
    /// Long line whose space density sits at ~50%.
    TokenSparsity(f64),
    /// Line contains one of [`ARTIFACT_MARKERS`].
    ArtifactMarker(&'static str),
}

/// A line removed by the gibberish filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedLine {
    /// 1-indexed line number in the whitespace-collapsed text.
    pub line_no: usize,
    pub reason: DropReason,
    pub line: String,
}

/// Result of [`sanitize_markdown`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedText {
    pub text: String,
    pub dropped: Vec<DroppedLine>,
}

/// Run both passes.
pub fn sanitize_markdown(input: &str, cutoff: usize) -> SanitizedText {
    let collapsed = collapse_blank_lines(input);
    filter_gibberish(&collapsed, cutoff)
}

// ── Pass 1: Collapse blank-line runs ─────────────────────────────────────────

static RE_NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Replace every run of three or more `\n` with `\n\n`.
///
/// The regex consumes the whole run in one match, so a single pass already
/// reaches the fixed point.
pub fn collapse_blank_lines(input: &str) -> String {
    RE_NEWLINE_RUN.replace_all(input, "\n\n").into_owned()
}

// ── Pass 2: Gibberish filter ─────────────────────────────────────────────────

/// Fraction of spaces in the line, ignoring a leading `$…$` pair.
///
/// An empty measurement core counts as fully sparse (1.0).
pub fn token_sparsity(line: &str) -> f64 {
    let core = if line.starts_with('$') {
        let mut chars = line.chars();
        chars.next();
        chars.next_back();
        chars.as_str()
    } else {
        line
    };

    let n_chars = core.chars().count();
    if n_chars == 0 {
        return 1.0;
    }
    let n_spaces = core.chars().filter(|&c| c == ' ').count();
    n_spaces as f64 / n_chars as f64
}

/// Decide whether a single line is noise. `None` means keep.
pub fn classify_line(line: &str, cutoff: usize) -> Option<DropReason> {
    let sparsity = token_sparsity(line);
    if (sparsity - 0.5).abs() < 0.01 && line.chars().count() > cutoff {
        return Some(DropReason::TokenSparsity(sparsity));
    }

    let compact = line.replace(' ', "");
    ARTIFACT_MARKERS
        .iter()
        .copied()
        .find(|marker| compact.contains(marker))
        .map(DropReason::ArtifactMarker)
}

/// Keep the lines [`classify_line`] accepts, joined with `\n` in order.
pub fn filter_gibberish(input: &str, cutoff: usize) -> SanitizedText {
    let mut kept: Vec<&str> = Vec::new();
    let mut dropped = Vec::new();

    for (idx, line) in input.split('\n').enumerate() {
        match classify_line(line, cutoff) {
            None => kept.push(line),
            Some(reason) => dropped.push(DroppedLine {
                line_no: idx + 1,
                reason,
                line: line.to_string(),
            }),
        }
    }

    SanitizedText {
        text: kept.join("\n"),
        dropped,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A line of `n` characters alternating `x` and space: sparsity 0.5.
    fn half_spaces(n: usize) -> String {
        (0..n).map(|i| if i % 2 == 0 { 'x' } else { ' ' }).collect()
    }

    #[test]
    fn test_collapse_long_run() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_collapse_leaves_double_newline() {
        assert_eq!(collapse_blank_lines("a\n\nb\nc"), "a\n\nb\nc");
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let inputs = ["", "\n\n\n", "a\n\n\n\nb\n\n\n\n\n\nc", "x\n\n\n\n\n\n\n\n\n"];
        for input in inputs {
            let once = collapse_blank_lines(input);
            assert_eq!(collapse_blank_lines(&once), once);
            assert!(!once.contains("\n\n\n"), "input {input:?}");
        }
    }

    #[test]
    fn test_sparsity_plain() {
        assert!((token_sparsity("a b") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_sparsity(""), 1.0);
        assert_eq!(token_sparsity("abc"), 0.0);
    }

    #[test]
    fn test_sparsity_ignores_formula_delimiters() {
        // core is "a b" once the outer `$` pair is gone
        assert!((token_sparsity("$a b$") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_sparsity("$"), 1.0);
        assert_eq!(token_sparsity("$$"), 1.0);
    }

    #[test]
    fn test_long_half_space_line_dropped() {
        let line = half_spaces(2002);
        assert!(matches!(
            classify_line(&line, DEFAULT_GIBBERISH_CUTOFF),
            Some(DropReason::TokenSparsity(_))
        ));
    }

    #[test]
    fn test_short_half_space_line_kept() {
        let line = half_spaces(2000);
        assert_eq!(classify_line(&line, DEFAULT_GIBBERISH_CUTOFF), None);
    }

    #[test]
    fn test_long_prose_line_kept() {
        let line = "The quick brown fox jumps over the lazy dog. ".repeat(60);
        assert!(line.len() > DEFAULT_GIBBERISH_CUTOFF);
        assert_eq!(classify_line(&line, DEFAULT_GIBBERISH_CUTOFF), None);
    }

    #[test]
    fn test_artifact_markers_matched_without_spaces() {
        assert_eq!(
            classify_line("<tex it sha1_base64=\"abc\">", 2000),
            Some(DropReason::ArtifactMarker("texitsha1_base64"))
        );
        assert_eq!(
            classify_line("x^2 </tex it>", 2000),
            Some(DropReason::ArtifactMarker("texit>"))
        );
        assert_eq!(classify_line("a normal sentence.", 2000), None);
    }

    #[test]
    fn test_filter_reports_dropped_lines() {
        let input = "keep one\n</texit>\nkeep two";
        let out = filter_gibberish(input, 2000);
        assert_eq!(out.text, "keep one\nkeep two");
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].line_no, 2);
        assert_eq!(out.dropped[0].line, "</texit>");
    }

    #[test]
    fn test_filter_decision_independent_of_neighbours() {
        let noisy = half_spaces(2100);
        let a = filter_gibberish(&format!("intro\n{noisy}\noutro"), 2000);
        let b = filter_gibberish(&noisy, 2000);
        assert_eq!(a.dropped.len(), 1);
        assert_eq!(b.dropped.len(), 1);
        assert_eq!(a.text, "intro\noutro");
        assert_eq!(b.text, "");
    }

    #[test]
    fn test_sanitize_full_pipeline() {
        let input = "# Title\n\n\n\n\nBody texitsha1_base64 junk\nBody text.\n\n\n";
        let out = sanitize_markdown(input, DEFAULT_GIBBERISH_CUTOFF);
        assert_eq!(out.text, "# Title\n\nBody text.\n\n");
        assert_eq!(out.dropped.len(), 1);
    }
}
