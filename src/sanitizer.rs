//! Response sanitizer: strips the conversational wrapping LLMs put around
//! generated source and rejects output too small to be a real program.
//!
//! All passes are textual and order-sensitive. The whole function is
//! idempotent: running it on already-sanitized text returns the text
//! unchanged.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::SanitizeError;
use crate::log_debug;

/// Minimum size for a candidate to count as a generated app rather than a
/// stub or an apology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeLimits {
    pub min_chars: usize,
    pub min_lines: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self {
            min_chars: 200,
            min_lines: 5,
        }
    }
}

/// A fenced-block marker line, language-tagged or bare
static FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```[A-Za-z0-9_+-]*\s*$").expect("fence regex must compile")
});

/// The canonical terminal marker of a generated module
static EXPORT_DEFAULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*export\s+default\s+[A-Za-z_$][A-Za-z0-9_$]*\s*;?\s*$")
        .expect("export regex must compile")
});

/// Keywords that open a top-level declaration; a line starting with one of
/// these is recognizable program text.
const DECLARATION_KEYWORDS: &[&str] = &[
    "import ", "export ", "const ", "let ", "var ", "function ", "class ", "async ",
];

/// Sanitize with the default size limits
pub fn sanitize(raw: &str) -> Result<String, SanitizeError> {
    sanitize_with_limits(raw, &SanitizeLimits::default())
}

/// Strip formatting wrappers and boilerplate from raw generated text.
///
/// Steps, in order: drop leading/trailing code fences, discard prose before
/// the first program marker, cut trailing chatter after the final
/// `export default` statement (unless the tail itself looks like more code),
/// then reject anything below the size limits.
pub fn sanitize_with_limits(raw: &str, limits: &SanitizeLimits) -> Result<String, SanitizeError> {
    let mut lines: Vec<&str> = raw.lines().collect();

    strip_fences(&mut lines);
    discard_leading_prose(&mut lines);
    truncate_after_terminal_marker(&mut lines);

    // Re-trim: the passes above can expose blank edges
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let candidate = lines.join("\n");
    let chars = candidate.trim().len();
    let line_count = lines.len();

    if chars < limits.min_chars || line_count < limits.min_lines {
        log_debug!("sanitizer: rejecting candidate ({chars} chars, {line_count} lines)");
        return Err(SanitizeError::Insufficient {
            chars,
            lines: line_count,
        });
    }
    Ok(candidate)
}

/// Heuristic truncation check used for log warnings only: no terminal marker
/// and the text stops mid-statement.
pub fn looks_truncated(text: &str) -> bool {
    if text.lines().any(|line| EXPORT_DEFAULT_LINE.is_match(line)) {
        return false;
    }
    let Some(last) = text.lines().rev().find(|l| !l.trim().is_empty()) else {
        return true;
    };
    let last = last.trim_end();
    !(last.ends_with('}') || last.ends_with(';') || last.ends_with('>'))
}

fn starts_with_declaration(line: &str) -> bool {
    let trimmed = line.trim_start();
    DECLARATION_KEYWORDS
        .iter()
        .any(|kw| trimmed.starts_with(kw))
}

/// Drop a leading fence line and a trailing bare fence line, if present
fn strip_fences(lines: &mut Vec<&str>) {
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    if lines.first().is_some_and(|l| FENCE_LINE.is_match(l.trim())) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.last().is_some_and(|l| FENCE_LINE.is_match(l.trim())) {
        lines.pop();
    }
}

/// Discard everything before the first line that reads as program text.
/// When no such line exists the text is left alone and the size check
/// decides its fate.
fn discard_leading_prose(lines: &mut Vec<&str>) {
    if let Some(first_code) = lines.iter().position(|l| starts_with_declaration(l)) {
        if first_code > 0 {
            log_debug!("sanitizer: discarding {first_code} leading prose line(s)");
            lines.drain(..first_code);
        }
    }
}

/// Cut everything after the last `export default` line, unless the tail
/// itself starts with a declaration keyword, which means the generator kept
/// writing legitimate statements after the export.
fn truncate_after_terminal_marker(lines: &mut Vec<&str>) {
    let Some(marker) = lines
        .iter()
        .rposition(|l| EXPORT_DEFAULT_LINE.is_match(l))
    else {
        return;
    };

    let tail_code = lines[marker + 1..]
        .iter()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| starts_with_declaration(l));

    if !tail_code && marker + 1 < lines.len() {
        log_debug!(
            "sanitizer: dropping {} trailing line(s) after export statement",
            lines.len() - marker - 1
        );
        lines.truncate(marker + 1);
    }
}
