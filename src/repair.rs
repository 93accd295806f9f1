//! Deterministic, parser-free syntax repair for generated source.
//!
//! Repair never fails and never guarantees validity; it only makes the text
//! more likely to parse. One hard rule: content inside quoted strings and
//! template literals is never rewritten. A single literal-span scanner
//! enforces that for every pass, including the bracket balancer.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::log_debug;

/// Diagnostic record of what a repair pass changed. Not authoritative: the
/// repaired text is the result, the report is for display and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub braces_appended: usize,
    pub parens_appended: usize,
    pub brackets_appended: usize,
    /// Human-readable fix descriptions, in the order the passes ran
    pub fixes_applied: Vec<String>,
}

impl RepairReport {
    /// True when no pass changed anything
    pub fn is_clean(&self) -> bool {
        self.fixes_applied.is_empty()
    }
}

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex must compile"));

static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+(?:\.\d+)?)(px|em|rem|vh|vw|vmin|vmax|pt|pc|dp|sp)\b")
        .expect("unit suffix regex must compile")
});

static DIGIT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)(\d+[A-Za-z][A-Za-z0-9]*)\s*:").expect("digit key regex must compile")
});

static MAIN_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:function|class)\s+App\b|(?:const|let|var)\s+App\s*=")
        .expect("declaration regex must compile")
});

/// Run every repair pass in order and return the best-effort result.
pub fn repair(candidate: &str) -> (String, RepairReport) {
    let mut report = RepairReport::default();

    let mut text = remove_trailing_commas(candidate, &mut report);
    text = strip_unit_suffixes(&text, &mut report);
    text = quote_digit_keys(&text, &mut report);
    text = balance_brackets(&text, &mut report);
    text = ensure_export_statement(&text, &mut report);

    if !report.is_clean() {
        log_debug!("repair: applied fixes: {:?}", report.fixes_applied);
    }
    (text, report)
}

/// Lexer mode while scanning for literal spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    TemplateLiteral,
}

/// Byte ranges of string and template literals, delimiters included.
/// An unterminated literal runs to the end of the text.
fn literal_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut mode = ScanMode::Normal;
    let mut start = 0usize;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match mode {
            ScanMode::Normal => match c {
                '\'' => {
                    mode = ScanMode::SingleQuoted;
                    start = i;
                }
                '"' => {
                    mode = ScanMode::DoubleQuoted;
                    start = i;
                }
                '`' => {
                    mode = ScanMode::TemplateLiteral;
                    start = i;
                }
                _ => {}
            },
            ScanMode::SingleQuoted | ScanMode::DoubleQuoted | ScanMode::TemplateLiteral => {
                if escaped {
                    escaped = false;
                    continue;
                }
                if c == '\\' {
                    escaped = true;
                    continue;
                }
                let closing = match mode {
                    ScanMode::SingleQuoted => '\'',
                    ScanMode::DoubleQuoted => '"',
                    ScanMode::TemplateLiteral => '`',
                    ScanMode::Normal => unreachable!("normal mode handled above"),
                };
                if c == closing {
                    spans.push(start..i + c.len_utf8());
                    mode = ScanMode::Normal;
                }
            }
        }
    }

    if mode != ScanMode::Normal {
        spans.push(start..text.len());
    }
    spans
}

/// Apply a rewrite to the code between literals, leaving every literal span
/// byte-identical.
fn rewrite_code_spans(text: &str, mut f: impl FnMut(&str) -> String) -> String {
    let spans = literal_spans(text);
    let mut out = String::with_capacity(text.len());
    let mut pos = 0usize;

    for span in &spans {
        out.push_str(&f(&text[pos..span.start]));
        out.push_str(&text[span.start..span.end]);
        pos = span.end;
    }
    out.push_str(&f(&text[pos..]));
    out
}

/// Pass 1: drop commas that sit directly before a closing brace or bracket
fn remove_trailing_commas(text: &str, report: &mut RepairReport) -> String {
    let mut removed = 0usize;
    let out = rewrite_code_spans(text, |code| {
        removed += TRAILING_COMMA.find_iter(code).count();
        TRAILING_COMMA.replace_all(code, "$1").into_owned()
    });
    if removed > 0 {
        report
            .fixes_applied
            .push(format!("removed {removed} trailing comma(s)"));
    }
    out
}

/// Pass 2: strip CSS-style unit suffixes glued to bare numbers; the target
/// runtime has no unit system, numbers must be unitless.
fn strip_unit_suffixes(text: &str, report: &mut RepairReport) -> String {
    let mut stripped = 0usize;
    let out = rewrite_code_spans(text, |code| {
        stripped += UNIT_SUFFIX.find_iter(code).count();
        UNIT_SUFFIX.replace_all(code, "$1").into_owned()
    });
    if stripped > 0 {
        report
            .fixes_applied
            .push(format!("stripped {stripped} unit suffix(es) from numeric literals"));
    }
    out
}

/// Pass 3: quote object keys that start with a digit followed by letters,
/// which are illegal as bare identifiers.
fn quote_digit_keys(text: &str, report: &mut RepairReport) -> String {
    let mut quoted = 0usize;
    let out = rewrite_code_spans(text, |code| {
        quoted += DIGIT_KEY.find_iter(code).count();
        DIGIT_KEY.replace_all(code, "${1}\"${2}\":").into_owned()
    });
    if quoted > 0 {
        report
            .fixes_applied
            .push(format!("quoted {quoted} digit-leading object key(s)"));
    }
    out
}

/// Pass 4: bracket balancer.
///
/// Single left-to-right scan; characters inside literal spans are never
/// counted. Independent counters per pair; whatever is still open at the end
/// gets its closers appended, grouped as `}` then `)` then `]`, deliberately
/// ignoring the nesting order at the truncation point.
fn balance_brackets(text: &str, report: &mut RepairReport) -> String {
    let mut braces = 0i32;
    let mut parens = 0i32;
    let mut brackets = 0i32;

    let spans = literal_spans(text);
    let mut pos = 0usize;
    let mut count = |code: &str| {
        for c in code.chars() {
            match c {
                '{' => braces += 1,
                '}' => braces -= 1,
                '(' => parens += 1,
                ')' => parens -= 1,
                '[' => brackets += 1,
                ']' => brackets -= 1,
                _ => {}
            }
        }
    };
    for span in &spans {
        count(&text[pos..span.start]);
        pos = span.end;
    }
    count(&text[pos..]);

    let braces_missing = usize::try_from(braces.max(0)).unwrap_or(0);
    let parens_missing = usize::try_from(parens.max(0)).unwrap_or(0);
    let brackets_missing = usize::try_from(brackets.max(0)).unwrap_or(0);

    if braces_missing + parens_missing + brackets_missing == 0 {
        return text.to_string();
    }

    let mut out = text.trim_end().to_string();
    out.push('\n');
    out.extend(std::iter::repeat_n('}', braces_missing));
    out.extend(std::iter::repeat_n(')', parens_missing));
    out.extend(std::iter::repeat_n(']', brackets_missing));

    report.braces_appended = braces_missing;
    report.parens_appended = parens_missing;
    report.brackets_appended = brackets_missing;
    report.fixes_applied.push(format!(
        "appended {braces_missing} brace(s), {parens_missing} paren(s), {brackets_missing} bracket(s)"
    ));
    out
}

/// Pass 5: make sure exactly one canonical export exists. When the main
/// declaration is present without any `export default`, append one.
fn ensure_export_statement(text: &str, report: &mut RepairReport) -> String {
    let mut has_export = false;
    rewrite_code_spans(text, |code| {
        if code.contains("export default") {
            has_export = true;
        }
        code.to_string()
    });

    if has_export || !MAIN_DECLARATION.is_match(text) {
        return text.to_string();
    }

    report
        .fixes_applied
        .push("appended missing export statement".to_string());
    format!("{}\n\nexport default App;\n", text.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_comma_before_brace_is_removed() {
        let (out, report) = repair("{a:1,}");
        assert_eq!(out, "{a:1}");
        assert_eq!(report.fixes_applied.len(), 1);
    }

    #[test]
    fn trailing_comma_inside_string_survives() {
        let (out, _) = repair("const s = \"{a:1,}\";");
        assert_eq!(out, "const s = \"{a:1,}\";");
    }

    #[test]
    fn unit_suffixes_are_stripped_outside_strings() {
        let (out, _) = repair("const style = { width: 100px, margin: 1.5rem };");
        assert_eq!(out, "const style = { width: 100, margin: 1.5 };");

        let (kept, _) = repair("const css = '100px';");
        assert_eq!(kept, "const css = '100px';");
    }

    #[test]
    fn digit_leading_keys_are_quoted() {
        let (out, _) = repair("const sizes = { 2xl: 42, lg: 7 };");
        assert_eq!(out, "const sizes = { \"2xl\": 42, lg: 7 };");
    }

    #[test]
    fn missing_braces_are_appended_and_reported() {
        let (out, report) = repair("function Widget() {\n  if (x) {\n    go();");
        assert!(out.ends_with("}}"));
        assert_eq!(report.braces_appended, 2);
        assert_eq!(report.parens_appended, 0);
    }

    #[test]
    fn literal_with_unmatched_brackets_is_untouched() {
        let source = "const s = \"(((\";";
        let (out, report) = repair(source);
        assert_eq!(out, source);
        assert!(report.is_clean());
    }

    #[test]
    fn template_literal_contents_are_skipped() {
        let source = "const t = `{{{[[[(((`;";
        let (out, report) = repair(source);
        assert_eq!(out, source);
        assert_eq!(report.braces_appended, 0);
    }

    #[test]
    fn escaped_quote_does_not_end_literal() {
        let source = "const s = 'it\\'s {';";
        let (out, _) = repair(source);
        assert_eq!(out, source);
    }

    #[test]
    fn export_is_appended_when_main_declaration_lacks_one() {
        let source = "function App() {\n  return null;\n}";
        let (out, report) = repair(source);
        assert!(out.contains("export default App;"));
        assert!(
            report
                .fixes_applied
                .iter()
                .any(|f| f.contains("export statement"))
        );
    }

    #[test]
    fn existing_export_is_not_duplicated() {
        let source = "function App() {\n  return null;\n}\n\nexport default App;\n";
        let (out, _) = repair(source);
        assert_eq!(out.matches("export default").count(), 1);
    }

    #[test]
    fn scanner_finds_literal_spans() {
        let text = "a 'b' c `d` e \"f\"";
        let spans = literal_spans(text);
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[0].clone()], "'b'");
        assert_eq!(&text[spans[1].clone()], "`d`");
        assert_eq!(&text[spans[2].clone()], "\"f\"");
    }

    #[test]
    fn unterminated_literal_runs_to_end() {
        let text = "const s = \"oops";
        let spans = literal_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].clone()], "\"oops");
    }
}
