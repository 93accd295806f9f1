use appforge::repair::repair;

/// Count occurrences of a character outside quoted and template spans.
/// Test-side reimplementation used to state the balance property without
/// trusting the engine's own scanner.
fn count_outside_literals(text: &str, needle: char) -> usize {
    let mut count = 0;
    let mut mode: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        match mode {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    mode = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => mode = Some(c),
                _ => {
                    if c == needle {
                        count += 1;
                    }
                }
            },
        }
    }
    count
}

fn assert_balanced(text: &str) {
    for (open, close) in [('{', '}'), ('(', ')'), ('[', ']')] {
        assert_eq!(
            count_outside_literals(text, open),
            count_outside_literals(text, close),
            "unbalanced {open}{close} in: {text}"
        );
    }
}

#[test]
fn trailing_comma_scenario() {
    let (out, _) = repair("{a:1,}");
    assert_eq!(out, "{a:1}");
}

#[test]
fn two_missing_braces_scenario() {
    let source = "const data = { list: [1, 2, 3], nested: { deep: true";
    let (out, report) = repair(source);
    assert_eq!(report.braces_appended, 2);
    assert_balanced(&out);
}

#[test]
fn repair_output_is_balanced_for_varied_inputs() {
    let inputs = [
        "function App() { return (",
        "const xs = [[1, 2], [3",
        "if (ready) { start(); } else { stop(",
        "const ok = { a: { b: { c: 1 }",
        "no brackets at all",
        "((((",
    ];
    for input in inputs {
        let (out, _) = repair(input);
        assert_balanced(&out);
    }
}

#[test]
fn string_literal_with_unmatched_brackets_is_byte_identical() {
    let source = "const weird = \"}}}((([\";";
    let (out, report) = repair(source);
    assert_eq!(out, source);
    assert!(report.is_clean());
}

#[test]
fn template_literal_with_unmatched_brackets_is_byte_identical() {
    let source = "const tpl = `<div>{count}</div> ((( [[[`;";
    let (out, _) = repair(source);
    assert_eq!(out, source);
}

#[test]
fn fixes_are_reported_in_pass_order() {
    let source = "const style = { margin: 10px, };";
    let (_, report) = repair(source);
    let fixes = &report.fixes_applied;
    assert_eq!(fixes.len(), 2);
    assert!(fixes[0].contains("trailing comma"));
    assert!(fixes[1].contains("unit suffix"));
}

#[test]
fn unit_stripping_leaves_identifiers_alone() {
    let (out, _) = repair("const box2px = compute(16px);");
    assert_eq!(out, "const box2px = compute(16);");
}

#[test]
fn digit_key_quoting_only_touches_keys() {
    let (out, _) = repair("const t = { 2xl: '2xl', lg: x2xl };");
    assert_eq!(out, "const t = { \"2xl\": '2xl', lg: x2xl };");
}

#[test]
fn export_appended_after_closers() {
    let source = "function App() {\n  return <div>hi</div>;";
    let (out, report) = repair(source);
    assert_eq!(report.braces_appended, 1);
    let closer_at = out.rfind('}').expect("appended brace");
    let export_at = out.find("export default App;").expect("appended export");
    assert!(export_at > closer_at);
    assert_balanced(&out);
}

#[test]
fn clean_input_round_trips_with_empty_report() {
    let source = "\
import React from 'react';

function App() {
  return <p>done</p>;
}

export default App;
";
    let (out, report) = repair(source);
    assert_eq!(out, source);
    assert!(report.is_clean());
    assert_eq!(report.braces_appended, 0);
    assert_eq!(report.parens_appended, 0);
    assert_eq!(report.brackets_appended, 0);
}
