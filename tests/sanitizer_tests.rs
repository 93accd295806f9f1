use appforge::errors::SanitizeError;
use appforge::sanitizer::{SanitizeLimits, looks_truncated, sanitize, sanitize_with_limits};

const APP: &str = "\
import React from 'react';

function App() {
  const [items, setItems] = React.useState([]);
  return <ul>{items.map((item) => <li key={item}>{item}</li>)}</ul>;
}

export default App;";

fn relaxed() -> SanitizeLimits {
    SanitizeLimits {
        min_chars: 20,
        min_lines: 3,
    }
}

#[test]
fn plain_code_passes_through_unchanged() {
    let out = sanitize_with_limits(APP, &relaxed()).expect("clean code should pass");
    assert_eq!(out, APP);
}

#[test]
fn bare_and_tagged_fences_are_stripped() {
    for fence in ["```", "```jsx", "```javascript"] {
        let raw = format!("{fence}\n{APP}\n```");
        let out = sanitize_with_limits(&raw, &relaxed()).expect("fenced code should pass");
        assert_eq!(out, APP, "failed for fence {fence}");
    }
}

#[test]
fn leading_prose_is_discarded() {
    let raw = format!("Sure thing! Here's a list app for you.\n\n{APP}");
    let out = sanitize_with_limits(&raw, &relaxed()).expect("should sanitize");
    assert_eq!(out, APP);
}

#[test]
fn trailing_chatter_after_export_is_discarded() {
    let raw = format!("{APP}\n\nThis component renders a list. Let me know if you'd like changes!");
    let out = sanitize_with_limits(&raw, &relaxed()).expect("should sanitize");
    assert_eq!(out, APP);
}

#[test]
fn code_tail_after_export_survives() {
    let raw = format!("{APP}\n\nexport const VERSION = '1.0';");
    let out = sanitize_with_limits(&raw, &relaxed()).expect("should sanitize");
    assert!(out.ends_with("export const VERSION = '1.0';"));
}

#[test]
fn sanitize_is_idempotent() {
    let inputs = [
        format!("```jsx\n{APP}\n```"),
        format!("Here you go:\n{APP}\nEnjoy!"),
        APP.to_string(),
        format!("{APP}\n\nconst extra = 1;"),
    ];
    for raw in inputs {
        let once = sanitize_with_limits(&raw, &relaxed()).expect("first pass");
        let twice = sanitize_with_limits(&once, &relaxed()).expect("second pass");
        assert_eq!(once, twice, "not idempotent for input: {raw}");
    }
}

#[test]
fn short_output_is_rejected_with_counts() {
    let err = sanitize("```\nconst App = () => null;\n```").expect_err("stub should be rejected");
    let SanitizeError::Insufficient { chars, lines } = err;
    assert!(chars < 200);
    assert_eq!(lines, 1);
}

#[test]
fn rejection_reflects_configured_limits() {
    let strict = SanitizeLimits {
        min_chars: 10_000,
        min_lines: 1,
    };
    assert!(sanitize_with_limits(APP, &strict).is_err());

    let lax = SanitizeLimits {
        min_chars: 1,
        min_lines: 1,
    };
    assert!(sanitize_with_limits(APP, &lax).is_ok());
}

#[test]
fn truncation_heuristic_spots_open_endings() {
    assert!(looks_truncated(
        "function App() {\n  const data = fetch("
    ));
    assert!(!looks_truncated(APP));
}
