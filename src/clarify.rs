//! Clarification service: asks a cheap model for structured follow-up
//! questions about an app idea.
//!
//! The parse contract is strict and the fallback is part of the contract:
//! callers always get a usable, non-empty question list, never an error.

use serde::{Deserialize, Serialize};

use crate::backends::{BackendAdapter, GenerationParams};
use crate::orchestrator::rank_backends;
use crate::prompts;
use crate::{log_debug, log_warn};

/// One clarifying question with its suggested answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    pub options: Vec<String>,
}

/// Fixed fallback used when every backend fails or returns unusable output
pub fn default_clarifications() -> Vec<Clarification> {
    vec![
        Clarification {
            question: "Who will use this app?".to_string(),
            options: vec![
                "Just me".to_string(),
                "My team".to_string(),
                "Customers".to_string(),
            ],
        },
        Clarification {
            question: "What matters most in the first version?".to_string(),
            options: vec![
                "Core features working".to_string(),
                "Polished look".to_string(),
                "Easy to extend later".to_string(),
            ],
        },
        Clarification {
            question: "How should it look and feel?".to_string(),
            options: vec![
                "Minimal and clean".to_string(),
                "Playful and colorful".to_string(),
                "Professional".to_string(),
            ],
        },
    ]
}

/// Ask the configured backends, in orchestrator order, for clarifying
/// questions about `prompt`. Same sequential-fallback contract as generation
/// but on a cheaper token budget.
pub async fn clarify(
    prompt: &str,
    adapters: &[Box<dyn BackendAdapter>],
) -> Vec<Clarification> {
    let params = GenerationParams::clarification();
    let user_prompt = prompts::clarification_user_prompt(prompt);

    for adapter in rank_backends(adapters, None) {
        let kind = adapter.kind();
        match adapter
            .invoke(prompts::CLARIFIER_SYSTEM_PROMPT, &user_prompt, &params)
            .await
        {
            Ok(reply) => {
                if let Some(questions) = parse_clarifications(&reply.text) {
                    log_debug!("clarify: {kind} produced {} question(s)", questions.len());
                    return questions;
                }
                log_warn!("clarify: {kind} reply failed the shape check, trying next backend");
            }
            Err(failure) => {
                log_warn!("clarify: {kind} failed ({failure}), trying next backend");
            }
        }
    }

    log_debug!("clarify: all backends exhausted, returning default questions");
    default_clarifications()
}

/// Parse the first top-level array in `raw` into a validated question list.
/// Any parse or shape failure yields `None`.
pub fn parse_clarifications(raw: &str) -> Option<Vec<Clarification>> {
    let slice = first_array_slice(raw)?;
    let parsed: Vec<Clarification> = serde_json::from_str(slice).ok()?;

    let well_formed = parsed.len() >= 2
        && parsed.iter().all(|c| {
            !c.question.trim().is_empty()
                && !c.options.is_empty()
                && c.options.iter().all(|o| !o.trim().is_empty())
        });
    well_formed.then_some(parsed)
}

/// The first top-level `[` … `]` span in the text, bracket-matched with
/// awareness of double-quoted strings so brackets inside JSON strings don't
/// end the span early.
fn first_array_slice(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
