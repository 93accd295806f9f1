//! System and user prompt assembly for generation and clarification calls.

use crate::types::GenerationRequest;

/// System instruction for app generation. The output contract matters more
/// than the prose: one complete module, no fences, default export named App.
pub const GENERATOR_SYSTEM_PROMPT: &str = "\
You are an expert React developer. Generate a complete, self-contained React \
application as a single JavaScript module based on the user's description.

Rules:
- Output ONLY JavaScript source code. No markdown fences, no explanations.
- Define a single top-level component named App.
- End the module with `export default App;`.
- Use React hooks for state; no external libraries beyond React itself.
- Inline styles only, as plain JavaScript objects with unitless numbers.
- The app must be complete and runnable as written.";

/// System instruction for clarification questions. Strict JSON-array output.
pub const CLARIFIER_SYSTEM_PROMPT: &str = "\
You help refine app ideas before they are built. Given an app description, \
produce the most useful clarifying questions.

Rules:
- Respond with ONLY a JSON array, no other text.
- Each element is an object with a \"question\" string and an \"options\" \
array of 2-4 short answer strings.
- Produce between 2 and 4 questions.";

/// Assemble the generation user prompt, splicing in any enrichment text the
/// clarification step produced.
pub fn generation_user_prompt(request: &GenerationRequest) -> String {
    match &request.enrichment {
        Some(enrichment) if !enrichment.trim().is_empty() => format!(
            "Build this app: {}\n\nAdditional details from the user:\n{}",
            request.prompt, enrichment
        ),
        _ => format!("Build this app: {}", request.prompt),
    }
}

/// Assemble the clarification user prompt
pub fn clarification_user_prompt(prompt: &str) -> String {
    format!("The app idea: {prompt}")
}
