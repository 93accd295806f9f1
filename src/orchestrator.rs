//! Provider orchestrator: tries backend adapters in order and accepts the
//! first usable result.
//!
//! Adapters are invoked strictly sequentially, never concurrently, so a
//! request never spends money on two metered backends at once and
//! cost/latency stay deterministic. The first accepted result short-circuits
//! the rest of the list.

use crate::backends::{BackendAdapter, BackendKind, GenerationParams};
use crate::errors::{BackendError, GenerateError};
use crate::prompts;
use crate::sanitizer::{self, SanitizeLimits};
use crate::types::{GenerationRequest, GenerationResult};
use crate::{log_debug, log_warn};

/// Order adapters for one request: credentialed backends first, the user's
/// preferred backend ahead of its peers, configuration order otherwise.
pub fn rank_backends<'a>(
    adapters: &'a [Box<dyn BackendAdapter>],
    preferred: Option<BackendKind>,
) -> Vec<&'a dyn BackendAdapter> {
    let mut ranked: Vec<(usize, &dyn BackendAdapter)> =
        adapters.iter().map(|a| a.as_ref()).enumerate().collect();

    ranked.sort_by_key(|(index, adapter)| {
        (
            !adapter.has_credential(),
            preferred != Some(adapter.kind()),
            *index,
        )
    });
    ranked.into_iter().map(|(_, adapter)| adapter).collect()
}

/// Generate app source for one request.
///
/// Each adapter's reply runs through the sanitizer before it is accepted; an
/// insufficient reply counts as that backend's failure and the next backend
/// is tried. Once every backend is exhausted, one aggregate error surfaces
/// the most actionable failure class.
pub async fn generate(
    request: &GenerationRequest,
    adapters: &[Box<dyn BackendAdapter>],
    limits: &SanitizeLimits,
) -> Result<GenerationResult, GenerateError> {
    let params = GenerationParams::app();
    let user_prompt = prompts::generation_user_prompt(request);
    let ranked = rank_backends(adapters, request.preferred_backend);

    log_debug!(
        "orchestrator: request {} trying {} backend(s)",
        request.id,
        ranked.len()
    );

    let mut attempts: Vec<BackendError> = Vec::new();

    for adapter in ranked {
        let kind = adapter.kind();
        log_debug!("orchestrator: request {} invoking {kind}", request.id);

        match adapter
            .invoke(prompts::GENERATOR_SYSTEM_PROMPT, &user_prompt, &params)
            .await
        {
            Ok(reply) => match sanitizer::sanitize_with_limits(&reply.text, limits) {
                Ok(text) => {
                    if sanitizer::looks_truncated(&text) {
                        log_warn!(
                            "orchestrator: accepted output from {kind} looks truncated; repair will close it"
                        );
                    }
                    log_debug!(
                        "orchestrator: request {} accepted {} chars from {kind} ({})",
                        request.id,
                        text.len(),
                        reply.model
                    );
                    return Ok(GenerationResult {
                        text,
                        backend: kind,
                        model: reply.model,
                    });
                }
                Err(rejection) => {
                    log_warn!("orchestrator: {kind} output rejected: {rejection}");
                    attempts.push(BackendError::Validation {
                        backend: kind,
                        message: rejection.to_string(),
                    });
                }
            },
            Err(failure) => {
                // Auth/permission failures on one backend are not fatal for
                // the orchestration; the message is kept for the aggregate.
                log_warn!("orchestrator: {kind} failed: {failure}");
                attempts.push(failure);
            }
        }
    }

    Err(GenerateError::new(attempts))
}
