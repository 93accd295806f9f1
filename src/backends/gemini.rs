use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{
    AttemptError, BackendAdapter, BackendDescriptor, BackendKind, BackendReply, ChatBackend,
    GenerationParams, read_response, run_fallback, truncate_message,
};
use crate::errors::BackendError;
use crate::log_warn;

/// Adapter for the Gemini `generateContent` API
pub struct GeminiBackend {
    descriptor: BackendDescriptor,
    client: Client,
}

impl GeminiBackend {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self {
            descriptor,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn attempt(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AttemptError> {
        let request_body = json!({
            "systemInstruction": {
                "parts": [{"text": system_prompt}]
            },
            "contents": [
                {
                    "role": "user",
                    "parts": [{"text": user_prompt}]
                }
            ],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_output_tokens,
            }
        });

        // Model is addressed in the URL, not the body
        let api_url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
        );

        let response = self
            .client
            .post(api_url)
            .header("x-goog-api-key", &self.descriptor.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let body = read_response(response).await?;
        extract_text(&body)
    }
}

#[async_trait]
impl BackendAdapter for GeminiBackend {
    fn kind(&self) -> BackendKind {
        self.descriptor.kind
    }

    fn has_credential(&self) -> bool {
        self.descriptor.has_credential()
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<BackendReply, BackendError> {
        run_fallback(self, system_prompt, user_prompt, params).await
    }
}

/// Pull the generated text out of a `generateContent` payload.
///
/// The response format is:
/// `{"candidates": [{"content": {"parts": [{"text": "..."}]}, "finishReason": "STOP"}]}`
/// with `promptFeedback.blockReason` set when the prompt itself was blocked.
fn extract_text(body: &Value) -> Result<String, AttemptError> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(AttemptError::Blocked(truncate_message(reason)));
    }

    let candidate = &body["candidates"][0];
    match candidate["finishReason"].as_str() {
        Some(reason @ ("SAFETY" | "RECITATION" | "PROHIBITED_CONTENT")) => {
            return Err(AttemptError::Blocked(reason.to_string()));
        }
        Some("MAX_TOKENS") => {
            log_warn!("gemini: output hit the token cap and may be truncated");
        }
        _ => {}
    }

    let parts = candidate["content"]["parts"]
        .as_array()
        .ok_or_else(|| AttemptError::Http {
            status: 200,
            message: "no candidate parts in generateContent response".to_string(),
        })?;

    let text: String = parts.iter().filter_map(|part| part["text"].as_str()).collect();

    if text.is_empty() {
        return Err(AttemptError::Http {
            status: 200,
            message: "generateContent response contained no text".to_string(),
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_candidate_text() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "const App = () => <div/>;"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            extract_text(&body).ok().as_deref(),
            Some("const App = () => <div/>;")
        );
    }

    #[test]
    fn safety_finish_is_blocked() {
        let body = json!({
            "candidates": [{
                "content": {"parts": []},
                "finishReason": "SAFETY"
            }]
        });
        assert!(matches!(extract_text(&body), Err(AttemptError::Blocked(_))));
    }

    #[test]
    fn blocked_prompt_is_blocked() {
        let body = json!({
            "promptFeedback": {"blockReason": "SAFETY"},
            "candidates": []
        });
        assert!(matches!(extract_text(&body), Err(AttemptError::Blocked(_))));
    }

    #[test]
    fn missing_parts_is_an_http_error() {
        let body = json!({"candidates": [{}]});
        assert!(matches!(extract_text(&body), Err(AttemptError::Http { .. })));
    }
}
