use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{
    AttemptError, BackendAdapter, BackendDescriptor, BackendKind, BackendReply, ChatBackend,
    GenerationParams, read_response, run_fallback,
};
use crate::errors::BackendError;
use crate::log_warn;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic messages API
pub struct AnthropicBackend {
    descriptor: BackendDescriptor,
    client: Client,
}

impl AnthropicBackend {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self {
            descriptor,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
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
            "model": model,
            "system": system_prompt,
            "messages": [
                {"role": "user", "content": user_prompt}
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_output_tokens,
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.descriptor.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let body = read_response(response).await?;
        extract_text(&body)
    }
}

#[async_trait]
impl BackendAdapter for AnthropicBackend {
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

/// Pull the generated text out of a messages payload.
///
/// The response carries a content block list:
/// `{"content": [{"type": "text", "text": "..."}], "stop_reason": "end_turn"}`
fn extract_text(body: &Value) -> Result<String, AttemptError> {
    if body["stop_reason"].as_str() == Some("refusal") {
        return Err(AttemptError::Blocked("model refused the request".to_string()));
    }
    if body["stop_reason"].as_str() == Some("max_tokens") {
        log_warn!("anthropic: output hit the token cap and may be truncated");
    }

    let blocks = body["content"].as_array().ok_or_else(|| AttemptError::Http {
        status: 200,
        message: "no content blocks in messages response".to_string(),
    })?;

    let text: String = blocks
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    if text.is_empty() {
        return Err(AttemptError::Http {
            status: 200,
            message: "messages response contained no text blocks".to_string(),
        });
    }
    Ok(text)
}
