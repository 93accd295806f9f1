use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{
    AttemptError, BackendAdapter, BackendDescriptor, BackendKind, BackendReply, ChatBackend,
    GenerationParams, read_response, run_fallback, truncate_message,
};
use crate::errors::BackendError;
use crate::log_warn;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Adapter for the OpenAI chat completions API
pub struct OpenAiBackend {
    descriptor: BackendDescriptor,
    client: Client,
}

impl OpenAiBackend {
    pub fn new(descriptor: BackendDescriptor) -> Self {
        Self {
            descriptor,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
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
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_output_tokens,
        });

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.descriptor.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let body = read_response(response).await?;
        extract_text(&body)
    }
}

#[async_trait]
impl BackendAdapter for OpenAiBackend {
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

/// Pull the generated text out of a chat completions payload.
///
/// The response shape is:
/// `{"choices": [{"message": {"content": "..."}, "finish_reason": "stop"}]}`
/// with `refusal` set and `content` null when the model declines.
fn extract_text(body: &Value) -> Result<String, AttemptError> {
    let choice = &body["choices"][0];

    if let Some(refusal) = choice["message"]["refusal"].as_str() {
        return Err(AttemptError::Blocked(truncate_message(refusal)));
    }
    if choice["finish_reason"].as_str() == Some("content_filter") {
        return Err(AttemptError::Blocked("content filter".to_string()));
    }
    if choice["finish_reason"].as_str() == Some("length") {
        log_warn!("openai: output hit the token cap and may be truncated");
    }

    choice["message"]["content"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| AttemptError::Http {
            status: 200,
            message: "no content in chat completions response".to_string(),
        })
}
