//! Generation backend adapters.
//!
//! Each adapter wraps one external text-generation API behind the
//! [`BackendAdapter`] capability trait and runs its own model-fallback and
//! retry behavior through the shared [`run_fallback`] loop; per-backend code
//! only builds requests and extracts text from provider-specific response
//! shapes.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::errors::BackendError;
use crate::retry::RetryPolicy;
use crate::{log_debug, log_warn};

/// Replies shorter than this are evidence of a bad generation, not a usable
/// result; the fallback loop advances to the next model instead.
const MIN_REPLY_CHARS: usize = 80;

/// Supported generation backends
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl BackendKind {
    /// All supported backends, in default configuration order
    pub const ALL: &'static [BackendKind] =
        &[BackendKind::OpenAi, BackendKind::Anthropic, BackendKind::Gemini];

    /// Backend name as used in config files and the CLI
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when no API key is configured
    pub const fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Ordered model fallback list used when the config does not override it
    pub fn default_models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            Self::OpenAi => &["gpt-4.1", "gpt-4o", "gpt-4o-mini"],
            Self::Anthropic => &[
                "claude-sonnet-4-20250514",
                "claude-3-7-sonnet-latest",
                "claude-3-5-haiku-latest",
            ],
            Self::Gemini => &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.0-flash"],
        };
        models.iter().map(ToString::to_string).collect()
    }
}

/// Generation parameters sent with every chat request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Full-size budget for app generation
    pub const fn app() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 8192,
        }
    }

    /// Cheap budget for clarification questions
    pub const fn clarification() -> Self {
        Self {
            temperature: 0.4,
            max_output_tokens: 1024,
        }
    }
}

/// One backend's static wiring: credential, model fallback list, retry policy.
/// Owned by configuration; read-only to the pipeline.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub api_key: String,
    pub models: Vec<String>,
    pub retry: RetryPolicy,
}

impl BackendDescriptor {
    pub fn new(kind: BackendKind, api_key: String) -> Self {
        Self {
            kind,
            api_key,
            models: kind.default_models(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Accepted reply from one adapter call
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub model: String,
}

/// Capability interface the orchestrator depends on. One implementation per
/// generation backend; never invoked concurrently.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Stable backend identity
    fn kind(&self) -> BackendKind;

    /// Whether a credential is available for this backend
    fn has_credential(&self) -> bool;

    /// Run one full call sequence (model fallback + retries) and return the
    /// first accepted reply.
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<BackendReply, BackendError>;
}

/// Outcome of a single HTTP attempt against one model, before the shared
/// loop classifies it.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// HTTP 429, with the server's retry hint if it sent one
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },
    /// HTTP 401
    Auth(String),
    /// HTTP 403
    Permission(String),
    /// The model refused or the provider safety-blocked the generation
    Blocked(String),
    /// HTTP 400 or any other unexpected status
    Http { status: u16, message: String },
    /// The request never produced a response
    Transport(reqwest::Error),
}

/// The per-backend half of an adapter: request construction and response
/// extraction. The retry/fallback loop lives in [`run_fallback`].
#[async_trait]
pub(crate) trait ChatBackend: Send + Sync {
    fn descriptor(&self) -> &BackendDescriptor;

    /// One HTTP call against one model
    async fn attempt(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AttemptError>;
}

/// Bounded retry loop across one backend's model fallback list.
///
/// 429 sleeps and retries the same model until the policy is exhausted, then
/// advances. 401/403 fail the whole adapter immediately. Anything else is
/// recorded and advances to the next model. A too-short reply counts as a
/// validation failure, not a success.
pub(crate) async fn run_fallback<B: ChatBackend + ?Sized>(
    backend: &B,
    system_prompt: &str,
    user_prompt: &str,
    params: &GenerationParams,
) -> Result<BackendReply, BackendError> {
    let descriptor = backend.descriptor();
    let kind = descriptor.kind;

    if !descriptor.has_credential() {
        return Err(BackendError::AuthInvalid {
            backend: kind,
            message: format!("no API key configured (set {} or run `appforge config`)", kind.api_key_env()),
        });
    }

    let mut last_failure: Option<BackendError> = None;

    for model in &descriptor.models {
        let mut attempt = 1u32;
        loop {
            log_debug!("{kind}: attempt {attempt} against model {model}");
            match backend.attempt(model, system_prompt, user_prompt, params).await {
                Ok(text) => {
                    if text.trim().len() < MIN_REPLY_CHARS {
                        log_warn!(
                            "{kind}: reply from {model} too short ({} chars), advancing",
                            text.trim().len()
                        );
                        last_failure = Some(BackendError::Validation {
                            backend: kind,
                            message: format!("reply from {model} was only {} chars", text.trim().len()),
                        });
                        break;
                    }
                    return Ok(BackendReply {
                        text,
                        model: model.clone(),
                    });
                }
                Err(AttemptError::RateLimited {
                    retry_after,
                    message,
                }) => {
                    if attempt >= descriptor.retry.max_attempts {
                        log_warn!("{kind}: rate limit persisted on {model}, advancing");
                        last_failure = Some(BackendError::RateLimited {
                            backend: kind,
                            attempts: attempt,
                        });
                        break;
                    }
                    let delay = descriptor.retry.delay_for(attempt, retry_after);
                    log_debug!(
                        "{kind}: rate limited on {model} ({message}), sleeping {}s",
                        delay.as_secs_f32()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptError::Auth(message)) => {
                    return Err(BackendError::AuthInvalid {
                        backend: kind,
                        message,
                    });
                }
                Err(AttemptError::Permission(message)) => {
                    return Err(BackendError::PermissionDenied {
                        backend: kind,
                        message,
                    });
                }
                Err(AttemptError::Blocked(reason)) => {
                    log_warn!("{kind}: {model} blocked the generation ({reason}), advancing");
                    last_failure = Some(BackendError::Validation {
                        backend: kind,
                        message: format!("{model} blocked the generation: {reason}"),
                    });
                    break;
                }
                Err(AttemptError::Http { status, message }) => {
                    log_warn!("{kind}: {model} returned HTTP {status}, advancing");
                    last_failure = Some(BackendError::Http {
                        backend: kind,
                        status,
                        message,
                    });
                    break;
                }
                Err(AttemptError::Transport(source)) => {
                    log_warn!("{kind}: request to {model} failed in transit, advancing");
                    last_failure = Some(BackendError::Transport {
                        backend: kind,
                        source,
                    });
                    break;
                }
            }
        }
    }

    Err(last_failure.unwrap_or(BackendError::Validation {
        backend: kind,
        message: "no models configured".to_string(),
    }))
}

/// Classify a response by status and parse the body, so adapters only deal
/// with 2xx payloads.
pub(crate) async fn read_response(response: reqwest::Response) -> Result<Value, AttemptError> {
    let status = response.status();

    if status.is_success() {
        return response.json::<Value>().await.map_err(AttemptError::Transport);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response.text().await.unwrap_or_default();
    let message = truncate_message(&body);

    match status.as_u16() {
        401 => Err(AttemptError::Auth(message)),
        403 => Err(AttemptError::Permission(message)),
        429 => Err(AttemptError::RateLimited {
            retry_after,
            message,
        }),
        status => Err(AttemptError::Http { status, message }),
    }
}

/// Keep remote error bodies log-sized
pub(crate) fn truncate_message(body: &str) -> String {
    const MAX: usize = 240;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let cut = trimmed
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}…", &trimmed[..cut])
    }
}

/// Build the ordered adapter collection from configuration
pub fn build_adapters(descriptors: Vec<BackendDescriptor>) -> Vec<Box<dyn BackendAdapter>> {
    descriptors
        .into_iter()
        .map(|descriptor| match descriptor.kind {
            BackendKind::OpenAi => {
                Box::new(openai::OpenAiBackend::new(descriptor)) as Box<dyn BackendAdapter>
            }
            BackendKind::Anthropic => Box::new(anthropic::AnthropicBackend::new(descriptor)),
            BackendKind::Gemini => Box::new(gemini::GeminiBackend::new(descriptor)),
        })
        .collect()
}
