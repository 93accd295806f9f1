//! Error taxonomy for the generation and publish pipeline.
//!
//! Typed errors carry a remediation hint in their `Display` output: a user
//! should never see a bare status code without knowing what to fix.

use thiserror::Error;

use crate::backends::BackendKind;

/// Broad failure classes, ordered by how actionable they are for the user.
///
/// When an orchestration exhausts every backend, the aggregate error speaks
/// with the voice of the highest class seen, regardless of which backend
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorClass {
    Generic,
    RateLimited,
    PermissionDenied,
    AuthInvalid,
}

/// Terminal failure of one backend adapter.
///
/// Transient conditions (429) are absorbed and retried inside the adapter;
/// only classifications that ended the adapter's attempt surface here.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(
        "{backend} authentication failed: {message}. Set a valid key with `appforge config --backend {backend} --api-key <key>`"
    )]
    AuthInvalid {
        backend: BackendKind,
        message: String,
    },

    #[error(
        "{backend} denied the request (HTTP 403): {message}. Check that the key has access to the configured models"
    )]
    PermissionDenied {
        backend: BackendKind,
        message: String,
    },

    #[error(
        "{backend} kept rate limiting after {attempts} attempts. Wait a moment and retry, or set a different default backend"
    )]
    RateLimited { backend: BackendKind, attempts: u32 },

    #[error("{backend} returned unusable output: {message}")]
    Validation {
        backend: BackendKind,
        message: String,
    },

    #[error("{backend} request failed with HTTP {status}: {message}")]
    Http {
        backend: BackendKind,
        status: u16,
        message: String,
    },

    #[error("{backend} request failed before a response arrived: {source}")]
    Transport {
        backend: BackendKind,
        source: reqwest::Error,
    },
}

impl BackendError {
    /// Backend that produced this error
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::AuthInvalid { backend, .. }
            | Self::PermissionDenied { backend, .. }
            | Self::RateLimited { backend, .. }
            | Self::Validation { backend, .. }
            | Self::Http { backend, .. }
            | Self::Transport { backend, .. } => *backend,
        }
    }

    /// Class used for aggregate prioritization
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthInvalid { .. } => ErrorClass::AuthInvalid,
            Self::PermissionDenied { .. } => ErrorClass::PermissionDenied,
            Self::RateLimited { .. } => ErrorClass::RateLimited,
            Self::Validation { .. } | Self::Http { .. } | Self::Transport { .. } => {
                ErrorClass::Generic
            }
        }
    }
}

/// Aggregate raised once every configured backend has been exhausted.
///
/// The message surfaces the most actionable failure class seen across all
/// attempts; the per-backend errors stay available for logging.
#[derive(Debug)]
pub struct GenerateError {
    attempts: Vec<BackendError>,
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for GenerateError {}

impl GenerateError {
    pub fn new(attempts: Vec<BackendError>) -> Self {
        Self { attempts }
    }

    /// Every per-backend failure, in the order the backends were tried
    pub fn attempts(&self) -> &[BackendError] {
        &self.attempts
    }

    /// Highest-priority class across all attempts
    pub fn class(&self) -> ErrorClass {
        self.attempts
            .iter()
            .map(BackendError::class)
            .max()
            .unwrap_or(ErrorClass::Generic)
    }

    fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "No generation backend is configured. Add an API key with `appforge config`"
                .to_string();
        }

        // Surface the most actionable failure first, whichever backend hit it
        let class = self.class();
        let leading = self
            .attempts
            .iter()
            .find(|e| e.class() == class)
            .map(ToString::to_string)
            .unwrap_or_default();

        match class {
            ErrorClass::AuthInvalid | ErrorClass::PermissionDenied | ErrorClass::RateLimited => {
                format!("Generation failed across {} backend(s). {leading}", self.attempts.len())
            }
            ErrorClass::Generic => format!(
                "No backend produced a usable app ({} tried). Try rephrasing the description, or configure another backend",
                self.attempts.len()
            ),
        }
    }
}

/// Rejection raised by the sanitizer when generated text is too small to be
/// a real program. Signals the orchestrator to move on to the next backend.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("generated output too short to be an app ({chars} chars, {lines} lines)")]
    Insufficient { chars: usize, lines: usize },
}

/// Failure of the publish pipeline.
///
/// Everything after the branch-readiness wait raises immediately; blob,
/// tree, commit, and ref calls are never blindly retried.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(
        "GitHub rejected the token (HTTP 401): {message}. Generate a new personal access token and store it with `appforge config --github-token <token>`"
    )]
    AuthInvalid { message: String },

    #[error(
        "The GitHub token cannot write to this repository: {message}. Grant it the `public_repo` scope (`repo` for private repositories)"
    )]
    PermissionDenied { message: String },

    /// Creation race: another creator grabbed the name first. The pipeline
    /// recovers by re-running the existence check.
    #[error("repository name already taken")]
    NameTaken,

    #[error("nothing to publish: the manifest is empty")]
    EmptyManifest,

    #[error(
        "The repository was created but its branch never became readable ({attempts} checks). Retry the publish in a few seconds"
    )]
    RepositoryNotReady { attempts: u32 },

    #[error("GitHub is rate limiting this token (HTTP 429): {message}. Wait before retrying")]
    RateLimited { message: String },

    #[error("GitHub request failed with HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("GitHub request failed before a response arrived: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation(backend: BackendKind) -> BackendError {
        BackendError::Validation {
            backend,
            message: "too short".to_string(),
        }
    }

    #[test]
    fn class_ordering_prefers_auth() {
        assert!(ErrorClass::AuthInvalid > ErrorClass::PermissionDenied);
        assert!(ErrorClass::PermissionDenied > ErrorClass::RateLimited);
        assert!(ErrorClass::RateLimited > ErrorClass::Generic);
    }

    #[test]
    fn aggregate_surfaces_auth_over_rate_limit() {
        let err = GenerateError::new(vec![
            BackendError::RateLimited {
                backend: BackendKind::OpenAi,
                attempts: 3,
            },
            BackendError::AuthInvalid {
                backend: BackendKind::Anthropic,
                message: "invalid x-api-key".to_string(),
            },
        ]);

        assert_eq!(err.class(), ErrorClass::AuthInvalid);
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn aggregate_of_validation_failures_is_generic() {
        let err = GenerateError::new(vec![
            validation(BackendKind::OpenAi),
            validation(BackendKind::Anthropic),
            validation(BackendKind::Gemini),
        ]);

        let message = err.to_string();
        assert!(message.contains("usable app"));
        assert!(!message.contains("rate limit"));
        assert!(!message.contains("API key"));
    }
}
