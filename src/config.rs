//! Application configuration: backend credentials and model lists, publish
//! settings, generation thresholds. Stored as TOML under the user's config
//! directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::backends::{BackendDescriptor, BackendKind};
use crate::log_debug;
use crate::retry::RetryPolicy;
use crate::sanitizer::SanitizeLimits;

/// Configuration file name inside the config directory
const CONFIG_DIR_NAME: &str = "appforge";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable consulted when no publish token is configured
const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Top-level configuration
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Backend tried first when the user does not override it
    pub default_backend: String,
    /// Per-backend configuration, keyed by backend name
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    /// Publish settings
    #[serde(default)]
    pub publish: PublishConfig,
    /// Generation acceptance thresholds
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Per-backend configuration
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct BackendConfig {
    /// API key for the backend
    #[serde(default)]
    pub api_key: String,
    /// Ordered model fallback list; empty means the backend's defaults
    #[serde(default)]
    pub models: Vec<String>,
    /// Rate limit retry behavior
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Declarative rate-limit retry settings
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::rate_limit(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// Publish settings
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PublishConfig {
    /// GitHub personal access token
    #[serde(default)]
    pub token: String,
    /// Branch whose ref receives the publish commit
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Whether freshly created repositories are private
    #[serde(default)]
    pub private: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            branch: default_branch(),
            private: false,
        }
    }
}

impl PublishConfig {
    /// Configured token, falling back to the conventional env variable
    pub fn effective_token(&self) -> String {
        if self.token.is_empty() {
            std::env::var(GITHUB_TOKEN_ENV).unwrap_or_default()
        } else {
            self.token.clone()
        }
    }
}

/// Generation acceptance thresholds
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerationConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_min_lines")]
    pub min_lines: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            min_lines: default_min_lines(),
        }
    }
}

impl GenerationConfig {
    pub fn limits(&self) -> SanitizeLimits {
        SanitizeLimits {
            min_chars: self.min_chars,
            min_lines: self.min_lines,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_min_chars() -> usize {
    200
}
fn default_min_lines() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        let backends = BackendKind::ALL
            .iter()
            .map(|kind| (kind.name().to_string(), BackendConfig::default()))
            .collect();
        Self {
            default_backend: BackendKind::OpenAi.name().to_string(),
            backends,
            publish: PublishConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration file, or defaults when none exists yet
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            log_debug!("config: no file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| {
            format!(
                "Invalid configuration file format in {}. Check the file for syntax errors",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Persist to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Persist to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        log_debug!("config: saved to {}", path.display());
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let base = config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// The default backend as a typed kind
    pub fn default_backend_kind(&self) -> Result<BackendKind> {
        BackendKind::from_str(&self.default_backend).map_err(|_| {
            anyhow!(
                "Unknown default backend '{}'. Supported: {}",
                self.default_backend,
                BackendKind::ALL
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    /// Mutable per-backend config, created on first access
    pub fn backend_config_mut(&mut self, kind: BackendKind) -> &mut BackendConfig {
        self.backends.entry(kind.name().to_string()).or_default()
    }

    /// Build the ordered backend descriptors the pipeline runs against.
    ///
    /// Order is the fixed configuration order; per-request preference is the
    /// orchestrator's concern. Missing API keys fall back to each backend's
    /// conventional environment variable.
    pub fn backend_descriptors(&self) -> Vec<BackendDescriptor> {
        BackendKind::ALL
            .iter()
            .map(|kind| {
                let entry = self.backends.get(kind.name());
                let api_key = entry
                    .map(|e| e.api_key.clone())
                    .filter(|key| !key.is_empty())
                    .unwrap_or_else(|| std::env::var(kind.api_key_env()).unwrap_or_default());
                let models = entry
                    .map(|e| e.models.clone())
                    .filter(|models| !models.is_empty())
                    .unwrap_or_else(|| kind.default_models());
                let retry = entry.map(|e| e.retry.policy()).unwrap_or_default();

                BackendDescriptor {
                    kind: *kind,
                    api_key,
                    models,
                    retry,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_backend() {
        let config = Config::default();
        assert_eq!(config.backends.len(), BackendKind::ALL.len());
        assert_eq!(config.default_backend, "openai");
        assert_eq!(config.publish.branch, "main");
    }

    #[test]
    fn descriptors_follow_configuration_order() {
        let config = Config::default();
        let descriptors = config.backend_descriptors();
        let kinds: Vec<BackendKind> = descriptors.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, BackendKind::ALL.to_vec());
    }

    #[test]
    fn configured_models_override_defaults() {
        let mut config = Config::default();
        config.backend_config_mut(BackendKind::Gemini).models =
            vec!["gemini-experimental".to_string()];

        let descriptors = config.backend_descriptors();
        let gemini = descriptors
            .iter()
            .find(|d| d.kind == BackendKind::Gemini)
            .expect("gemini descriptor");
        assert_eq!(gemini.models, vec!["gemini-experimental".to_string()]);
    }

    #[test]
    fn retry_config_maps_to_policy() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        };
        let policy = retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(3));
    }

    #[test]
    fn minimal_toml_fills_in_defaults() {
        let config: Config = toml::from_str("default_backend = \"anthropic\"")
            .expect("minimal config should parse");
        assert_eq!(
            config.default_backend_kind().ok(),
            Some(BackendKind::Anthropic)
        );
        assert_eq!(config.generation.min_chars, 200);
        assert!(!config.publish.private);
    }
}
