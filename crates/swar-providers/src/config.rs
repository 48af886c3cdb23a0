//! Configuration loading and the classifier factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use swar_core::classifier::ClassifierAdapter;
use swar_core::engine::EngineConfig;
use swar_core::scoring::{Bands, ScoringConfig};
use swar_core::session::SessionConfig;
use swar_core::traits::AnswerClassifier;

use crate::anthropic::{self, AnthropicClassifier};
use crate::gemini::{self, GeminiClassifier};
use crate::ollama::{self, OllamaClassifier};
use crate::openai::{self, OpenAiClassifier};

/// Environment variable that replaces the configured API key.
pub const API_KEY_ENV: &str = "SWAR_LLM_API_KEY";

/// Configuration for the external classifier.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Gemini {
        api_key: String,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                model,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                model,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Gemini {
                api_key: _,
                model,
                base_url,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { model, base_url } => f
                .debug_struct("Ollama")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Provider name as used in `type = ".."`.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::OpenAI { .. } => "openai",
            ProviderConfig::Anthropic { .. } => "anthropic",
            ProviderConfig::Gemini { .. } => "gemini",
            ProviderConfig::Ollama { .. } => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. }
            | ProviderConfig::Anthropic { model, .. }
            | ProviderConfig::Gemini { model, .. }
            | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    fn api_key_mut(&mut self) -> Option<&mut String> {
        match self {
            ProviderConfig::OpenAI { api_key, .. }
            | ProviderConfig::Anthropic { api_key, .. }
            | ProviderConfig::Gemini { api_key, .. } => Some(api_key),
            ProviderConfig::Ollama { .. } => None,
        }
    }

    /// Expand `${VAR}` references in every string field.
    fn resolved(&self) -> ProviderConfig {
        let opt = |o: &Option<String>| o.as_ref().map(|s| resolve_env_vars(s));
        match self {
            ProviderConfig::OpenAI {
                api_key,
                model,
                base_url,
                org_id,
            } => ProviderConfig::OpenAI {
                api_key: resolve_env_vars(api_key),
                model: resolve_env_vars(model),
                base_url: opt(base_url),
                org_id: opt(org_id),
            },
            ProviderConfig::Anthropic {
                api_key,
                model,
                base_url,
            } => ProviderConfig::Anthropic {
                api_key: resolve_env_vars(api_key),
                model: resolve_env_vars(model),
                base_url: opt(base_url),
            },
            ProviderConfig::Gemini {
                api_key,
                model,
                base_url,
            } => ProviderConfig::Gemini {
                api_key: resolve_env_vars(api_key),
                model: resolve_env_vars(model),
                base_url: opt(base_url),
            },
            ProviderConfig::Ollama { model, base_url } => ProviderConfig::Ollama {
                model: resolve_env_vars(model),
                base_url: opt(base_url),
            },
        }
    }
}

fn default_openai_model() -> String {
    openai::DEFAULT_MODEL.to_string()
}
fn default_anthropic_model() -> String {
    anthropic::DEFAULT_MODEL.to_string()
}
fn default_gemini_model() -> String {
    gemini::DEFAULT_MODEL.to_string()
}
fn default_ollama_model() -> String {
    ollama::DEFAULT_MODEL.to_string()
}

/// A provider the factory knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub default_model: &'static str,
    pub needs_api_key: bool,
}

/// Every supported provider.
pub const SUPPORTED_PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        name: "openai",
        default_model: openai::DEFAULT_MODEL,
        needs_api_key: true,
    },
    ProviderInfo {
        name: "anthropic",
        default_model: anthropic::DEFAULT_MODEL,
        needs_api_key: true,
    },
    ProviderInfo {
        name: "gemini",
        default_model: gemini::DEFAULT_MODEL,
        needs_api_key: true,
    },
    ProviderInfo {
        name: "ollama",
        default_model: ollama::DEFAULT_MODEL,
        needs_api_key: false,
    },
];

/// Top-level swar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarConfig {
    /// External classifier. Absent means local validation only.
    #[serde(default)]
    pub classifier: Option<ProviderConfig>,
    /// Upper bound on one classifier call.
    #[serde(default = "default_classifier_timeout")]
    pub classifier_timeout_ms: u64,
    /// Sessions scoring below this are flagged.
    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: u8,
    /// Narrative bands, independent of `flag_threshold`.
    #[serde(default)]
    pub bands: Bands,
    /// Responses allowed per bank question before a session is forced to end.
    #[serde(default = "default_max_responses_factor")]
    pub max_responses_factor: usize,
    /// Max concurrent sessions.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_classifier_timeout() -> u64 {
    8000
}
fn default_flag_threshold() -> u8 {
    75
}
fn default_max_responses_factor() -> usize {
    2
}
fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./swar-reports")
}

impl Default for SwarConfig {
    fn default() -> Self {
        Self {
            classifier: None,
            classifier_timeout_ms: default_classifier_timeout(),
            flag_threshold: default_flag_threshold(),
            bands: Bands::default(),
            max_responses_factor: default_max_responses_factor(),
            parallelism: default_parallelism(),
            output_dir: default_output_dir(),
        }
    }
}

impl SwarConfig {
    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig {
            flag_threshold: self.flag_threshold,
            bands: self.bands,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            max_responses_factor: self.max_responses_factor,
        }
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    /// Engine settings derived from this config.
    pub fn engine(&self, refine: bool) -> EngineConfig {
        EngineConfig {
            parallelism: self.parallelism.max(1),
            session: self.session(),
            scoring: self.scoring(),
            refine,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `swar.toml` in the current directory
/// 2. `~/.config/swar/config.toml`
///
/// `SWAR_LLM_API_KEY` overrides the configured classifier's key.
pub fn load_config() -> Result<SwarConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SwarConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("swar.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content).with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SwarConfig::default(),
    };

    Ok(apply_overrides(config, std::env::var(API_KEY_ENV).ok()))
}

/// Parse a config document.
pub fn parse_config(content: &str) -> Result<SwarConfig> {
    Ok(toml::from_str::<SwarConfig>(content)?)
}

fn apply_overrides(mut config: SwarConfig, api_key: Option<String>) -> SwarConfig {
    config.classifier = config.classifier.map(|c| {
        let mut resolved = c.resolved();
        if let (Some(key), Some(slot)) = (api_key.as_ref(), resolved.api_key_mut()) {
            *slot = key.clone();
        }
        resolved
    });
    config
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("swar"))
}

/// Create a classifier instance from its configuration.
pub fn create_classifier(config: &ProviderConfig, timeout: Duration) -> Arc<dyn AnswerClassifier> {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            model,
            base_url,
            org_id,
        } => Arc::new(OpenAiClassifier::new(
            api_key,
            model,
            base_url.clone(),
            org_id.clone(),
            timeout,
        )),
        ProviderConfig::Anthropic {
            api_key,
            model,
            base_url,
        } => Arc::new(AnthropicClassifier::new(api_key, model, base_url.clone(), timeout)),
        ProviderConfig::Gemini {
            api_key,
            model,
            base_url,
        } => Arc::new(GeminiClassifier::new(api_key, model, base_url.clone(), timeout)),
        ProviderConfig::Ollama { model, base_url } => {
            Arc::new(OllamaClassifier::new(model, base_url.clone(), timeout))
        }
    }
}

/// Build the adapter the engine talks to.
///
/// With `enabled = false`, or no configured classifier, every refinement is
/// produced locally.
pub fn build_adapter(config: &SwarConfig, enabled: bool) -> ClassifierAdapter {
    match (&config.classifier, enabled) {
        (Some(provider), true) => {
            tracing::info!(
                provider = provider.name(),
                model = provider.model(),
                timeout_ms = config.classifier_timeout_ms,
                "using external classifier"
            );
            let timeout = config.classifier_timeout();
            ClassifierAdapter::new(Some(create_classifier(provider, timeout)), timeout)
        }
        _ => ClassifierAdapter::fallback_only(),
    }
}
