//! swar-providers: external answer classifiers.
//!
//! Implements the `AnswerClassifier` trait for OpenAI-compatible APIs,
//! Anthropic, Gemini and Ollama, and turns a `swar.toml` into a ready
//! `ClassifierAdapter`.

pub mod anthropic;
pub mod config;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{
    build_adapter, create_classifier, load_config, load_config_from, ProviderConfig, SwarConfig,
    SUPPORTED_PROVIDERS,
};
pub use swar_core::error::ClassifierError;
