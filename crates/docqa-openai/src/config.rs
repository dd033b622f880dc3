//! OpenAI configuration

use serde::{Deserialize, Serialize};
use docqa_core::{Error, Result, env_lookup, parse_var};

/// Configuration for the hosted OpenAI-compatible backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chat_model: String,
    pub context_window: usize,
    pub max_new_tokens: usize,
    pub temperature: f32,
}

impl OpenAIConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_EMBEDDING_MODEL: &'static str = "text-embedding-3-small";
    pub const DEFAULT_CHAT_MODEL: &'static str = "gpt-3.5-turbo";

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::Configuration(
                "OPENAI_API_KEY environment variable not found".to_string()
            ))?;

        let defaults = Self::new(api_key);

        Ok(Self {
            base_url: lookup("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            embedding_model: lookup("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dimensions: parse_var(
                &lookup,
                "OPENAI_EMBEDDING_DIMENSIONS",
                defaults.embedding_dimensions,
            )?,
            chat_model: lookup("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            context_window: parse_var(&lookup, "OPENAI_CONTEXT_WINDOW", defaults.context_window)?,
            max_new_tokens: parse_var(&lookup, "OPENAI_MAX_NEW_TOKENS", defaults.max_new_tokens)?,
            temperature: parse_var(&lookup, "OPENAI_TEMPERATURE", defaults.temperature)?,
            api_key: defaults.api_key,
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            embedding_model: Self::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: 1536,
            chat_model: Self::DEFAULT_CHAT_MODEL.to_string(),
            context_window: 4096,
            max_new_tokens: 256,
            temperature: 0.0,
        }
    }
}
