//! Local backend configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use docqa_core::{Error, Result, env_lookup, parse_var};

/// Which on-device embedder serves the local mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalEmbedderKind {
    /// Sentence-transformers BERT model loaded from `model_dir`
    Bert,
    /// Feature-hashing embedder, needs no weights
    Hashing,
}

impl FromStr for LocalEmbedderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bert" | "minilm" => Ok(LocalEmbedderKind::Bert),
            "hashing" | "hash" => Ok(LocalEmbedderKind::Hashing),
            other => Err(Error::Configuration(format!(
                "unknown local embedder '{}', expected 'bert' or 'hashing'",
                other
            ))),
        }
    }
}

/// Configuration for the local embedding model and the local model server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub embedder: LocalEmbedderKind,
    pub embedding_model: String,
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`
    pub model_dir: PathBuf,
    pub embedding_dimensions: usize,
    pub max_sequence_length: usize,
    pub llm_url: String,
    pub llm_model: String,
    pub context_window: usize,
    pub max_new_tokens: usize,
    pub temperature: f32,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            embedder: LocalEmbedderKind::Bert,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            embedding_dimensions: 384,
            max_sequence_length: 256,
            llm_url: "http://localhost:11434".to_string(),
            llm_model: "mistral".to_string(),
            context_window: 2048,
            max_new_tokens: 256,
            temperature: 0.0,
        }
    }
}

impl LocalConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            embedder: parse_var(&lookup, "DOCQA_LOCAL_EMBEDDER", defaults.embedder)?,
            embedding_model: lookup("DOCQA_LOCAL_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            model_dir: lookup("DOCQA_LOCAL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            embedding_dimensions: parse_var(
                &lookup,
                "DOCQA_LOCAL_EMBEDDING_DIMENSIONS",
                defaults.embedding_dimensions,
            )?,
            max_sequence_length: parse_var(
                &lookup,
                "DOCQA_LOCAL_MAX_SEQUENCE_LENGTH",
                defaults.max_sequence_length,
            )?,
            llm_url: lookup("DOCQA_LOCAL_LLM_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.llm_url),
            llm_model: lookup("DOCQA_LOCAL_LLM_MODEL").unwrap_or(defaults.llm_model),
            context_window: parse_var(&lookup, "DOCQA_LOCAL_CONTEXT_WINDOW", defaults.context_window)?,
            max_new_tokens: parse_var(&lookup, "DOCQA_LOCAL_MAX_NEW_TOKENS", defaults.max_new_tokens)?,
            temperature: parse_var(&lookup, "DOCQA_LOCAL_TEMPERATURE", defaults.temperature)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimensions == 0 {
            return Err(Error::Configuration(
                "local embedding dimensions must be greater than 0".to_string(),
            ));
        }
        if self.max_new_tokens >= self.context_window {
            return Err(Error::Configuration(format!(
                "local max_new_tokens ({}) must be smaller than the context window ({})",
                self.max_new_tokens, self.context_window
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LocalConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.embedder, LocalEmbedderKind::Bert);
        assert_eq!(config.embedding_dimensions, 384);
        assert_eq!(config.llm_url, "http://localhost:11434");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCQA_LOCAL_EMBEDDER", "hashing"),
            ("DOCQA_LOCAL_EMBEDDING_DIMENSIONS", "256"),
            ("DOCQA_LOCAL_LLM_URL", "http://127.0.0.1:9000/"),
            ("DOCQA_LOCAL_LLM_MODEL", "llama2"),
        ]
        .into_iter()
        .collect();

        let config = LocalConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.embedder, LocalEmbedderKind::Hashing);
        assert_eq!(config.embedding_dimensions, 256);
        assert_eq!(config.llm_url, "http://127.0.0.1:9000");
        assert_eq!(config.llm_model, "llama2");
    }

    #[test]
    fn test_invalid_embedder_kind() {
        let err = LocalConfig::from_lookup(|key| {
            (key == "DOCQA_LOCAL_EMBEDDER").then(|| "word2vec".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
