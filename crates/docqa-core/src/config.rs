//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Parse an optional variable, falling back to a default when it is unset
pub fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            Error::Configuration(format!("{} has an invalid value: '{}'", key, raw))
        }),
        _ => Ok(default),
    }
}

/// Parse a boolean flag such as `1`, `true`, `yes`, `off`
pub fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Configuration(format!(
                "{} has an invalid value: '{}'",
                key, raw
            ))),
        },
        None => Ok(default),
    }
}

/// Look up a process environment variable
pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Configuration for chunking, retrieval and generation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Number of chunks sent to the embedder per request
    pub embed_batch_size: usize,
    /// Ceiling on a single generation call
    pub generation_timeout: Duration,
    /// Number of leading chunks covered by the summary
    pub summary_chunks: usize,
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: 4,
            embed_batch_size: 32,
            generation_timeout: Duration::from_secs(120),
            summary_chunks: 3,
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::parse_lookup(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse variables without validating their combination
    ///
    /// Callers layering further overrides on top must call [`RagConfig::validate`]
    /// once they are applied.
    pub fn parse_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            chunk_size: parse_var(&lookup, "DOCQA_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(&lookup, "DOCQA_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_var(&lookup, "DOCQA_TOP_K", defaults.top_k)?,
            embed_batch_size: parse_var(
                &lookup,
                "DOCQA_EMBED_BATCH_SIZE",
                defaults.embed_batch_size,
            )?,
            generation_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DOCQA_GENERATION_TIMEOUT_SECS",
                defaults.generation_timeout.as_secs(),
            )?),
            summary_chunks: parse_var(&lookup, "DOCQA_SUMMARY_CHUNKS", defaults.summary_chunks)?,
            retry: defaults.retry,
        })
    }

    /// Reject parameter combinations the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embed_batch_size == 0 {
            return Err(Error::Configuration(
                "embed_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(Error::Configuration(
                "generation timeout must be greater than 0".to_string(),
            ));
        }
        self.retry.validate()
    }
}
