//! Error types for DocQA

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the DocQA system
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load {file}: {message}")]
    Load { file: String, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a per-file load failure
    pub fn load(file: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Load {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Whether a retry policy may try the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Errors after which the active mode cannot serve requests until the
    /// environment is fixed or the mode is switched
    pub fn is_fatal_to_mode(&self) -> bool {
        matches!(self, Error::ModelLoad(_) | Error::Resource(_))
    }

    /// Short remediation line for the user
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Authentication(_) => Some("Check OPENAI_API_KEY or switch to local mode with `:mode local`."),
            Error::RateLimited { .. } => Some("The hosted API is throttling requests; wait a moment and ask again."),
            Error::Network(_) => Some("Check your network connection or switch to local mode with `:mode local`."),
            Error::ModelLoad(_) => Some("Local model unavailable; fix the model setup or switch with `:mode hosted`."),
            Error::Resource(_) => Some("Not enough memory for the local model; switch with `:mode hosted`."),
            Error::Timeout(_) => Some("Generation took too long; raise --timeout-secs or ask a shorter question."),
            Error::Configuration(_) => Some("Fix the configuration and restart."),
            Error::Busy(_) => Some("Wait for the current request to finish."),
            Error::InvalidState(_) => Some("Load documents first with `:load <files>`."),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Resource(format!("worker task failed: {}", err))
    }
}
