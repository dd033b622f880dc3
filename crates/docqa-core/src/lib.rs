//! Core traits and types for DocQA
//!
//! This crate defines the data model, error taxonomy and the capability-facing
//! interfaces (embedders and generators) shared by the backend crates and the
//! RAG pipeline, making the system test-friendly and extensible.

pub mod cache;
pub mod config;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod retry;
pub mod types;

pub use cache::{ModelCache, ModelKey};
pub use config::{RagConfig, env_lookup, parse_flag, parse_var};
pub use embedder::{Embedder, check_embeddings};
pub use error::{Error, Result};
pub use llm::{CHARS_PER_TOKEN, GenerationResult, Generator};
pub use retry::RetryPolicy;
pub use types::*;
