//! OpenAI-compatible hosted backends for DocQA
//!
//! This crate provides the hosted implementations of the `Embedder` and
//! `Generator` traits.

mod chat;
mod client;
mod config;
mod embeddings;


pub use chat::OpenAIGenerator;
pub use client::OpenAIClient;
pub use config::OpenAIConfig;
pub use embeddings::OpenAIEmbedder;

// Re-export core types for convenience
pub use docqa_core::{Embedder, Error, GenerationResult, Generator, Result};
