//! Local backends for DocQA
//!
//! On-device embedders (a candle BERT model or a weight-free hashing
//! embedder) and a generator that talks to a locally running model server.
//! Loaded models are kept in a process-wide registry.

mod bert;
mod config;
mod hashing;
pub mod registry;
mod server;

pub use bert::{BertEmbedder, LocalEmbedder};
pub use config::{LocalConfig, LocalEmbedderKind};
pub use hashing::HashingEmbedder;
pub use server::LocalGenerator;

// Re-export core types for convenience
pub use docqa_core::{Embedder, Error, GenerationResult, Generator, Result};
