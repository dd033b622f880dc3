//! Retrieval-augmented question answering over uploaded documents
//!
//! This crate turns PDF and DOCX uploads into overlapping text chunks, embeds
//! them into an in-memory vector index and answers questions by prompting a
//! generator with the closest chunks. The [`Orchestrator`] ties the pieces
//! together behind a small state machine.

pub mod chunker;
mod generation;
pub mod index;
pub mod loader;
pub mod prompt;
mod session;
pub mod summarizer;

pub use chunker::{Chunker, Chunks};
pub use generation::generate_within;
pub use index::VectorIndex;
pub use loader::{DocumentLoader, FailedFile, LoadReport, SkippedFile};
pub use prompt::{AssembledPrompt, assemble};
pub use session::{IngestReport, ModelProvider, Orchestrator, SessionEvent, SessionState};
pub use summarizer::Summary;

// Re-export core types for convenience
pub use docqa_core::{
    Answer, Chunk, Citation, Document, Embedder, Error, GenerationResult, Generator, Mode,
    RagConfig, Result, ScoredChunk, UploadedFile,
};
