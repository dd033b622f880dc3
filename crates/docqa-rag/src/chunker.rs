//! Fixed-size character chunking with overlap

use std::sync::Arc;

use docqa_core::{Chunk, Document, Error, Result};

/// Splits documents into overlapping windows of at most `chunk_size` characters
///
/// Boundaries are counted in Unicode scalar values, so a chunk never splits a
/// code point. Every chunk after the first starts `chunk_overlap` characters
/// before the end of its predecessor, and the last chunk ends at the end of
/// the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily chunk one document
    pub fn chunks(&self, document: &Arc<Document>) -> Chunks {
        Chunks {
            document: document.clone(),
            chunk_size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
            byte_start: 0,
            char_start: 0,
            ordinal: 0,
            done: document.text.is_empty(),
        }
    }

    /// Chunk several documents, keeping document order
    pub fn chunk_all(&self, documents: &[Arc<Document>]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunks(doc)).collect()
    }
}

/// Iterator over the chunks of a single document
///
/// Cloning yields an independent iterator from the same position.
#[derive(Debug, Clone)]
pub struct Chunks {
    document: Arc<Document>,
    chunk_size: usize,
    step: usize,
    byte_start: usize,
    char_start: usize,
    ordinal: usize,
    done: bool,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let rest = &self.document.text[self.byte_start..];
        let end = rest
            .char_indices()
            .nth(self.chunk_size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..end];

        let chunk = Chunk {
            document: self.document.clone(),
            ordinal: self.ordinal,
            start: self.char_start,
            text: window.to_string(),
        };

        if end == rest.len() {
            self.done = true;
        } else {
            // A non-final window holds exactly chunk_size characters, so the step exists
            let step_bytes = window
                .char_indices()
                .nth(self.step)
                .map(|(i, _)| i)
                .unwrap_or(end);
            self.byte_start += step_bytes;
            self.char_start += self.step;
        }
        self.ordinal += 1;

        Some(chunk)
    }
}
