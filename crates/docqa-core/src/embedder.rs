//! Embedder trait

use async_trait::async_trait;

use crate::{Error, Result};

/// Trait for embedding backends (hosted API, on-device model, ...)
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector, and every vector has exactly [`Embedder::dimensions`] entries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts, returning one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider(format!("{} returned no embedding", self.model_id())))
    }

    /// Dimensionality of the vectors this embedder produces
    fn dimensions(&self) -> usize;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}

/// Check that a backend response has one vector of the right size per input
pub fn check_embeddings(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dimensions: usize,
) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(Error::Provider(format!(
            "expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }

    match vectors.iter().find(|v| v.len() != dimensions) {
        Some(bad) => Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}
