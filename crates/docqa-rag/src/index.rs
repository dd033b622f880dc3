//! In-memory vector index with atomic snapshot swaps

use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use docqa_core::{Chunk, Error, Result, ScoredChunk};

/// One immutable generation of the index
#[derive(Debug, Default)]
struct Snapshot {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    dimensions: usize,
}

/// Exact nearest-neighbour index over chunk embeddings
///
/// A build constructs a complete snapshot before swapping it in, so readers
/// see either the previous index or the new one, never a mix.
#[derive(Debug, Default)]
pub struct VectorIndex {
    snapshot: RwLock<Arc<Snapshot>>,
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// `1 - cosine_similarity`; a zero vector is treated as orthogonal to everything
fn cosine_distance(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    1.0 - dot / (norm_a * norm_b)
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    fn swap(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Replace the index contents with `chunks` and their `vectors`
    pub fn build(&self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let dimensions = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => return Err(Error::InvalidInput("vectors must not be empty".to_string())),
            None => return Err(Error::InvalidInput("cannot build an index without chunks".to_string())),
        };
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(Error::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        let norms = vectors.iter().map(|v| l2_norm(v)).collect();
        let count = chunks.len();
        self.swap(Snapshot {
            chunks,
            vectors,
            norms,
            dimensions,
        });

        info!(chunks = count, dimensions, "vector index built");
        Ok(())
    }

    /// The `k` nearest chunks by cosine distance, closest first
    ///
    /// Equal distances keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.current();
        if k == 0 || snapshot.chunks.is_empty() {
            return Ok(Vec::new());
        }
        if vector.len() != snapshot.dimensions {
            return Err(Error::DimensionMismatch {
                expected: snapshot.dimensions,
                actual: vector.len(),
            });
        }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = snapshot
            .vectors
            .iter()
            .zip(snapshot.norms.iter())
            .map(|(v, &norm)| cosine_distance(vector, query_norm, v, norm))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        debug!(k, returned = scored.len(), "index queried");

        Ok(scored
            .into_iter()
            .map(|(i, distance)| ScoredChunk {
                chunk: snapshot.chunks[i].clone(),
                distance,
            })
            .collect())
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.swap(Snapshot::default());
    }

    pub fn len(&self) -> usize {
        self.current().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector size of the current snapshot, if any
    pub fn dimensions(&self) -> Option<usize> {
        let snapshot = self.current();
        (!snapshot.chunks.is_empty()).then_some(snapshot.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::{Document, FileKind};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn chunks(name: &str, n: usize) -> Vec<Chunk> {
        let doc = Arc::new(Document::new(name, FileKind::Pdf, vec!["text".to_string()]));
        (0..n)
            .map(|i| Chunk {
                document: doc.clone(),
                ordinal: i,
                start: i,
                text: format!("chunk {}", i),
            })
            .collect()
    }

    #[test]
    fn test_nearest_first() {
        let index = VectorIndex::new();
        index
            .build(
                chunks("a.pdf", 3),
                vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .unwrap();

        let results = index.query(&[1.0, 0.1], 2).unwrap();
        let ordinals: Vec<usize> = results.iter().map(|r| r.chunk.ordinal).collect();
        assert_eq!(ordinals, vec![0, 2]);
        assert!(results[0].distance <= results[1].distance);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = VectorIndex::new();
        index
            .build(chunks("a.pdf", 4), vec![vec![1.0, 0.0]; 4])
            .unwrap();

        let ordinals: Vec<usize> = index
            .query(&[1.0, 0.0], 4)
            .unwrap()
            .iter()
            .map(|r| r.chunk.ordinal)
            .collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = VectorIndex::new();
        assert!(index.query(&[1.0, 0.0], 3).unwrap().is_empty());
        assert_eq!(index.dimensions(), None);

        index.build(chunks("a.pdf", 1), vec![vec![1.0, 0.0]]).unwrap();
        assert!(index.query(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = VectorIndex::new();
        index.build(chunks("a.pdf", 1), vec![vec![1.0, 0.0]]).unwrap();

        let err = index.query(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_build_validation() {
        let index = VectorIndex::new();
        assert!(matches!(
            index.build(chunks("a.pdf", 2), vec![vec![1.0]]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            index.build(chunks("a.pdf", 2), vec![vec![1.0], vec![1.0, 2.0]]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_clear() {
        let index = VectorIndex::new();
        index.build(chunks("a.pdf", 2), vec![vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(index.len(), 2);

        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_readers_never_see_mixed_builds() {
        let index = Arc::new(VectorIndex::new());
        index.build(chunks("old.pdf", 8), vec![vec![1.0, 0.0]; 8]).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let index = index.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let results = index.query(&[1.0, 0.0], 8).unwrap();
                    let first = results[0].chunk.source().to_string();
                    assert!(results.iter().all(|r| r.chunk.source() == first));
                    assert_eq!(results.len(), 8);
                }
            })
        };

        for round in 0..200 {
            let name = if round % 2 == 0 { "new.pdf" } else { "old.pdf" };
            index.build(chunks(name, 8), vec![vec![1.0, 0.0]; 8]).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn query_is_sorted_and_bounded(
            vectors in proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0, 8), 1..30),
            query in proptest::collection::vec(-1.0f32..1.0, 8),
            k in 0usize..40,
        ) {
            let index = VectorIndex::new();
            let n = vectors.len();
            index.build(chunks("p.pdf", n), vectors).unwrap();

            let results = index.query(&query, k).unwrap();
            prop_assert_eq!(results.len(), k.min(n));
            for pair in results.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
        }
    }
}
