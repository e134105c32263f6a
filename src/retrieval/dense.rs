//! Dense retriever adapter.
//!
//! The dense index is an external collaborator: anything that can map a
//! query string to top-k inner products over L2-normalized vectors
//! satisfies [`DenseIndex`]. The adapter resolves hit metadata through the
//! chunk store and enforces deterministic ordering.

use std::sync::Arc;

use tracing::debug;

use crate::corpus::ChunkStore;
use crate::error::Result;
use crate::retrieval::embed::{inner_product, HashEmbedder, DEFAULT_DIMENSIONS};
use crate::retrieval::{rank_order, Hit};

/// One raw dense hit: a row index and its inner-product score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseHit {
    /// Dense-aligned row index into the chunk store.
    pub vector_id: u32,
    /// Inner-product score over L2-normalized vectors.
    pub score: f32,
}

/// Contract for the external dense index.
///
/// Implementations must return deterministic order for a fixed query and
/// corpus; the adapter re-sorts resolved hits, so ties in `score` are
/// permitted as long as the hit *set* is stable.
pub trait DenseIndex: Send + Sync {
    /// Returns the top `k` rows for the query.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing engine is unavailable.
    fn search(&self, query: &str, k: usize) -> Result<Vec<DenseHit>>;
}

/// Built-in flat inner-product index over deterministic hash embeddings.
///
/// Exact search, no approximation: every chunk vector is scored against
/// the query. Adequate for standards-corpus sizes; larger deployments
/// swap in an ANN engine through [`DenseIndex`].
pub struct FlatDenseIndex {
    embedder: HashEmbedder,
    vectors: Vec<Vec<f32>>,
}

impl FlatDenseIndex {
    /// Builds the index by embedding every chunk in the store.
    #[must_use]
    pub fn build(store: &ChunkStore) -> Self {
        let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
        let vectors = store.iter().map(|r| embedder.embed(&r.text)).collect();
        Self { embedder, vectors }
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl DenseIndex for FlatDenseIndex {
    fn search(&self, query: &str, k: usize) -> Result<Vec<DenseHit>> {
        let query_vec = self.embedder.embed(query);
        let mut scored: Vec<DenseHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(vector_id, vec)| DenseHit {
                vector_id: vector_id as u32,
                score: inner_product(&query_vec, vec),
            })
            .collect();
        // Ties resolved by ascending vector_id; the adapter applies the
        // full (doc_id, start_page, chunk_id) order after resolution.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_id.cmp(&b.vector_id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Adapter wrapping a [`DenseIndex`] behind the uniform hit contract.
pub struct DenseRetriever {
    index: Box<dyn DenseIndex>,
    store: Arc<ChunkStore>,
}

impl DenseRetriever {
    /// Creates the adapter.
    #[must_use]
    pub fn new(index: Box<dyn DenseIndex>, store: Arc<ChunkStore>) -> Self {
        Self { index, store }
    }

    /// Searches the dense index and resolves metadata through the chunk
    /// store. Output is ordered by `(−score, doc_id, start_page, chunk_id)`.
    ///
    /// # Errors
    ///
    /// Propagates dense-engine failures.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        let raw = self.index.search(query, k)?;
        debug!(query, hits = raw.len(), "dense search");

        let mut hits: Vec<Hit> = raw
            .into_iter()
            .filter_map(|dh| {
                self.store
                    .get_by_vector_id(dh.vector_id)
                    .map(|record| Hit::from_record(record, f64::from(dh.score)))
            })
            .collect();
        hits.sort_by(rank_order);
        Ok(hits)
    }
}
