//! The retrieval pipeline facade.
//!
//! Per query: generate variants, pull per-variant pools from the lexical
//! and dense sources, fuse with RRF, optionally rerank lexically, and
//! truncate to the final cutoff. Deterministic end to end for a fixed
//! corpus and configuration.

use std::sync::Arc;

use tracing::debug;

use crate::config::{RetrievalConfig, RetrievalMode, VectorBackend};
use crate::corpus::ChunkStore;
use crate::error::Result;
use crate::index::Bm25Index;
use crate::retrieval::{
    expand_query, lexical_rerank, rrf_fuse, DenseIndex, DenseRetriever, FlatDenseIndex, Hit,
};

/// Hybrid retriever over the lexical index and the dense adapter.
pub struct Retriever {
    store: Arc<ChunkStore>,
    bm25: Arc<Bm25Index>,
    dense: DenseRetriever,
    config: RetrievalConfig,
}

impl Retriever {
    /// Creates a retriever with the built-in flat dense index.
    #[must_use]
    pub fn new(store: Arc<ChunkStore>, bm25: Arc<Bm25Index>, config: RetrievalConfig) -> Self {
        let flat = FlatDenseIndex::build(&store);
        Self::with_dense_index(store, bm25, config, Box::new(flat))
    }

    /// Creates a retriever with an injected dense engine.
    #[must_use]
    pub fn with_dense_index(
        store: Arc<ChunkStore>,
        bm25: Arc<Bm25Index>,
        config: RetrievalConfig,
        dense: Box<dyn DenseIndex>,
    ) -> Self {
        let dense = DenseRetriever::new(dense, Arc::clone(&store));
        Self {
            store,
            bm25,
            dense,
            config,
        }
    }

    /// The chunk store backing this retriever.
    #[must_use]
    pub const fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// The lexical index backing this retriever.
    #[must_use]
    pub fn bm25(&self) -> &Bm25Index {
        &self.bm25
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Runs the full pipeline for one query.
    ///
    /// # Errors
    ///
    /// Propagates dense-engine failures; lexical retrieval is infallible.
    pub fn retrieve(&self, query: &str) -> Result<Vec<Hit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let variants = if self.config.query_fusion {
            expand_query(query)
        } else {
            vec![query.to_string()]
        };
        let per_source_k = self.config.per_source_k();
        let final_k = self.config.top_k;

        let mut lists: Vec<Vec<Hit>> = Vec::new();
        for variant in &variants {
            match self.config.mode {
                RetrievalMode::Base => {
                    lists.push(self.single_source(variant, per_source_k)?);
                }
                RetrievalMode::Hybrid => {
                    lists.push(self.bm25.search(variant, per_source_k));
                    if self.config.backend == VectorBackend::Faiss {
                        lists.push(self.dense.search(variant, per_source_k)?);
                    }
                }
            }
        }
        debug!(
            variants = variants.len(),
            lists = lists.len(),
            per_source_k,
            "retrieval pools collected"
        );

        // A single ranked list needs no fusion; its native scores survive.
        let mut fused = if lists.len() == 1 {
            lists.pop().unwrap_or_default()
        } else {
            rrf_fuse(&lists, self.config.rrf_k0)
        };

        if self.config.enable_rerank {
            fused = lexical_rerank(fused, query, &self.bm25, self.config.rerank_pool, final_k);
        } else {
            fused.truncate(final_k);
        }
        Ok(fused)
    }

    fn single_source(&self, variant: &str, k: usize) -> Result<Vec<Hit>> {
        match self.config.backend {
            VectorBackend::Faiss => self.dense.search(variant, k),
            VectorBackend::Bm25 => Ok(self.bm25.search(variant, k)),
        }
    }
}
