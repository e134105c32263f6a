//! Hybrid retrieval: dense adapter, query variants, fusion, evidence selection.

mod dense;
mod embed;
mod evidence;
mod fusion;
mod pipeline;
mod variants;

pub use dense::{DenseHit, DenseIndex, DenseRetriever, FlatDenseIndex};
pub use embed::HashEmbedder;
pub use evidence::{select_evidence, EvidenceSelection};
pub use fusion::{lexical_rerank, rrf_fuse};
pub use pipeline::Retriever;
pub use variants::expand_query;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::corpus::ChunkRecord;

/// One retrieval hit: a scored chunk with its citation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Retrieval score (BM25, inner product, or fused; higher is better).
    pub score: f64,
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Source document identifier.
    pub doc_id: String,
    /// First page covered (1-based).
    pub start_page: u32,
    /// Last page covered (inclusive).
    pub end_page: u32,
    /// Chunk text.
    pub text: String,
}

impl Hit {
    /// Builds a hit from a chunk record and a score.
    #[must_use]
    pub fn from_record(record: &ChunkRecord, score: f64) -> Self {
        Self {
            score,
            chunk_id: record.chunk_id.clone(),
            doc_id: record.doc_id.clone(),
            start_page: record.start_page,
            end_page: record.end_page,
            text: record.text.clone(),
        }
    }

    /// Page span rendered as `pX-pY`.
    #[must_use]
    pub fn page_span(&self) -> String {
        format!("p{}-p{}", self.start_page, self.end_page)
    }
}

/// Total order `(−score, doc_id, start_page, chunk_id)` used for ranked
/// output. Scores are finite by construction; `partial_cmp` falling back to
/// equal keeps the comparison total regardless.
#[must_use]
pub fn rank_order(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
        .then_with(|| a.start_page.cmp(&b.start_page))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Total order `(−score, doc_id, start_page, end_page, chunk_id)` used for
/// evidence selection.
#[must_use]
pub fn evidence_order(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
        .then_with(|| a.start_page.cmp(&b.start_page))
        .then_with(|| a.end_page.cmp(&b.end_page))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f64, doc_id: &str, page: u32, chunk: &str) -> Hit {
        Hit {
            score,
            chunk_id: chunk.to_string(),
            doc_id: doc_id.to_string(),
            start_page: page,
            end_page: page,
            text: "t".to_string(),
        }
    }

    #[test]
    fn test_rank_order_score_first() {
        let a = hit(2.0, "B", 9, "B::p0009::c000");
        let b = hit(1.0, "A", 1, "A::p0001::c000");
        assert_eq!(rank_order(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_rank_order_tie_breaks() {
        let a = hit(1.0, "A", 2, "A::p0002::c000");
        let b = hit(1.0, "A", 1, "A::p0001::c000");
        assert_eq!(rank_order(&a, &b), Ordering::Greater);

        let c = hit(1.0, "A", 1, "A::p0001::c001");
        assert_eq!(rank_order(&b, &c), Ordering::Less);
    }

    #[test]
    fn test_evidence_order_uses_end_page() {
        let a = hit(1.0, "A", 1, "x");
        let mut b = hit(1.0, "A", 1, "x");
        b.end_page = 2;
        assert_eq!(evidence_order(&a, &b), Ordering::Less);
    }
}
