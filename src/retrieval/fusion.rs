//! Reciprocal Rank Fusion and the optional lexical rerank.
//!
//! RRF combines multiple ranked lists by summing `1/(k0 + rank)` per list
//! (rank 1-indexed). Based on: Cormack, Clarke, Buettcher (2009) -
//! "Reciprocal Rank Fusion outperforms Condorcet and individual Rank
//! Learning Methods".

use std::collections::HashMap;

use tracing::debug;

use crate::index::{technical_tokens, Bm25Index};
use crate::retrieval::{rank_order, Hit};

/// Fuses ranked lists with Reciprocal Rank Fusion.
///
/// Each `chunk_id` keeps one representative hit: the one with the highest
/// per-source score, ties resolved by source order (first list wins).
/// Output hits carry the fused score and are ordered by
/// `(−fused_score, doc_id, start_page, chunk_id)`.
#[must_use]
pub fn rrf_fuse(lists: &[Vec<Hit>], k0: f64) -> Vec<Hit> {
    struct Entry {
        fused: f64,
        representative: Hit,
    }

    let mut entries: HashMap<String, Entry> = HashMap::new();

    for list in lists {
        for (rank0, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (k0 + (rank0 as f64) + 1.0);
            match entries.get_mut(&hit.chunk_id) {
                Some(entry) => {
                    entry.fused += contribution;
                    // Strictly greater: on equal per-source scores the
                    // earlier source keeps the representative.
                    if hit.score > entry.representative.score {
                        entry.representative = hit.clone();
                    }
                }
                None => {
                    entries.insert(
                        hit.chunk_id.clone(),
                        Entry {
                            fused: contribution,
                            representative: hit.clone(),
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<Hit> = entries
        .into_values()
        .map(|entry| {
            let mut hit = entry.representative;
            hit.score = entry.fused;
            hit
        })
        .collect();
    fused.sort_by(rank_order);
    fused
}

/// Reranks the top fused candidates lexically against the original query.
///
/// Pool size is `max(final_k, rerank_pool)`. Primary key: exact presence
/// of any lowercased technical token from the original query in the hit
/// text (descending). Secondary key: BM25 [`Bm25Index::score_text`].
/// Tie-break: `(doc_id, start_page, chunk_id)`. Truncates to `final_k`.
#[must_use]
pub fn lexical_rerank(
    fused: Vec<Hit>,
    original_query: &str,
    index: &Bm25Index,
    rerank_pool: usize,
    final_k: usize,
) -> Vec<Hit> {
    let pool_size = rerank_pool.max(final_k);
    let mut pool: Vec<Hit> = fused.into_iter().take(pool_size).collect();

    let needles: Vec<String> = technical_tokens(original_query)
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();
    debug!(pool = pool.len(), needles = needles.len(), "lexical rerank");

    let mut keyed: Vec<(bool, f64, Hit)> = pool
        .drain(..)
        .map(|hit| {
            let haystack = hit.text.to_lowercase();
            let exact = needles.iter().any(|n| haystack.contains(n));
            let lexical = index.score_text(original_query, &hit.text);
            (exact, lexical, hit)
        })
        .collect();

    keyed.sort_by(|(a_exact, a_lex, a), (b_exact, b_lex, b)| {
        b_exact
            .cmp(a_exact)
            .then_with(|| b_lex.partial_cmp(a_lex).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.doc_id.cmp(&b.doc_id))
            .then_with(|| a.start_page.cmp(&b.start_page))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    keyed
        .into_iter()
        .take(final_k)
        .map(|(_, _, hit)| hit)
        .collect()
}
