//! Evidence selection: dedup, budgets, neighbor windowing.
//!
//! Produces the ordered evidence list the answer layer renders into the
//! prompt context. Citation keys `c1..cN` are assigned downstream in
//! exactly this order.

use std::collections::HashSet;

use tracing::debug;

use crate::config::AnswerConfig;
use crate::corpus::ChunkStore;
use crate::retrieval::{evidence_order, Hit};

/// Result of evidence selection.
#[derive(Debug, Clone)]
pub struct EvidenceSelection {
    /// Final ordered evidence items (primaries with neighbors adjacent).
    pub items: Vec<Hit>,
    /// Whether the unique-hit count reached `min_evidence_hits`.
    pub sufficient: bool,
}

/// Selects evidence from ranked hits under chunk and character budgets.
///
/// 1. Dedup by `chunk_id`, keeping the maximum score.
/// 2. Stable sort by `(−score, doc_id, start_page, end_page, chunk_id)`.
/// 3. Take primaries until `max_chunks` or the character budget is hit.
/// 4. Optionally expand each primary with up to `neighbor_window` same-doc
///    neighbors on each side, adjacent to their seed, under both budgets.
///
/// Too few unique hits is reported through `sufficient`, not an error.
#[must_use]
pub fn select_evidence(
    hits: &[Hit],
    store: &ChunkStore,
    config: &AnswerConfig,
) -> EvidenceSelection {
    // Dedup keeping max score; on equal scores the first occurrence wins.
    let mut deduped: Vec<Hit> = Vec::new();
    {
        let mut index_of: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for hit in hits {
            match index_of.get(hit.chunk_id.as_str()) {
                Some(&i) => {
                    if hit.score > deduped[i].score {
                        deduped[i].score = hit.score;
                    }
                }
                None => {
                    index_of.insert(hit.chunk_id.as_str(), deduped.len());
                    deduped.push(hit.clone());
                }
            }
        }
    }

    let sufficient = deduped.len() >= config.min_evidence_hits;
    deduped.sort_by(evidence_order);

    // Primary selection under both budgets. The top hit is always admitted
    // so an oversized first chunk cannot zero out the context.
    let mut primaries: Vec<Hit> = Vec::new();
    let mut used_chars = 0usize;
    for hit in &deduped {
        if primaries.len() >= config.max_context_chunks {
            break;
        }
        if !primaries.is_empty() && used_chars + hit.text.len() > config.max_context_chars {
            break;
        }
        used_chars += hit.text.len();
        primaries.push(hit.clone());
    }

    if !config.include_neighbor_chunks || config.neighbor_window == 0 {
        debug!(primaries = primaries.len(), sufficient, "evidence selected");
        return EvidenceSelection {
            items: primaries,
            sufficient,
        };
    }

    // Neighbor expansion: neighbors sit adjacent to their seed and count
    // against both budgets. Primary order is not altered.
    let mut in_context: HashSet<String> = primaries.iter().map(|h| h.chunk_id.clone()).collect();
    let mut used_chunks = primaries.len();
    let mut items: Vec<Hit> = Vec::with_capacity(primaries.len());

    for seed in &primaries {
        let neighbors = store.neighbors(&seed.chunk_id, config.neighbor_window);
        let seed_vid = store
            .get_by_chunk_id(&seed.chunk_id)
            .map_or(u32::MAX, |r| r.vector_id);

        let mut before: Vec<Hit> = Vec::new();
        let mut after: Vec<Hit> = Vec::new();
        for record in neighbors {
            if in_context.contains(&record.chunk_id) {
                continue;
            }
            if used_chunks >= config.max_context_chunks
                || used_chars + record.text.len() > config.max_context_chars
            {
                continue;
            }
            let neighbor = Hit::from_record(record, 0.0);
            in_context.insert(record.chunk_id.clone());
            used_chunks += 1;
            used_chars += record.text.len();
            if record.vector_id < seed_vid {
                before.push(neighbor);
            } else {
                after.push(neighbor);
            }
        }

        items.extend(before);
        items.push(seed.clone());
        items.extend(after);
    }

    debug!(items = items.len(), sufficient, "evidence selected with neighbors");
    EvidenceSelection { items, sufficient }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{compose_chunk_id, ChunkRecord};

    fn record(vector_id: u32, doc_id: &str, page: u32, idx: u32, text: &str) -> ChunkRecord {
        ChunkRecord {
            vector_id,
            chunk_id: compose_chunk_id(doc_id, page, idx),
            doc_id: doc_id.to_string(),
            start_page: page,
            end_page: page,
            text: text.to_string(),
        }
    }

    fn store() -> ChunkStore {
        ChunkStore::from_records(vec![
            record(0, "FIPS.203", 1, 0, "alpha"),
            record(1, "FIPS.203", 2, 0, "bravo"),
            record(2, "FIPS.203", 3, 0, "charlie"),
            record(3, "FIPS.204", 1, 0, "delta"),
        ])
        .unwrap()
    }

    fn hit_for(store: &ChunkStore, vector_id: u32, score: f64) -> Hit {
        Hit::from_record(store.get_by_vector_id(vector_id).unwrap(), score)
    }

    fn config() -> AnswerConfig {
        AnswerConfig {
            max_context_chunks: 3,
            max_context_chars: 10_000,
            min_evidence_hits: 2,
            require_citations: true,
            include_neighbor_chunks: false,
            neighbor_window: 1,
        }
    }

    #[test]
    fn test_dedup_keeps_max_score() {
        let store = store();
        let hits = vec![
            hit_for(&store, 0, 1.0),
            hit_for(&store, 0, 3.0),
            hit_for(&store, 1, 2.0),
        ];
        let selection = select_evidence(&hits, &store, &config());
        assert_eq!(selection.items.len(), 2);
        assert_eq!(selection.items[0].chunk_id, "FIPS.203::p0001::c000");
        assert!((selection.items[0].score - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chunk_budget() {
        let store = store();
        let hits = vec![
            hit_for(&store, 0, 4.0),
            hit_for(&store, 1, 3.0),
            hit_for(&store, 2, 2.0),
            hit_for(&store, 3, 1.0),
        ];
        let cfg = AnswerConfig {
            max_context_chunks: 2,
            ..config()
        };
        let selection = select_evidence(&hits, &store, &cfg);
        assert_eq!(selection.items.len(), 2);
    }

    #[test]
    fn test_char_budget() {
        let store = store();
        let hits = vec![
            hit_for(&store, 0, 4.0), // "alpha", 5 chars
            hit_for(&store, 1, 3.0), // "bravo", 5 chars
            hit_for(&store, 2, 2.0),
        ];
        let cfg = AnswerConfig {
            max_context_chars: 10,
            ..config()
        };
        let selection = select_evidence(&hits, &store, &cfg);
        assert_eq!(selection.items.len(), 2);
    }

    #[test]
    fn test_first_chunk_always_admitted() {
        let store = store();
        let hits = vec![hit_for(&store, 0, 4.0)];
        let cfg = AnswerConfig {
            max_context_chars: 1,
            ..config()
        };
        let selection = select_evidence(&hits, &store, &cfg);
        assert_eq!(selection.items.len(), 1);
    }

    #[test]
    fn test_insufficient_flag() {
        let store = store();
        let hits = vec![hit_for(&store, 0, 1.0)];
        let selection = select_evidence(&hits, &store, &config());
        assert!(!selection.sufficient);
        assert_eq!(selection.items.len(), 1);

        let hits = vec![hit_for(&store, 0, 1.0), hit_for(&store, 1, 0.5)];
        assert!(select_evidence(&hits, &store, &config()).sufficient);
    }

    #[test]
    fn test_neighbors_adjacent_to_seed() {
        let store = store();
        let hits = vec![hit_for(&store, 1, 5.0)];
        let cfg = AnswerConfig {
            include_neighbor_chunks: true,
            neighbor_window: 1,
            max_context_chunks: 5,
            ..config()
        };
        let selection = select_evidence(&hits, &store, &cfg);
        let ids: Vec<&str> = selection.items.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "FIPS.203::p0001::c000",
                "FIPS.203::p0002::c000",
                "FIPS.203::p0003::c000"
            ]
        );
    }

    #[test]
    fn test_neighbors_respect_chunk_budget() {
        let store = store();
        let hits = vec![hit_for(&store, 1, 5.0), hit_for(&store, 3, 4.0)];
        let cfg = AnswerConfig {
            include_neighbor_chunks: true,
            neighbor_window: 1,
            max_context_chunks: 2,
            ..config()
        };
        let selection = select_evidence(&hits, &store, &cfg);
        // Both budget slots are taken by primaries; no neighbors fit.
        assert_eq!(selection.items.len(), 2);
    }

    #[test]
    fn test_neighbors_never_cross_documents() {
        let store = store();
        let hits = vec![hit_for(&store, 3, 5.0)];
        let cfg = AnswerConfig {
            include_neighbor_chunks: true,
            neighbor_window: 2,
            max_context_chunks: 5,
            ..config()
        };
        let selection = select_evidence(&hits, &store, &cfg);
        assert_eq!(selection.items.len(), 1);
        assert_eq!(selection.items[0].doc_id, "FIPS.204");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let store = store();
        let hits = vec![
            hit_for(&store, 2, 1.0),
            hit_for(&store, 0, 1.0),
            hit_for(&store, 1, 1.0),
        ];
        let a = select_evidence(&hits, &store, &config());
        let b = select_evidence(&hits, &store, &config());
        let ids =
            |s: &EvidenceSelection| s.items.iter().map(|h| h.chunk_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        // Equal scores order by (doc_id, start_page, ...).
        assert_eq!(a.items[0].start_page, 1);
    }
}
