//! Retrieval metrics: Recall@k, MRR@k, nDCG@k.
//!
//! Relevance is strict by default (document match plus inclusive page
//! overlap); relaxed variants exist as diagnostics. Each gold span counts
//! at most once per metric.

use crate::eval::dataset::GoldSpan;
use crate::retrieval::Hit;

/// Relevance definition used when matching hits to gold spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    /// Document match and inclusive page-range overlap.
    Strict,
    /// Document match only; pages ignored.
    DocOnly,
    /// Document match with page overlap after expanding either span by ±t.
    NearPage(u32),
}

impl Relevance {
    /// Whether a hit matches a gold span under this definition.
    #[must_use]
    pub fn matches(self, hit: &Hit, gold: &GoldSpan) -> bool {
        if hit.doc_id != gold.doc_id {
            return false;
        }
        match self {
            Self::DocOnly => true,
            Self::Strict => ranges_overlap(hit.start_page, hit.end_page, gold.start_page, gold.end_page),
            Self::NearPage(t) => ranges_overlap(
                hit.start_page.saturating_sub(t),
                hit.end_page.saturating_add(t),
                gold.start_page,
                gold.end_page,
            ),
        }
    }
}

/// Inclusive range overlap.
const fn ranges_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Recall@k: fraction of gold spans matched by at least one top-k hit.
#[must_use]
pub fn recall_at_k(hits: &[Hit], gold: &[GoldSpan], k: usize, relevance: Relevance) -> f64 {
    if gold.is_empty() {
        return 0.0;
    }
    let top = &hits[..hits.len().min(k)];
    let matched = gold
        .iter()
        .filter(|span| top.iter().any(|hit| relevance.matches(hit, span)))
        .count();
    matched as f64 / gold.len() as f64
}

/// MRR@k: reciprocal rank of the first relevant hit, 0 if none.
#[must_use]
pub fn mrr_at_k(hits: &[Hit], gold: &[GoldSpan], k: usize, relevance: Relevance) -> f64 {
    let top = &hits[..hits.len().min(k)];
    for (i, hit) in top.iter().enumerate() {
        if gold.iter().any(|span| relevance.matches(hit, span)) {
            return 1.0 / (i as f64 + 1.0);
        }
    }
    0.0
}

/// nDCG@k with binary gains.
///
/// Each gold span contributes gain once, credited to the first hit that
/// covers it; the ideal DCG assumes `min(|gold|, k)` unit gains at the
/// top.
#[must_use]
pub fn ndcg_at_k(hits: &[Hit], gold: &[GoldSpan], k: usize, relevance: Relevance) -> f64 {
    if gold.is_empty() || k == 0 {
        return 0.0;
    }

    let top = &hits[..hits.len().min(k)];
    let mut span_used = vec![false; gold.len()];
    let mut dcg = 0.0;
    for (i, hit) in top.iter().enumerate() {
        let gain = gold.iter().enumerate().find_map(|(g, span)| {
            (!span_used[g] && relevance.matches(hit, span)).then_some(g)
        });
        if let Some(g) = gain {
            span_used[g] = true;
            dcg += 1.0 / ((i + 2) as f64).log2();
        }
    }

    let ideal_hits = gold.len().min(k);
    let idcg: f64 = (0..ideal_hits).map(|i| 1.0 / ((i + 2) as f64).log2()).sum();
    if idcg == 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}
