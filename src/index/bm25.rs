//! BM25 lexical index with a persisted single-file artifact.
//!
//! The index is built once by iterating chunks in ascending `vector_id` and
//! is read-only afterwards. Scoring is classical BM25:
//!
//! `score = Σ_t IDF(t) · (tf·(k1+1)) / (tf + k1·(1 − b + b·|d|/avgdl))`
//!
//! with `IDF(t) = ln(1 + (N − df + 0.5)/(df + 0.5))`. Unknown query tokens
//! contribute zero; an empty query yields zero results.

// Memory mapping requires unsafe but is read-only here.
#![allow(unsafe_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{ChunkRecord, ChunkStore};
use crate::error::{IndexError, Result};
use crate::index::tokenizer::tokenize;
use crate::retrieval::{rank_order, Hit};

/// Default BM25 term-frequency saturation.
pub const DEFAULT_K1: f64 = 1.2;

/// Default BM25 length normalization.
pub const DEFAULT_B: f64 = 0.75;

/// Artifact files above this size are memory-mapped instead of read whole.
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Per-token statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenStats {
    /// Document frequency.
    pub df: u32,
    /// Inverse document frequency.
    pub idf: f64,
}

/// BM25 index over the chunk corpus.
///
/// The struct is the artifact: serializing it produces the single-file
/// blob, and deserializing the blob restores an identical index. Maps use
/// `BTreeMap` so the serialized bytes are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    k1: f64,
    b: f64,
    avgdl: f64,
    doc_count: u32,
    vocab: BTreeMap<String, TokenStats>,
    postings: BTreeMap<String, Vec<(u32, u32)>>,
    doc_lengths: Vec<u32>,
    docs: Vec<ChunkRecord>,
}

impl Bm25Index {
    /// Builds the index from a chunk store with default parameters.
    #[must_use]
    pub fn build(store: &ChunkStore) -> Self {
        Self::build_with_params(store, DEFAULT_K1, DEFAULT_B)
    }

    /// Builds the index from a chunk store.
    ///
    /// Chunks are consumed in ascending `vector_id` order, so two builds
    /// over the same corpus produce identical artifacts.
    #[must_use]
    pub fn build_with_params(store: &ChunkStore, k1: f64, b: f64) -> Self {
        let mut postings: BTreeMap<String, Vec<(u32, u32)>> = BTreeMap::new();
        let mut doc_lengths = Vec::with_capacity(store.len());
        let mut docs = Vec::with_capacity(store.len());

        for (doc_idx, record) in store.iter().enumerate() {
            let tokens = tokenize(&record.text);
            doc_lengths.push(tokens.len() as u32);

            let mut tf: BTreeMap<String, u32> = BTreeMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for (token, count) in tf {
                postings.entry(token).or_default().push((doc_idx as u32, count));
            }
            docs.push(record.clone());
        }

        let doc_count = docs.len() as u32;
        let total_len: u64 = doc_lengths.iter().map(|&l| u64::from(l)).sum();
        let avgdl = if doc_count == 0 {
            0.0
        } else {
            total_len as f64 / f64::from(doc_count)
        };

        let n = f64::from(doc_count);
        let vocab = postings
            .iter()
            .map(|(token, plist)| {
                let df = plist.len() as u32;
                let idf = (1.0 + (n - f64::from(df) + 0.5) / (f64::from(df) + 0.5)).ln();
                (token.clone(), TokenStats { df, idf })
            })
            .collect();

        Self {
            k1,
            b,
            avgdl,
            doc_count,
            vocab,
            postings,
            doc_lengths,
            docs,
        }
    }

    /// Number of indexed documents (chunks).
    #[must_use]
    pub const fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// IDF of a token, if indexed.
    #[must_use]
    pub fn idf(&self, token: &str) -> Option<f64> {
        self.vocab.get(token).map(|s| s.idf)
    }

    /// Searches the index, returning the top `k` hits ordered by
    /// `(−score, doc_id, start_page, chunk_id)`.
    ///
    /// An empty query yields zero results; unknown tokens contribute zero.
    #[must_use]
    pub fn search(&self, query: &str, k: usize) -> Vec<Hit> {
        let tokens = unique_tokens(query);
        if tokens.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scores: HashMap<u32, f64> = HashMap::new();
        for token in &tokens {
            let Some(stats) = self.vocab.get(token) else {
                continue;
            };
            let Some(plist) = self.postings.get(token) else {
                continue;
            };
            for &(doc_idx, tf) in plist {
                let dl = f64::from(self.doc_lengths[doc_idx as usize]);
                let tf = f64::from(tf);
                let norm = tf + self.k1 * (1.0 - self.b + self.b * dl / self.avgdl);
                let contribution = stats.idf * (tf * (self.k1 + 1.0)) / norm;
                *scores.entry(doc_idx).or_insert(0.0) += contribution;
            }
        }

        let mut hits: Vec<Hit> = scores
            .into_iter()
            .map(|(doc_idx, score)| Hit::from_record(&self.docs[doc_idx as usize], score))
            .collect();
        hits.sort_by(rank_order);
        hits.truncate(k);
        hits
    }

    /// Scores ad-hoc text against a query using the index statistics.
    ///
    /// Used by the lexical rerank stage, where candidate text may differ
    /// from the indexed chunk set.
    #[must_use]
    pub fn score_text(&self, query: &str, text: &str) -> f64 {
        let query_tokens = unique_tokens(query);
        if query_tokens.is_empty() {
            return 0.0;
        }

        let text_tokens = tokenize(text);
        let dl = text_tokens.len() as f64;
        let mut tf: HashMap<&str, f64> = HashMap::new();
        for token in &text_tokens {
            *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let avgdl = if self.avgdl > 0.0 { self.avgdl } else { 1.0 };
        let mut score = 0.0;
        for token in &query_tokens {
            let Some(stats) = self.vocab.get(token) else {
                continue;
            };
            let Some(&freq) = tf.get(token.as_str()) else {
                continue;
            };
            let norm = freq + self.k1 * (1.0 - self.b + self.b * dl / avgdl);
            score += stats.idf * (freq * (self.k1 + 1.0)) / norm;
        }
        score
    }

    /// Persists the artifact to a single file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::WriteFailed`] on I/O failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let bytes = serde_json::to_vec(self).map_err(|e| IndexError::WriteFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(path.as_ref(), bytes).map_err(|e| IndexError::WriteFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        info!(path = %path_str, docs = self.doc_count, "BM25 artifact written");
        Ok(())
    }

    /// Loads the artifact from a file.
    ///
    /// Large artifacts are memory-mapped for the duration of the parse;
    /// the file handle closes as soon as the index is materialized.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the file is missing, unreadable, or does
    /// not deserialize.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        if !path.as_ref().exists() {
            return Err(IndexError::ArtifactNotFound { path: path_str }.into());
        }
        let file = File::open(path.as_ref()).map_err(|e| IndexError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        let size = file
            .metadata()
            .map_err(|e| IndexError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?
            .len();

        let index: Self = if size >= MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| IndexError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
            serde_json::from_slice(&mmap).map_err(IndexError::from)?
        } else {
            let bytes = std::fs::read(path.as_ref()).map_err(|e| IndexError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
            serde_json::from_slice(&bytes).map_err(IndexError::from)?
        };

        info!(path = %path_str, docs = index.doc_count, "BM25 artifact loaded");
        Ok(index)
    }
}

/// Query tokens deduplicated in first-seen order.
fn unique_tokens(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in tokenize(query) {
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}
