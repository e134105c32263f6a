//! In-memory chunk store.
//!
//! Loads the chunk corpus once at startup and is read-only thereafter.
//! Lookup by `chunk_id` and by `vector_id`; deterministic iteration order
//! is ascending `vector_id`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::corpus::ChunkRecord;
use crate::error::{CorpusError, Result};

/// In-memory mapping `vector_id` ↔ chunk metadata/text.
///
/// Records are held in a single vector indexed by `vector_id` (the load
/// path enforces the contiguous `[0, N)` range), with a side map from
/// `chunk_id` to that index.
#[derive(Debug)]
pub struct ChunkStore {
    records: Vec<ChunkRecord>,
    by_chunk_id: HashMap<String, usize>,
}

impl ChunkStore {
    /// Builds a store from records, validating all corpus invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError`] on any invariant violation: non-contiguous
    /// `vector_id`, duplicate `chunk_id`, empty text, or a bad page span.
    pub fn from_records(records: Vec<ChunkRecord>) -> Result<Self> {
        let mut by_chunk_id = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.vector_id as usize != position {
                return Err(CorpusError::NonContiguousVectorId {
                    found: record.vector_id,
                    position,
                }
                .into());
            }
            if let Some(reason) = record.invariant_violation() {
                return Err(CorpusError::InvalidRecord {
                    line: position + 1,
                    reason,
                }
                .into());
            }
            if by_chunk_id
                .insert(record.chunk_id.clone(), position)
                .is_some()
            {
                return Err(CorpusError::DuplicateChunkId {
                    chunk_id: record.chunk_id.clone(),
                }
                .into());
            }
        }
        Ok(Self {
            records,
            by_chunk_id,
        })
    }

    /// Loads a store from a line-based JSON file, ascending `vector_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError`] if the file cannot be read, a line fails to
    /// parse, or the records violate corpus invariants.
    pub fn load_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let file = File::open(path.as_ref()).map_err(|e| CorpusError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| CorpusError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ChunkRecord =
                serde_json::from_str(&line).map_err(|e| CorpusError::InvalidRecord {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            records.push(record);
        }

        let store = Self::from_records(records)?;
        info!(chunks = store.len(), path = %path_str, "chunk store loaded");
        Ok(store)
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a chunk by its id.
    #[must_use]
    pub fn get_by_chunk_id(&self, chunk_id: &str) -> Option<&ChunkRecord> {
        self.by_chunk_id.get(chunk_id).map(|&i| &self.records[i])
    }

    /// Looks up a chunk by its dense row index.
    #[must_use]
    pub fn get_by_vector_id(&self, vector_id: u32) -> Option<&ChunkRecord> {
        self.records.get(vector_id as usize)
    }

    /// Iterates chunks in ascending `vector_id` order.
    pub fn iter(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.records.iter()
    }

    /// Returns up to `window` neighbors on each side of `chunk_id`,
    /// constrained to the same `doc_id`, ordered by ascending `vector_id`
    /// (the seed itself is excluded).
    #[must_use]
    pub fn neighbors(&self, chunk_id: &str, window: usize) -> Vec<&ChunkRecord> {
        let Some(&seed_idx) = self.by_chunk_id.get(chunk_id) else {
            return Vec::new();
        };
        let seed_doc = &self.records[seed_idx].doc_id;

        let mut out = Vec::new();
        let low = seed_idx.saturating_sub(window);
        for idx in low..seed_idx {
            if &self.records[idx].doc_id == seed_doc {
                out.push(&self.records[idx]);
            }
        }
        let high = (seed_idx + window).min(self.records.len().saturating_sub(1));
        for idx in (seed_idx + 1)..=high {
            if &self.records[idx].doc_id == seed_doc {
                out.push(&self.records[idx]);
            }
        }
        out
    }
}
