//! Chunk record type.
//!
//! A chunk is a contiguous span of text on one or more pages of one source
//! document, carrying the citation fields and the dense-aligned row index.
//! Records are immutable after the corpus build.

use serde::{Deserialize, Serialize};

/// One chunk of corpus text with its citation fields.
///
/// `chunk_id` is the deterministic composition
/// `{doc_id}::p{page:04}::c{idx:03}` and is globally unique. `vector_id`
/// is the dense-aligned row index; across the corpus the ids form the
/// contiguous range `[0, N)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Dense-aligned row index.
    pub vector_id: u32,
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Source document identifier (e.g. `FIPS.203`).
    pub doc_id: String,
    /// First page covered (1-based).
    pub start_page: u32,
    /// Last page covered (inclusive, `>= start_page`).
    pub end_page: u32,
    /// Chunk text (non-empty).
    pub text: String,
}

/// Composes the canonical chunk id from its parts.
#[must_use]
pub fn compose_chunk_id(doc_id: &str, page: u32, idx: u32) -> String {
    format!("{doc_id}::p{page:04}::c{idx:03}")
}

impl ChunkRecord {
    /// Validates the per-record invariants.
    ///
    /// Returns a description of the first violated invariant, or `None`.
    #[must_use]
    pub fn invariant_violation(&self) -> Option<String> {
        if self.chunk_id.is_empty() {
            return Some("empty chunk_id".to_string());
        }
        if self.doc_id.is_empty() {
            return Some("empty doc_id".to_string());
        }
        if self.text.is_empty() {
            return Some("empty text".to_string());
        }
        if self.start_page < 1 {
            return Some(format!("start_page {} < 1", self.start_page));
        }
        if self.end_page < self.start_page {
            return Some(format!(
                "end_page {} < start_page {}",
                self.end_page, self.start_page
            ));
        }
        if !self.chunk_id.starts_with(&format!("{}::p", self.doc_id)) {
            return Some(format!(
                "chunk_id {} does not begin with doc_id {}",
                self.chunk_id, self.doc_id
            ));
        }
        None
    }

    /// Page span rendered as `pX-pY`.
    #[must_use]
    pub fn page_span(&self) -> String {
        format!("p{}-p{}", self.start_page, self.end_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ChunkRecord {
        ChunkRecord {
            vector_id: 0,
            chunk_id: compose_chunk_id("FIPS.203", 17, 2),
            doc_id: "FIPS.203".to_string(),
            start_page: 17,
            end_page: 18,
            text: "ML-KEM.KeyGen produces an encapsulation key.".to_string(),
        }
    }

    #[test]
    fn test_compose_chunk_id() {
        assert_eq!(compose_chunk_id("FIPS.203", 17, 2), "FIPS.203::p0017::c002");
        assert_eq!(compose_chunk_id("FIPS.204", 1, 0), "FIPS.204::p0001::c000");
    }

    #[test]
    fn test_valid_record() {
        assert!(record().invariant_violation().is_none());
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut r = record();
        r.text = String::new();
        assert_eq!(r.invariant_violation().as_deref(), Some("empty text"));
    }

    #[test]
    fn test_inverted_page_span_rejected() {
        let mut r = record();
        r.end_page = 3;
        assert!(r.invariant_violation().unwrap().contains("end_page"));
    }

    #[test]
    fn test_zero_start_page_rejected() {
        let mut r = record();
        r.start_page = 0;
        r.end_page = 0;
        assert!(r.invariant_violation().unwrap().contains("start_page"));
    }

    #[test]
    fn test_mismatched_doc_id_rejected() {
        let mut r = record();
        r.doc_id = "FIPS.204".to_string();
        assert!(r
            .invariant_violation()
            .unwrap()
            .contains("does not begin with"));
    }

    #[test]
    fn test_page_span_render() {
        assert_eq!(record().page_span(), "p17-p18");
    }

    #[test]
    fn test_serde_round_trip() {
        let r = record();
        let json = serde_json::to_string(&r).unwrap();
        let back: ChunkRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
