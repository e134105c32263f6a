//! Citation types, inline-marker parsing, and answer validation.
//!
//! Markers look like `[c1]`, `[c1][c2]`, or `[c1, c2]`, case-insensitive,
//! and always normalize to lowercase `c<N>`. Validation never repairs a
//! draft: unknown keys or uncited sentences reject the whole draft.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// The exact refusal sentinel; the only refusal text ever emitted.
pub const REFUSAL_SENTINEL: &str = "not found in provided docs";

/// One machine-checkable citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Citation key (`c1`, `c2`, ...).
    pub key: String,
    /// Source document identifier.
    pub doc_id: String,
    /// First cited page (1-based).
    pub start_page: u32,
    /// Last cited page (inclusive, `>= start_page`).
    pub end_page: u32,
    /// Cited chunk identifier.
    pub chunk_id: String,
}

/// A validated answer with its citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Answer text, or the refusal sentinel.
    pub answer: String,
    /// Citations backing the answer; empty iff the answer is a refusal.
    pub citations: Vec<Citation>,
    /// Machine-readable cause when the answer is a refusal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AnswerResult {
    /// Builds a refusal result.
    #[must_use]
    pub fn refusal(notes: Option<&str>) -> Self {
        Self {
            answer: REFUSAL_SENTINEL.to_string(),
            citations: Vec::new(),
            notes: notes.map(str::to_string),
        }
    }

    /// Whether this result is the refusal sentinel.
    #[must_use]
    pub fn is_refusal(&self) -> bool {
        self.answer == REFUSAL_SENTINEL
    }
}

/// Outcome of citation enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationCheck {
    /// The draft is (or begins with) the refusal sentinel.
    Refusal,
    /// Every sentence is cited with known keys.
    Valid {
        /// Used keys in numeric order.
        used_keys: Vec<String>,
    },
    /// The draft failed validation.
    Invalid {
        /// First failure encountered.
        reason: String,
    },
}

#[allow(clippy::unwrap_used)]
fn bracket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[\s*[cC]\d+(?:[\s,]+[cC]\d+)*\s*\]").unwrap())
}

#[allow(clippy::unwrap_used)]
fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[cC]\d+").unwrap())
}

/// Parses all citation keys from inline markers, normalized to lowercase,
/// in order of appearance with duplicates preserved.
#[must_use]
pub fn parse_inline_citation_keys(text: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for bracket in bracket_pattern().find_iter(text) {
        for key in key_pattern().find_iter(bracket.as_str()) {
            keys.push(key.as_str().to_lowercase());
        }
    }
    keys
}

/// Numeric component of a citation key (`c12` → 12).
fn key_number(key: &str) -> u64 {
    key.trim_start_matches(['c', 'C']).parse().unwrap_or(0)
}

/// Enforces the inline-citation contract on a generated draft.
///
/// Sentinel drafts (exact match or case-insensitive prefix) yield
/// [`CitationCheck::Refusal`]. Otherwise every sentence must carry at
/// least one marker and every marker must reference a known key; used
/// keys come back in numeric order.
#[must_use]
pub fn enforce_inline_citations(text: &str, known_keys: &BTreeSet<String>) -> CitationCheck {
    let trimmed = text.trim();
    if trimmed.to_lowercase().starts_with(REFUSAL_SENTINEL) {
        return CitationCheck::Refusal;
    }
    if trimmed.is_empty() {
        return CitationCheck::Invalid {
            reason: "empty draft".to_string(),
        };
    }

    let mut used: BTreeSet<String> = BTreeSet::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        for sentence in line.unicode_sentences() {
            if !is_substantive(sentence) {
                continue;
            }
            let keys = parse_inline_citation_keys(sentence);
            if keys.is_empty() {
                let excerpt: String = sentence.chars().take(60).collect();
                return CitationCheck::Invalid {
                    reason: format!("sentence without citation marker: {excerpt}"),
                };
            }
            for key in keys {
                if !known_keys.contains(&key) {
                    return CitationCheck::Invalid {
                        reason: format!("unknown citation key: {key}"),
                    };
                }
                used.insert(key);
            }
        }
    }

    let mut used_keys: Vec<String> = used.into_iter().collect();
    used_keys.sort_by_key(|k| key_number(k));
    CitationCheck::Valid { used_keys }
}

/// Whether a sentence contains content that needs a citation. Bullet
/// glyphs, bare markers, and punctuation-only fragments do not.
fn is_substantive(sentence: &str) -> bool {
    let without_markers = bracket_pattern().replace_all(sentence, "");
    without_markers.chars().any(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_single_marker() {
        assert_eq!(parse_inline_citation_keys("claim [c1]."), vec!["c1"]);
    }

    #[test]
    fn test_parse_adjacent_brackets() {
        assert_eq!(parse_inline_citation_keys("claim [c1][c2]"), vec!["c1", "c2"]);
    }

    #[test]
    fn test_parse_comma_form() {
        assert_eq!(parse_inline_citation_keys("claim [c1, c2]"), vec!["c1", "c2"]);
        assert_eq!(parse_inline_citation_keys("claim [c1 c2]"), vec!["c1", "c2"]);
    }

    #[test]
    fn test_parse_case_insensitive_normalizes() {
        assert_eq!(parse_inline_citation_keys("claim [C3]"), vec!["c3"]);
    }

    #[test]
    fn test_parse_ignores_non_citation_brackets() {
        assert!(parse_inline_citation_keys("array[0] and [note]").is_empty());
    }

    #[test]
    fn test_enforce_valid_bullets() {
        let text = "- ML-KEM is a KEM [c1]\n- ML-DSA is a signature scheme [c2]";
        let check = enforce_inline_citations(text, &keys(&["c1", "c2"]));
        assert_eq!(
            check,
            CitationCheck::Valid {
                used_keys: vec!["c1".to_string(), "c2".to_string()]
            }
        );
    }

    #[test]
    fn test_enforce_multi_marker_sentence() {
        let text = "Both schemes differ in purpose [c1][c2].";
        let check = enforce_inline_citations(text, &keys(&["c1", "c2"]));
        assert!(matches!(check, CitationCheck::Valid { .. }));
    }

    #[test]
    fn test_enforce_rejects_uncited_sentence() {
        let text = "Cited claim [c1]. Uncited claim.";
        let check = enforce_inline_citations(text, &keys(&["c1"]));
        assert!(matches!(check, CitationCheck::Invalid { .. }));
    }

    #[test]
    fn test_enforce_rejects_unknown_key() {
        let text = "A claim [c9].";
        let check = enforce_inline_citations(text, &keys(&["c1"]));
        if let CitationCheck::Invalid { reason } = check {
            assert!(reason.contains("c9"));
        } else {
            unreachable!("expected invalid");
        }
    }

    #[test]
    fn test_enforce_sentinel_exact() {
        let check = enforce_inline_citations("not found in provided docs", &keys(&["c1"]));
        assert_eq!(check, CitationCheck::Refusal);
    }

    #[test]
    fn test_enforce_sentinel_prefix_case_insensitive() {
        let check = enforce_inline_citations(
            "Not found in provided docs. The corpus has nothing on this.",
            &keys(&["c1"]),
        );
        assert_eq!(check, CitationCheck::Refusal);
    }

    #[test]
    fn test_enforce_empty_draft() {
        let check = enforce_inline_citations("   \n ", &keys(&["c1"]));
        assert!(matches!(check, CitationCheck::Invalid { .. }));
    }

    #[test]
    fn test_used_keys_numeric_order() {
        let text = "first [c10]\nsecond [c2]";
        let check = enforce_inline_citations(text, &keys(&["c2", "c10"]));
        assert_eq!(
            check,
            CitationCheck::Valid {
                used_keys: vec!["c2".to_string(), "c10".to_string()]
            }
        );
    }

    #[test]
    fn test_refusal_result_invariant() {
        let result = AnswerResult::refusal(Some("insufficient_evidence"));
        assert!(result.is_refusal());
        assert!(result.citations.is_empty());
        assert_eq!(result.answer, REFUSAL_SENTINEL);
    }

    #[test]
    fn test_marker_only_line_is_not_substantive() {
        assert!(!is_substantive("[c1]"));
        assert!(!is_substantive("- "));
        assert!(is_substantive("a claim [c1]"));
    }
}
