//! Question routing and anchor extraction.
//!
//! Regex-based heuristics applied in a fixed priority order: compare,
//! definition, algorithm, then general retrieval. All patterns are
//! anchored to small question strings, so regex cost is bounded.

use std::sync::OnceLock;

use regex::Regex;

use crate::agent::state::{CompareArgs, ModeHint, Plan, PlanAction};

fn compare_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)differences?\s+between\s+(.+?)\s+and\s+(.+)$",
            r"(?i)\bcompare\s+(.+?)\s+(?:and|with)\s+(.+)$",
            r"(?i)\bcomparison\s+of\s+(.+?)\s+and\s+(.+)$",
            r"(?i)^(.+?)\s+(?:vs\.?|versus)\s+(.+)$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

#[allow(clippy::unwrap_used)]
fn definition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\bwhat\s+(?:is|are)\b|\bdefine\b|\bexplain\b").unwrap())
}

#[allow(clippy::unwrap_used)]
fn algorithm_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\balgorithm\s+\d+\b|shake128|shake256|\bxof\b").unwrap())
}

fn anchor_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\balgorithm\s+\d+\b",
            r"(?i)\btable\s+\d+\b",
            r"(?i)\bsection\s+\d+(?:\.\d+)+\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Keyword anchors checked as case-insensitive substrings.
const KEYWORD_ANCHORS: &[&str] = &["keygen", "encaps", "decaps", "shake128", "shake256", "xof"];

/// Strips interrogative framing and punctuation from an extracted topic.
fn clean_topic(raw: &str) -> String {
    let mut topic = raw.trim();
    topic = topic.trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
    topic = topic.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    let lower = topic.to_lowercase();
    for prefix in ["the ", "a ", "an "] {
        if lower.starts_with(prefix) {
            topic = &topic[prefix.len()..];
            break;
        }
    }
    topic.trim().to_string()
}

/// Extracts compare topics, rejecting identical pairs.
#[must_use]
pub fn compare_topics(question: &str) -> Option<CompareArgs> {
    for pattern in compare_patterns() {
        if let Some(caps) = pattern.captures(question) {
            let topic_a = clean_topic(caps.get(1).map_or("", |m| m.as_str()));
            let topic_b = clean_topic(caps.get(2).map_or("", |m| m.as_str()));
            if topic_a.is_empty() || topic_b.is_empty() {
                continue;
            }
            if topic_a.eq_ignore_ascii_case(&topic_b) {
                return None;
            }
            return Some(CompareArgs { topic_a, topic_b });
        }
    }
    None
}

/// Routes a question to a plan.
#[must_use]
pub fn route(question: &str) -> Plan {
    if let Some(args) = compare_topics(question) {
        return Plan {
            action: PlanAction::Compare,
            query: Some(question.to_string()),
            args: Some(args),
            mode_hint: ModeHint::Compare,
        };
    }

    if definition_pattern().is_match(question) {
        return Plan {
            action: PlanAction::ResolveDefinition,
            query: Some(question.to_string()),
            args: None,
            mode_hint: ModeHint::Definition,
        };
    }

    if algorithm_pattern().is_match(question) {
        return Plan {
            action: PlanAction::Retrieve,
            query: Some(question.to_string()),
            args: None,
            mode_hint: ModeHint::Algorithm,
        };
    }

    Plan {
        action: PlanAction::Retrieve,
        query: Some(question.to_string()),
        args: None,
        mode_hint: ModeHint::General,
    }
}

/// Extracts anchor tokens from a question, lowercased, first-seen order.
///
/// Anchors are distinctive patterns (`Algorithm 12`, `Table 3`,
/// `Section 4.2`) and a small keyword set; their absence from all evidence
/// text signals a retrieval miss.
#[must_use]
pub fn extract_anchor_tokens(question: &str) -> Vec<String> {
    let mut anchors: Vec<String> = Vec::new();

    for pattern in anchor_patterns() {
        for m in pattern.find_iter(question) {
            let anchor = m.as_str().to_lowercase();
            let normalized = anchor.split_whitespace().collect::<Vec<_>>().join(" ");
            if !anchors.contains(&normalized) {
                anchors.push(normalized);
            }
        }
    }

    let lower = question.to_lowercase();
    for keyword in KEYWORD_ANCHORS {
        if lower.contains(keyword) {
            let keyword = (*keyword).to_string();
            if !anchors.contains(&keyword) {
                anchors.push(keyword);
            }
        }
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("What are the differences between ML-KEM and ML-DSA?", "ML-KEM", "ML-DSA"; "differences between")]
    #[test_case("compare ML-KEM with SLH-DSA", "ML-KEM", "SLH-DSA"; "compare with")]
    #[test_case("compare ML-KEM and ML-DSA", "ML-KEM", "ML-DSA"; "compare and")]
    #[test_case("comparison of encapsulation and decapsulation", "encapsulation", "decapsulation"; "comparison of")]
    #[test_case("ML-KEM vs ML-DSA", "ML-KEM", "ML-DSA"; "vs")]
    #[test_case("ML-KEM versus ML-DSA?", "ML-KEM", "ML-DSA"; "versus with question mark")]
    fn test_compare_topics(question: &str, a: &str, b: &str) {
        let args = compare_topics(question).unwrap();
        assert_eq!(args.topic_a, a);
        assert_eq!(args.topic_b, b);
    }

    #[test]
    fn test_identical_topics_rejected() {
        assert!(compare_topics("difference between ML-KEM and ML-KEM").is_none());
        // Routing falls back to general retrieve; "difference between" is
        // not a definition phrasing.
        let plan = route("difference between ML-KEM and ML-KEM");
        assert_eq!(plan.action, PlanAction::Retrieve);
    }

    #[test]
    fn test_route_priority_compare_over_definition() {
        // Contains "what are" but the compare pattern wins.
        let plan = route("What are the differences between ML-KEM and ML-DSA?");
        assert_eq!(plan.action, PlanAction::Compare);
        assert_eq!(plan.mode_hint, ModeHint::Compare);
        assert!(plan.args.is_some());
    }

    #[test]
    fn test_route_definition() {
        let plan = route("What is the encapsulation key?");
        assert_eq!(plan.action, PlanAction::ResolveDefinition);
        assert_eq!(plan.mode_hint, ModeHint::Definition);

        let plan = route("Explain rejection sampling");
        assert_eq!(plan.action, PlanAction::ResolveDefinition);
    }

    #[test]
    fn test_route_algorithm() {
        let plan = route("Steps of Algorithm 19");
        assert_eq!(plan.action, PlanAction::Retrieve);
        assert_eq!(plan.mode_hint, ModeHint::Algorithm);

        let plan = route("How is SHAKE128 used?");
        assert_eq!(plan.mode_hint, ModeHint::Algorithm);
    }

    #[test]
    fn test_route_general_default() {
        let plan = route("security requirements for module-lattice schemes");
        assert_eq!(plan.action, PlanAction::Retrieve);
        assert_eq!(plan.mode_hint, ModeHint::General);
        assert_eq!(plan.query.as_deref(), Some("security requirements for module-lattice schemes"));
    }

    #[test]
    fn test_extract_anchor_tokens_patterns() {
        let anchors = extract_anchor_tokens("See Algorithm 12 and Table 3 in Section 4.2");
        assert_eq!(anchors, vec!["algorithm 12", "table 3", "section 4.2"]);
    }

    #[test]
    fn test_extract_anchor_tokens_keywords() {
        let anchors = extract_anchor_tokens("How does ML-KEM.KeyGen use a XOF?");
        assert!(anchors.contains(&"keygen".to_string()));
        assert!(anchors.contains(&"xof".to_string()));
    }

    #[test]
    fn test_extract_anchor_dedup() {
        // shake128 matches both the algorithm pattern keyword list once.
        let anchors = extract_anchor_tokens("SHAKE128 and shake128");
        assert_eq!(anchors, vec!["shake128"]);
    }

    #[test]
    fn test_no_anchors() {
        assert!(extract_anchor_tokens("general overview of lattices").is_empty());
    }

    #[test]
    fn test_clean_topic_strips_articles_and_punctuation() {
        assert_eq!(clean_topic("the ML-KEM scheme?"), "ML-KEM scheme");
        assert_eq!(clean_topic("  ML-DSA.  "), "ML-DSA");
    }
}
