//! Deterministic query-variant expansion.
//!
//! A pure function of the input string: identity first, then component
//! expansions of technical tokens, scheme dot-name variants, `Algorithm N`
//! variants, and compare-topic variants, deduplicated in first-seen order.

use std::sync::OnceLock;

use regex::Regex;

use crate::agent::compare_topics;
use crate::index::{split_components, technical_tokens};
use crate::schemes::{contains_phrase, schemes_in};

#[allow(clippy::unwrap_used)]
fn algorithm_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\balgorithm\s+(\d+)\b").unwrap())
}

/// Expands a query into retrieval variants.
///
/// The input itself is always the first variant (so single-variant callers
/// degrade to the plain query), and the result is a pure function of the
/// input string.
///
/// # Examples
///
/// ```
/// use citeseek::retrieval::expand_query;
///
/// let variants = expand_query("What is ML-KEM?");
/// assert_eq!(variants[0], "What is ML-KEM?");
/// assert!(variants.contains(&"What is ML-KEM? ML KEM".to_string()));
/// ```
#[must_use]
pub fn expand_query(query: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    };

    // 1. The query itself.
    push(query.to_string());

    // 2. Technical tokens expanded to their components.
    let tokens = technical_tokens(query);
    for token in &tokens {
        let components = split_components(token).join(" ");
        push(format!("{query} {components}"));
    }

    // 3. Operation phrasings become scheme dot-names.
    for scheme in schemes_in(query) {
        for (phrase, op) in scheme.ops {
            if contains_phrase(query, phrase) {
                push(format!("{query} {}.{op}", scheme.root));
            }
        }
    }

    // 4. `Algorithm N` alone and joined with each technical token.
    if let Some(caps) = algorithm_number_pattern().captures(query) {
        let number = caps.get(1).map_or("", |m| m.as_str());
        let phrase = format!("Algorithm {number}");
        push(phrase.clone());
        for token in &tokens {
            push(format!("{phrase} {token}"));
        }
    }

    // 5. Compare intent: one variant per topic.
    if let Some(args) = compare_topics(query) {
        push(args.topic_a);
        push(args.topic_b);
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_first() {
        let variants = expand_query("plain question");
        assert_eq!(variants[0], "plain question");
    }

    #[test]
    fn test_technical_token_components() {
        let variants = expand_query("How does ML-KEM.Encaps work?");
        assert!(variants.contains(&"How does ML-KEM.Encaps work? ML KEM Encaps".to_string()));
    }

    #[test]
    fn test_scheme_dot_name_variant() {
        let variants = expand_query("ML-KEM key generation");
        assert!(variants.contains(&"ML-KEM key generation ML-KEM.KeyGen".to_string()));
    }

    #[test]
    fn test_sign_variant_for_dsa() {
        let variants = expand_query("How does ML-DSA sign a message?");
        assert!(variants.contains(&"How does ML-DSA sign a message? ML-DSA.Sign".to_string()));
    }

    #[test]
    fn test_no_dot_name_without_scheme() {
        let variants = expand_query("key generation in general");
        assert_eq!(variants, vec!["key generation in general"]);
    }

    #[test]
    fn test_algorithm_number_variants() {
        let variants = expand_query("What are the steps of Algorithm 19 in ML-KEM?");
        assert!(variants.contains(&"Algorithm 19".to_string()));
        assert!(variants.contains(&"Algorithm 19 ML-KEM".to_string()));
    }

    #[test]
    fn test_compare_variants() {
        let variants = expand_query("differences between ML-KEM and ML-DSA");
        assert!(variants.contains(&"ML-KEM".to_string()));
        assert!(variants.contains(&"ML-DSA".to_string()));
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let variants = expand_query("ML-KEM vs ML-KEM.KeyGen key generation");
        let mut seen = std::collections::HashSet::new();
        for v in &variants {
            assert!(seen.insert(v.clone()), "duplicate variant: {v}");
        }
        assert_eq!(variants[0], "ML-KEM vs ML-KEM.KeyGen key generation");
    }

    #[test]
    fn test_pure_function() {
        let q = "What are the differences between ML-KEM and ML-DSA in Algorithm 2?";
        assert_eq!(expand_query(q), expand_query(q));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn input_is_first_and_output_deduped(q in "[ -~]{1,80}") {
                let variants = expand_query(&q);
                prop_assert_eq!(variants.first().cloned(), Some(q.clone()));
                let unique: std::collections::HashSet<_> = variants.iter().collect();
                prop_assert_eq!(unique.len(), variants.len());
            }
        }
    }
}
