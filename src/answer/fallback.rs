//! Deterministic answer fallbacks.
//!
//! When the generator refuses but the evidence plainly contains the goods,
//! two rule-based paths can still produce a cited answer: verbatim
//! extraction of numbered algorithm steps, and a minimal three-bullet
//! comparison. Both outputs go back through citation validation.

use std::sync::OnceLock;

use regex::Regex;

use crate::agent::CompareArgs;
use crate::answer::citations::Citation;
use crate::answer::prompt::{prettify, EvidenceItem};
use crate::retrieval::Hit;
use crate::schemes::{contains_phrase, find_scheme};

#[allow(clippy::unwrap_used)]
fn algorithm_question_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\balgorithm\s+(\d+)\b").unwrap())
}

#[allow(clippy::unwrap_used)]
fn step_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\s*(\d+:.*)$").unwrap())
}

/// Extracts verbatim numbered steps for an `Algorithm N` question.
///
/// Activates only when the question names `Algorithm N`. Searches the
/// selected evidence for a block containing that phrase together with
/// numbered step markers, and emits one bullet per step, each ending with
/// the citation key of its source chunk.
#[must_use]
pub fn algorithm_fallback(question: &str, items: &[EvidenceItem]) -> Option<String> {
    let caps = algorithm_question_pattern().captures(question)?;
    let number = caps.get(1)?.as_str();
    let phrase = format!("Algorithm {number}");

    for item in items {
        if !contains_phrase(&item.hit.text, &phrase) {
            continue;
        }
        let pretty = prettify(&item.hit.text);
        let steps: Vec<&str> = step_line_pattern()
            .captures_iter(&pretty)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim_end()))
            .collect();
        if steps.is_empty() {
            continue;
        }

        let mut out = String::new();
        for step in steps {
            out.push_str(&format!("- {step} [{}]\n", item.key));
        }
        return Some(out.trim_end().to_string());
    }
    None
}

/// Picks the best hit for a compare topic from the full deduped hit list.
///
/// Preference order: text mentioning the topic and its role phrase, then
/// text mentioning the topic at all. The hit excluded by `skip_chunk`
/// (the other topic's pick) is never reused.
fn pick_topic_hit<'a>(hits: &'a [Hit], topic: &str, skip_chunk: Option<&str>) -> Option<&'a Hit> {
    let role = find_scheme(topic).map(|s| s.role);

    let candidates: Vec<&Hit> = hits
        .iter()
        .filter(|h| Some(h.chunk_id.as_str()) != skip_chunk)
        .filter(|h| contains_phrase(&h.text, topic))
        .collect();

    if let Some(role) = role {
        if let Some(best) = candidates.iter().find(|h| contains_phrase(&h.text, role)) {
            return Some(best);
        }
    }
    candidates.first().copied()
}

/// Builds a minimal three-bullet comparison from the full hit list.
///
/// One hit per topic, fresh local keys `c1`/`c2`, and a combined
/// distinction bullet citing both. Returns the text with its citations,
/// or `None` when either topic has no supporting hit.
#[must_use]
pub fn compare_fallback(args: &CompareArgs, hits: &[Hit]) -> Option<(String, Vec<Citation>)> {
    let hit_a = pick_topic_hit(hits, &args.topic_a, None)?;
    let hit_b = pick_topic_hit(hits, &args.topic_b, Some(&hit_a.chunk_id))?;

    let describe = |topic: &str, hit: &Hit| -> String {
        find_scheme(topic).map_or_else(
            || format!("{topic} is specified in {}", hit.doc_id),
            |scheme| format!("{topic} is a {}", scheme.role),
        )
    };

    let mut text = String::new();
    text.push_str(&format!("- {} [c1]\n", describe(&args.topic_a, hit_a)));
    text.push_str(&format!("- {} [c2]\n", describe(&args.topic_b, hit_b)));
    text.push_str(&format!(
        "- {} and {} serve different purposes and are specified in {} and {} respectively [c1][c2]",
        args.topic_a, args.topic_b, hit_a.doc_id, hit_b.doc_id
    ));

    let citation = |key: &str, hit: &Hit| Citation {
        key: key.to_string(),
        doc_id: hit.doc_id.clone(),
        start_page: hit.start_page,
        end_page: hit.end_page,
        chunk_id: hit.chunk_id.clone(),
    };

    Some((text, vec![citation("c1", hit_a), citation("c2", hit_b)]))
}
