//! Prompt assembly for the answer layer.
//!
//! Evidence items get citation keys `c1..cN` in context order; the system
//! contract pins the generator to the provided context and the refusal
//! sentinel.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;

use crate::answer::citations::Citation;
use crate::retrieval::Hit;

/// System contract enumerating the answer rules.
pub const SYSTEM_CONTRACT: &str = "\
You answer questions about standards documents from provided context only.

Rules:
1. Answer ONLY from the evidence blocks below. Never use outside knowledge.
2. Every sentence must end with at least one citation marker [cN]; multiple \
markers are allowed as [c1][c2] or [c1, c2].
3. If the context does not support an answer, reply with exactly: \
not found in provided docs
4. Do not state numeric, algorithmic, or symbolic specifics that are not \
present in the context.
5. Prefer short bulleted claims.
6. Use only citation keys defined in the evidence blocks.";

/// One evidence item: a hit with its assigned citation key.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
    /// Citation key (`c1`, `c2`, ...).
    pub key: String,
    /// The underlying hit.
    pub hit: Hit,
}

/// Assigns citation keys `c1..cN` in the order items appear in context.
#[must_use]
pub fn assign_keys(items: &[Hit]) -> Vec<EvidenceItem> {
    items
        .iter()
        .enumerate()
        .map(|(i, hit)| EvidenceItem {
            key: format!("c{}", i + 1),
            hit: hit.clone(),
        })
        .collect()
}

/// The key set of an evidence list, for validation.
#[must_use]
pub fn key_set(items: &[EvidenceItem]) -> BTreeSet<String> {
    items.iter().map(|item| item.key.clone()).collect()
}

/// Citations corresponding to the given keys, in key order.
#[must_use]
pub fn citations_for(items: &[EvidenceItem], used_keys: &[String]) -> Vec<Citation> {
    used_keys
        .iter()
        .filter_map(|key| {
            items.iter().find(|item| &item.key == key).map(|item| Citation {
                key: item.key.clone(),
                doc_id: item.hit.doc_id.clone(),
                start_page: item.hit.start_page,
                end_page: item.hit.end_page,
                chunk_id: item.hit.chunk_id.clone(),
            })
        })
        .collect()
}

#[allow(clippy::unwrap_used)]
fn step_marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]+(\d+:)").unwrap())
}

#[allow(clippy::unwrap_used)]
fn for_loop_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]+(for \()").unwrap())
}

/// Normalizes pseudocode layout: line breaks are injected before
/// numbered-step markers (`1:`, `2:`, ...) and `for (` tokens that PDF
/// extraction flattened onto one line.
#[must_use]
pub fn prettify(text: &str) -> String {
    let stepped = step_marker_pattern().replace_all(text, "\n$1");
    for_loop_pattern().replace_all(&stepped, "\n$1").into_owned()
}

/// Renders the numbered evidence blocks.
///
/// Each block is a header line `[cN] | doc_id | pX-pY | chunk_id`
/// followed by the prettified chunk text.
#[must_use]
pub fn format_evidence(items: &[EvidenceItem]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(
            out,
            "[{}] | {} | {} | {}",
            item.key,
            item.hit.doc_id,
            item.hit.page_span(),
            item.hit.chunk_id
        );
        out.push_str(&prettify(&item.hit.text));
        out.push_str("\n\n");
    }
    out
}

/// Builds the full generation prompt.
#[must_use]
pub fn build_prompt(question: &str, items: &[EvidenceItem]) -> String {
    format!(
        "{SYSTEM_CONTRACT}\n\n# Evidence\n\n{}# Question\n\n{question}\n\n# Answer\n",
        format_evidence(items)
    )
}
