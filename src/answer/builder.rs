//! Answer construction.
//!
//! Assembles the prompt, invokes the generator, validates citations, and
//! applies the deterministic fallbacks. This layer never returns an error
//! for evidence- or output-quality problems: every path terminates in a
//! validated answer or the refusal sentinel.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::agent::compare_topics;
use crate::answer::citations::{enforce_inline_citations, AnswerResult, CitationCheck};
use crate::answer::fallback::{algorithm_fallback, compare_fallback};
use crate::answer::prompt::{assign_keys, build_prompt, citations_for, key_set};
use crate::config::AnswerConfig;
use crate::llm::Generator;
use crate::retrieval::Hit;

/// Machine-readable refusal cause: evidence never reached the minimum.
pub const NOTE_INSUFFICIENT: &str = "insufficient_evidence";
/// Machine-readable refusal cause: the generator failed after retries.
pub const NOTE_GENERATOR_FAILED: &str = "generator_failed";
/// Machine-readable refusal cause: the generator draft was empty.
pub const NOTE_EMPTY_DRAFT: &str = "empty_draft";
/// Machine-readable refusal cause: the draft failed citation validation.
pub const NOTE_MISSING_CITATIONS: &str = "missing_citations";

/// Builds cited answers from selected evidence.
pub struct AnswerBuilder {
    config: AnswerConfig,
}

impl AnswerBuilder {
    /// Creates a builder.
    #[must_use]
    pub const fn new(config: AnswerConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Builds an answer for `question` from the ordered `evidence`.
    ///
    /// `all_hits` is the full deduped hit list (pre-selection); the compare
    /// fallback draws from it. `sufficient` is the evidence selector's
    /// verdict. The result is always a validated answer or a refusal.
    #[must_use]
    pub fn build(
        &self,
        generator: &dyn Generator,
        question: &str,
        evidence: &[Hit],
        all_hits: &[Hit],
        sufficient: bool,
    ) -> AnswerResult {
        if evidence.is_empty() || !sufficient {
            debug!(evidence = evidence.len(), "refusing before generation");
            return AnswerResult::refusal(Some(NOTE_INSUFFICIENT));
        }

        let items = assign_keys(evidence);
        let prompt = build_prompt(question, &items);
        let keys = key_set(&items);

        let draft = match generator.generate(&prompt) {
            Ok(draft) => draft,
            Err(e) => {
                info!(error = %e, "generator failed; refusing");
                return AnswerResult::refusal(Some(NOTE_GENERATOR_FAILED));
            }
        };
        if draft.trim().is_empty() {
            return AnswerResult::refusal(Some(NOTE_EMPTY_DRAFT));
        }

        match enforce_inline_citations(&draft, &keys) {
            CitationCheck::Valid { used_keys } => {
                let citations = citations_for(&items, &used_keys);
                if self.config.require_citations && citations.is_empty() {
                    return AnswerResult::refusal(Some(NOTE_MISSING_CITATIONS));
                }
                AnswerResult {
                    answer: draft.trim().to_string(),
                    citations,
                    notes: None,
                }
            }
            CitationCheck::Refusal => self.apply_fallbacks(question, &items, all_hits, &keys),
            CitationCheck::Invalid { reason } => {
                debug!(reason = %reason, "draft failed citation validation");
                AnswerResult::refusal(Some(NOTE_MISSING_CITATIONS))
            }
        }
    }

    /// Tries the deterministic fallbacks after a generator refusal.
    fn apply_fallbacks(
        &self,
        question: &str,
        items: &[crate::answer::prompt::EvidenceItem],
        all_hits: &[Hit],
        keys: &BTreeSet<String>,
    ) -> AnswerResult {
        if let Some(text) = algorithm_fallback(question, items) {
            if let CitationCheck::Valid { used_keys } = enforce_inline_citations(&text, keys) {
                info!("algorithm fallback produced a cited answer");
                return AnswerResult {
                    citations: citations_for(items, &used_keys),
                    answer: text,
                    notes: None,
                };
            }
        }

        if let Some(args) = compare_topics(question) {
            if let Some((text, citations)) = compare_fallback(&args, all_hits) {
                let local_keys: BTreeSet<String> =
                    citations.iter().map(|c| c.key.clone()).collect();
                if matches!(
                    enforce_inline_citations(&text, &local_keys),
                    CitationCheck::Valid { .. }
                ) {
                    info!("compare fallback produced a cited answer");
                    return AnswerResult {
                        answer: text,
                        citations,
                        notes: None,
                    };
                }
            }
        }

        AnswerResult::refusal(None)
    }
}
