//! Answer layer: prompt assembly, citation enforcement, fallbacks.

mod builder;
mod citations;
mod fallback;
mod prompt;

pub use builder::{
    AnswerBuilder, NOTE_EMPTY_DRAFT, NOTE_GENERATOR_FAILED, NOTE_INSUFFICIENT,
    NOTE_MISSING_CITATIONS,
};
pub use citations::{
    enforce_inline_citations, parse_inline_citation_keys, AnswerResult, Citation, CitationCheck,
    REFUSAL_SENTINEL,
};
pub use fallback::{algorithm_fallback, compare_fallback};
pub use prompt::{
    assign_keys, build_prompt, citations_for, format_evidence, key_set, prettify, EvidenceItem,
    SYSTEM_CONTRACT,
};
