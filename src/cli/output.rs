//! Output formatting for CLI commands.
//!
//! Text rendering for humans, serde payloads for `--json` consumers.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::{AgentState, RefusalReason, StopReason};
use crate::answer::{format_evidence, AnswerResult, Citation, EvidenceItem};
use crate::eval::Summary;
use crate::retrieval::Hit;

/// Preview length for hit text in search output.
const PREVIEW_CHARS: usize = 100;

fn preview(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
        .collect();
    let mut out: String = flat.chars().take(PREVIEW_CHARS).collect();
    if flat.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

/// Formats ranked hits for the `search` command.
#[must_use]
pub fn format_hits(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(
            out,
            "{:>8.4}  {}  {}  ({})",
            hit.score,
            hit.doc_id,
            hit.page_span(),
            hit.chunk_id
        );
        let _ = writeln!(out, "          {}", preview(&hit.text));
    }
    out
}

/// Structured payload for `ask --json` and `--save-json`.
#[derive(Debug, Serialize)]
pub struct AskPayload<'a> {
    /// The question asked.
    pub question: &'a str,
    /// Answer text or the refusal sentinel.
    pub answer: &'a str,
    /// Whether the answer is a refusal.
    pub refusal: bool,
    /// Citations backing the answer.
    pub citations: &'a [Citation],
    /// Refusal cause, when machine-readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
    /// Rendered evidence blocks, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl<'a> AskPayload<'a> {
    /// Builds the payload from an answer result.
    #[must_use]
    pub fn new(question: &'a str, result: &'a AnswerResult, evidence: Option<String>) -> Self {
        Self {
            question,
            answer: &result.answer,
            refusal: result.is_refusal(),
            citations: &result.citations,
            notes: result.notes.as_deref(),
            evidence,
        }
    }
}

fn format_citations(out: &mut String, citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    out.push_str("\nCitations:\n");
    for citation in citations {
        let _ = writeln!(
            out,
            "  [{}] {} p{}-p{} ({})",
            citation.key,
            citation.doc_id,
            citation.start_page,
            citation.end_page,
            citation.chunk_id
        );
    }
}

/// Formats an answer for the `ask` command.
#[must_use]
pub fn format_answer(result: &AnswerResult, evidence: Option<&[EvidenceItem]>) -> String {
    let mut out = String::new();
    if let Some(items) = evidence {
        out.push_str("Evidence:\n");
        out.push_str(&format_evidence(items));
    }
    out.push_str(&result.answer);
    out.push('\n');
    format_citations(&mut out, &result.citations);
    out
}

/// Structured payload for `agent-ask --json`.
#[derive(Debug, Serialize)]
pub struct AgentPayload<'a> {
    /// The question asked.
    pub question: &'a str,
    /// Final answer text or the refusal sentinel.
    pub answer: &'a str,
    /// Whether the answer is a refusal.
    pub refusal: bool,
    /// Citations backing the answer.
    pub citations: &'a [Citation],
    /// Why the loop stopped.
    pub stop_reason: Option<StopReason>,
    /// Why the output is a refusal, if it is one.
    pub refusal_reason: Option<RefusalReason>,
    /// Node entries consumed.
    pub steps: usize,
    /// Retrieval tool calls consumed.
    pub tool_calls: usize,
    /// Retrieval rounds consumed.
    pub retrieval_round: usize,
    /// Where the run trace was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<String>,
}

impl<'a> AgentPayload<'a> {
    /// Builds the payload from a finished agent state.
    #[must_use]
    pub fn new(state: &'a AgentState, trace_path: Option<String>) -> Self {
        let answer = state.final_answer.as_deref().unwrap_or_default();
        Self {
            question: &state.question,
            answer,
            refusal: state.refusal_reason.is_some(),
            citations: &state.citations,
            stop_reason: state.stop_reason,
            refusal_reason: state.refusal_reason,
            steps: state.steps,
            tool_calls: state.tool_calls,
            retrieval_round: state.retrieval_round,
            trace_path,
        }
    }
}

/// Formats a finished agent run for humans.
#[must_use]
pub fn format_agent_result(state: &AgentState, trace_path: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(state.final_answer.as_deref().unwrap_or_default());
    out.push('\n');
    format_citations(&mut out, &state.citations);

    let _ = writeln!(
        out,
        "\nsteps={} tool_calls={} rounds={}",
        state.steps, state.tool_calls, state.retrieval_round
    );
    if let Some(reason) = state.stop_reason {
        let _ = writeln!(out, "stop_reason={reason:?}");
    }
    if let Some(reason) = state.refusal_reason {
        let _ = writeln!(out, "refusal_reason={reason:?}");
    }
    if let Some(path) = trace_path {
        let _ = writeln!(out, "trace={path}");
    }
    out
}

/// Formats the evaluation summary for humans.
#[must_use]
pub fn format_eval_summary(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} questions, {} scored, {} skipped",
        summary.questions,
        summary.scored,
        summary.skipped.len()
    );
    for row in &summary.means {
        let _ = writeln!(
            out,
            "k={:<3} recall={:.4} mrr={:.4} ndcg={:.4} doc_only={:.4} near_page={:.4}",
            row.k, row.recall, row.mrr, row.ndcg, row.recall_doc_only, row.recall_near_page
        );
    }
    out
}
