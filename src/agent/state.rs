//! Agent state for the bounded control loop.
//!
//! One [`AgentState`] lives for one question. The control loop is its sole
//! owner; nodes mutate it and the `trace` vector is append-only provenance.

use serde::{Deserialize, Serialize};

use crate::answer::Citation;
use crate::retrieval::Hit;

/// Planned action for the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// General retrieval.
    Retrieve,
    /// Definition lookup.
    ResolveDefinition,
    /// Two-topic comparison.
    Compare,
    /// Summarization over retrieved context.
    Summarize,
    /// Immediate refusal (budget already exhausted).
    Refuse,
}

/// Coarse question category guiding refinement bias tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeHint {
    /// No special handling.
    General,
    /// "what is" / "define" / "explain" questions.
    Definition,
    /// Numbered-algorithm or XOF questions.
    Algorithm,
    /// Symbol/notation questions.
    Symbolic,
    /// Two-topic comparison.
    Compare,
}

/// Topics of a compare question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareArgs {
    /// First topic.
    pub topic_a: String,
    /// Second topic.
    pub topic_b: String,
}

/// The routing decision for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Action to take.
    pub action: PlanAction,
    /// Query to retrieve with, when retrieving.
    pub query: Option<String>,
    /// Compare topics, when action is compare.
    pub args: Option<CompareArgs>,
    /// Question category.
    pub mode_hint: ModeHint,
}

impl Plan {
    /// A refusal plan, used when budgets are exhausted before routing.
    #[must_use]
    pub const fn refuse() -> Self {
        Self {
            action: PlanAction::Refuse,
            query: None,
            args: None,
            mode_hint: ModeHint::General,
        }
    }
}

/// Why the loop stopped iterating.
///
/// Loop provenance only; the output provenance is [`RefusalReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Evidence passed the sufficiency rules.
    SufficientEvidence,
    /// Fewer evidence hits than the minimum.
    InsufficientHits,
    /// The question carries an anchor token absent from all evidence.
    AnchorMissing,
    /// Compare question with fewer than two distinct documents.
    CompareDocDiversityMissing,
    /// Step budget exhausted.
    StepBudgetExhausted,
    /// Tool-call budget exhausted.
    ToolBudgetExhausted,
    /// Retrieval-round budget exhausted.
    RoundBudgetExhausted,
    /// Host-driven cancellation.
    Cancelled,
    /// The retrieval adapter failed.
    RetrievalFailed,
}

/// Why the final output is a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    /// Evidence never became sufficient.
    InsufficientEvidence,
    /// The generator produced no usable draft.
    EmptyDraft,
    /// The draft failed citation validation.
    MissingCitations,
    /// A loop budget ran out before an answer could be built.
    BudgetExhausted,
    /// The retrieval adapter failed.
    RetrievalFailed,
    /// The generator failed after retries.
    GeneratorFailed,
}

/// One provenance event appended by a loop node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Node that emitted the event.
    pub node: String,
    /// Human-readable detail.
    pub detail: String,
}

/// Mutable state for one question's control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// The input question.
    pub question: String,
    /// Current plan.
    pub plan: Plan,
    /// Query used by the next retrieval round (refinement rewrites it).
    pub current_query: String,
    /// Accumulated evidence, ordered and deduped by `chunk_id`.
    pub evidence: Vec<Hit>,
    /// Draft answer from the answer node.
    pub draft_answer: Option<String>,
    /// Final answer (validated answer or the refusal sentinel).
    pub final_answer: Option<String>,
    /// Citations backing the final answer.
    pub citations: Vec<Citation>,
    /// Node entries so far.
    pub steps: usize,
    /// Retrieval tool calls so far.
    pub tool_calls: usize,
    /// Retrieval rounds so far.
    pub retrieval_round: usize,
    /// Whether the sufficiency rules passed.
    pub evidence_sufficient: bool,
    /// Why the loop stopped.
    pub stop_reason: Option<StopReason>,
    /// Why the output is a refusal, if it is one.
    pub refusal_reason: Option<RefusalReason>,
    /// Append-only provenance events.
    pub trace: Vec<TraceEvent>,
    /// Errors recorded by nodes (retrieval/generator failures).
    pub errors: Vec<String>,
}

impl AgentState {
    /// Creates the initial state for a question.
    #[must_use]
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            plan: Plan::refuse(),
            current_query: question.to_string(),
            evidence: Vec::new(),
            draft_answer: None,
            final_answer: None,
            citations: Vec::new(),
            steps: 0,
            tool_calls: 0,
            retrieval_round: 0,
            evidence_sufficient: false,
            stop_reason: None,
            refusal_reason: None,
            trace: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Appends a provenance event.
    pub fn record(&mut self, node: &str, detail: impl Into<String>) {
        self.trace.push(TraceEvent {
            node: node.to_string(),
            detail: detail.into(),
        });
    }
}
