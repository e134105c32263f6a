//! The bounded control loop.
//!
//! A plain state machine: nodes are functions over [`AgentState`], the
//! driver is a while-loop over a transition table, and a recursion cap
//! backstops the step budget. No node ever fails for evidence- or
//! output-quality reasons; every run terminates in a validated answer or
//! the refusal sentinel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::route::{extract_anchor_tokens, route};
use crate::agent::state::{
    AgentState, ModeHint, Plan, PlanAction, RefusalReason, StopReason,
};
use crate::answer::{AnswerBuilder, NOTE_GENERATOR_FAILED, NOTE_INSUFFICIENT, REFUSAL_SENTINEL};
use crate::config::AgentBudgets;
use crate::llm::Generator;
use crate::retrieval::{rank_order, select_evidence, Hit, Retriever};
use crate::schemes::find_scheme;

/// Control-loop nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Route,
    Retrieve,
    Assess,
    Refine,
    Answer,
    VerifyOrRefuse,
    End,
}

/// The bounded controller: route → retrieve → assess → refine → answer →
/// verify/refuse, under step, tool-call, and round budgets.
pub struct AgentLoop<'a> {
    retriever: &'a Retriever,
    builder: &'a AnswerBuilder,
    generator: &'a dyn Generator,
    budgets: AgentBudgets,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> AgentLoop<'a> {
    /// Creates a loop over the shared read-only components.
    #[must_use]
    pub fn new(
        retriever: &'a Retriever,
        builder: &'a AnswerBuilder,
        generator: &'a dyn Generator,
        budgets: AgentBudgets,
    ) -> Self {
        Self {
            retriever,
            builder,
            generator,
            budgets,
            cancel: None,
        }
    }

    /// Installs a host-settable cancellation flag, checked at every node
    /// entry. When raised the loop transitions straight to verify with
    /// `stop_reason = cancelled` and emits no partial answer.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Runs one question to completion.
    #[must_use]
    pub fn run(&self, question: &str) -> AgentState {
        let mut state = AgentState::new(question);
        let mut node = Node::Route;
        let cap = self.budgets.recursion_cap();
        let mut transitions = 0usize;

        while node != Node::End {
            transitions += 1;
            if transitions > cap {
                // Backstop; the step budget makes this unreachable in
                // practice.
                state.record("driver", "recursion cap reached");
                if node == Node::VerifyOrRefuse {
                    break;
                }
                node = Node::VerifyOrRefuse;
                continue;
            }

            if self.cancelled() && node != Node::VerifyOrRefuse && node != Node::End {
                state.stop_reason = Some(StopReason::Cancelled);
                state.record("driver", "cancelled by host");
                node = Node::VerifyOrRefuse;
                continue;
            }

            node = match node {
                Node::Route => self.node_route(&mut state),
                Node::Retrieve => self.node_retrieve(&mut state),
                Node::Assess => self.node_assess(&mut state),
                Node::Refine => self.node_refine(&mut state),
                Node::Answer => self.node_answer(&mut state),
                Node::VerifyOrRefuse => Self::node_verify(&mut state),
                Node::End => Node::End,
            };
        }

        info!(
            steps = state.steps,
            tool_calls = state.tool_calls,
            stop_reason = ?state.stop_reason,
            refusal = state.refusal_reason.is_some(),
            "agent loop finished"
        );
        state
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn node_route(&self, state: &mut AgentState) -> Node {
        state.steps += 1;
        state.plan = route(&state.question);
        if let Some(query) = &state.plan.query {
            state.current_query.clone_from(query);
        }
        state.record(
            "route",
            format!("action={:?} hint={:?}", state.plan.action, state.plan.mode_hint),
        );

        if state.steps >= self.budgets.max_steps {
            state.plan = Plan::refuse();
            state.stop_reason = Some(StopReason::StepBudgetExhausted);
            state.record("route", "step budget exhausted before retrieval");
            return Node::VerifyOrRefuse;
        }
        Node::Retrieve
    }

    fn node_retrieve(&self, state: &mut AgentState) -> Node {
        state.steps += 1;

        // Budgets are checked before the tool call; on exhaustion the node
        // writes the reason and hands over to assessment.
        if state.tool_calls >= self.budgets.max_tool_calls {
            state.stop_reason = Some(StopReason::ToolBudgetExhausted);
            state.record("retrieve", "tool budget exhausted");
            return Node::Assess;
        }
        if state.retrieval_round >= self.budgets.max_retrieval_rounds {
            state.stop_reason = Some(StopReason::RoundBudgetExhausted);
            state.record("retrieve", "round budget exhausted");
            return Node::Assess;
        }

        state.tool_calls += 1;
        state.retrieval_round += 1;
        match self.retriever.retrieve(&state.current_query) {
            Ok(hits) => {
                let merged = merge_evidence(&state.evidence, hits);
                state.record(
                    "retrieve",
                    format!(
                        "round={} query={:?} evidence={}",
                        state.retrieval_round, state.current_query, merged.len()
                    ),
                );
                state.evidence = merged;
                Node::Assess
            }
            Err(e) => {
                state.errors.push(e.to_string());
                state.stop_reason = Some(StopReason::RetrievalFailed);
                state.refusal_reason = Some(RefusalReason::RetrievalFailed);
                state.record("retrieve", format!("retrieval failed: {e}"));
                Node::VerifyOrRefuse
            }
        }
    }

    fn node_assess(&self, state: &mut AgentState) -> Node {
        state.steps += 1;

        let failure = self.sufficiency_failure(state);
        match failure {
            None => {
                state.evidence_sufficient = true;
                state.stop_reason = Some(StopReason::SufficientEvidence);
                state.record("assess", "sufficient evidence");
                Node::Answer
            }
            Some(reason) => {
                state.evidence_sufficient = false;
                state.stop_reason = Some(reason);
                state.record("assess", format!("insufficient: {reason:?}"));

                if let Some(budget_reason) = self.exhausted_budget(state) {
                    state.stop_reason = Some(budget_reason);
                    state.record("assess", format!("budget exhausted: {budget_reason:?}"));
                    Node::VerifyOrRefuse
                } else {
                    Node::Refine
                }
            }
        }
    }

    /// First applicable sufficiency failure, in fixed order.
    fn sufficiency_failure(&self, state: &AgentState) -> Option<StopReason> {
        if state.evidence.len() < self.budgets.min_evidence_hits {
            return Some(StopReason::InsufficientHits);
        }

        let anchors = extract_anchor_tokens(&state.question);
        if !anchors.is_empty() {
            let covered = state.evidence.iter().any(|hit| {
                let text = hit.text.to_lowercase();
                anchors.iter().any(|anchor| text.contains(anchor))
            });
            if !covered {
                return Some(StopReason::AnchorMissing);
            }
        }

        if state.plan.action == PlanAction::Compare {
            let distinct_docs: std::collections::BTreeSet<&str> =
                state.evidence.iter().map(|h| h.doc_id.as_str()).collect();
            if distinct_docs.len() < 2 {
                return Some(StopReason::CompareDocDiversityMissing);
            }
        }

        None
    }

    /// Budget-exhaustion reason, priority step → tool → round.
    fn exhausted_budget(&self, state: &AgentState) -> Option<StopReason> {
        if state.steps >= self.budgets.max_steps {
            Some(StopReason::StepBudgetExhausted)
        } else if state.tool_calls >= self.budgets.max_tool_calls {
            Some(StopReason::ToolBudgetExhausted)
        } else if state.retrieval_round >= self.budgets.max_retrieval_rounds {
            Some(StopReason::RoundBudgetExhausted)
        } else {
            None
        }
    }

    fn node_refine(&self, state: &mut AgentState) -> Node {
        state.steps += 1;

        let refined = refine_query(state);
        state.record(
            "refine",
            format!("stop_reason={:?} query={refined:?}", state.stop_reason),
        );
        state.current_query = refined;

        if state.steps >= self.budgets.max_steps {
            state.stop_reason = Some(StopReason::StepBudgetExhausted);
            state.record("refine", "step budget exhausted after refinement");
            return Node::VerifyOrRefuse;
        }
        Node::Retrieve
    }

    fn node_answer(&self, state: &mut AgentState) -> Node {
        state.steps += 1;

        let selection = select_evidence(
            &state.evidence,
            self.retriever.store(),
            self.builder.config(),
        );
        let result = self.builder.build(
            self.generator,
            &state.question,
            &selection.items,
            &state.evidence,
            selection.sufficient,
        );
        state.record(
            "answer",
            format!(
                "refusal={} citations={}",
                result.is_refusal(),
                result.citations.len()
            ),
        );

        match result.notes.as_deref() {
            Some(NOTE_GENERATOR_FAILED) => {
                state.errors.push("generator failed after retries".to_string());
                state.refusal_reason = Some(RefusalReason::GeneratorFailed);
            }
            // The selector's own minimum can be stricter than the loop's;
            // its verdict must not be mistaken for a citation failure.
            Some(NOTE_INSUFFICIENT) => {
                state.refusal_reason = Some(RefusalReason::InsufficientEvidence);
            }
            _ => {}
        }
        state.draft_answer = Some(result.answer);
        state.citations = result.citations;
        Node::VerifyOrRefuse
    }

    fn node_verify(state: &mut AgentState) -> Node {
        let draft = state.draft_answer.clone().unwrap_or_default();
        let draft_is_refusal = draft.trim().is_empty() || draft.trim() == REFUSAL_SENTINEL;

        let must_refuse = !state.evidence_sufficient
            || draft_is_refusal
            || state.evidence.is_empty()
            || state.citations.is_empty();

        if must_refuse {
            // Output provenance; `stop_reason` keeps the loop provenance
            // untouched.
            if state.refusal_reason.is_none() {
                state.refusal_reason = Some(Self::refusal_reason_for(state, &draft));
            }
            state.citations.clear();
            state.final_answer = Some(REFUSAL_SENTINEL.to_string());
            state.record("verify", format!("refused: {:?}", state.refusal_reason));
        } else {
            state.final_answer = Some(draft);
            state.record("verify", "answer verified");
        }
        debug!(refusal = must_refuse, "verify complete");
        Node::End
    }

    /// Maps the fired predicate to a refusal reason, in priority order.
    fn refusal_reason_for(state: &AgentState, draft: &str) -> RefusalReason {
        if state.stop_reason == Some(StopReason::StepBudgetExhausted) && state.evidence.is_empty()
        {
            // The step budget cut the loop before anything was retrieved.
            return RefusalReason::BudgetExhausted;
        }
        if !state.evidence_sufficient || state.evidence.is_empty() {
            return RefusalReason::InsufficientEvidence;
        }
        if draft.trim().is_empty() {
            return RefusalReason::EmptyDraft;
        }
        RefusalReason::MissingCitations
    }
}

/// Merges new hits into existing evidence: dedup by `chunk_id` with
/// first-seen wins, then a stable re-sort.
fn merge_evidence(existing: &[Hit], new_hits: Vec<Hit>) -> Vec<Hit> {
    let mut merged: Vec<Hit> = existing.to_vec();
    let mut seen: std::collections::HashSet<String> =
        existing.iter().map(|h| h.chunk_id.clone()).collect();
    for hit in new_hits {
        if seen.insert(hit.chunk_id.clone()) {
            merged.push(hit);
        }
    }
    merged.sort_by(rank_order);
    merged
}

/// Appends a bias token unless the query already carries it.
fn append_once(query: &mut String, token: &str) {
    if !query.to_lowercase().contains(&token.to_lowercase()) {
        query.push(' ');
        query.push_str(token);
    }
}

/// Deterministic query refinement keyed by the assessment's stop reason.
fn refine_query(state: &AgentState) -> String {
    let mut query = state.current_query.clone();

    match state.stop_reason {
        Some(StopReason::AnchorMissing) => {
            // Anchors originate in the question, so they are appended
            // unconditionally to re-weight the retrieval toward them.
            for anchor in extract_anchor_tokens(&state.question) {
                query.push(' ');
                query.push_str(&anchor);
            }
        }
        Some(StopReason::CompareDocDiversityMissing) => {
            if let Some(args) = &state.plan.args {
                for topic in [&args.topic_a, &args.topic_b] {
                    if let Some(scheme) = find_scheme(topic) {
                        append_once(&mut query, scheme.standard);
                    }
                }
            }
            append_once(&mut query, "compare");
        }
        _ => {
            // insufficient_hits: coverage bias chosen by mode hint.
            match state.plan.mode_hint {
                ModeHint::Definition => append_once(&mut query, "definition"),
                ModeHint::Algorithm => append_once(&mut query, "algorithm steps"),
                _ => append_once(&mut query, "overview"),
            }
        }
    }
    query
}
