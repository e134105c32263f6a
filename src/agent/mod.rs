//! Bounded agent loop: routing, sufficiency assessment, refinement,
//! verification, and run traces.

mod graph;
mod route;
mod state;
mod trace;

pub use graph::AgentLoop;
pub use route::{compare_topics, extract_anchor_tokens, route};
pub use state::{
    AgentState, CompareArgs, ModeHint, Plan, PlanAction, RefusalReason, StopReason, TraceEvent,
};
pub use trace::write_trace;
