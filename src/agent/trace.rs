//! Per-run trace artifact.
//!
//! One JSON object per agent run: the question, final plan, truncated
//! evidence, answers, citations, counters, ordered trace events, and
//! errors. Evidence text is truncated so trace files stay reviewable.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::info;

use crate::agent::state::{AgentState, Plan, RefusalReason, StopReason, TraceEvent};
use crate::answer::Citation;
use crate::error::{CommandError, Result};

/// Evidence text cap in the trace file.
const EVIDENCE_TEXT_CAP: usize = 800;

/// Question slug cap in the trace filename.
const SLUG_CAP: usize = 40;

#[derive(Serialize)]
struct TraceEvidence<'a> {
    chunk_id: &'a str,
    doc_id: &'a str,
    start_page: u32,
    end_page: u32,
    score: f64,
    text: String,
}

#[derive(Serialize)]
struct TraceFile<'a> {
    question: &'a str,
    plan: &'a Plan,
    evidence: Vec<TraceEvidence<'a>>,
    draft_answer: Option<&'a str>,
    final_answer: Option<&'a str>,
    citations: &'a [Citation],
    tool_calls: usize,
    steps: usize,
    trace: &'a [TraceEvent],
    errors: &'a [String],
    stop_reason: Option<StopReason>,
    refusal_reason: Option<RefusalReason>,
}

/// Truncates text to the trace cap, marking elision with an ellipsis.
fn truncate_text(text: &str) -> String {
    if text.chars().count() <= EVIDENCE_TEXT_CAP {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(EVIDENCE_TEXT_CAP).collect();
        out.push('…');
        out
    }
}

/// Builds the filename slug from a question.
fn slugify(question: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in question.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= SLUG_CAP {
            break;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "question".to_string()
    } else {
        slug
    }
}

/// Writes the trace artifact for a finished run.
///
/// Returns the path of the written file
/// (`agent_<YYYYMMDD_HHMMSS>_<slug>.json`).
///
/// # Errors
///
/// Returns [`CommandError::OutputFailed`] when the directory or file
/// cannot be written.
pub fn write_trace(state: &AgentState, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).map_err(|e| CommandError::OutputFailed {
        path: out_dir.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("agent_{stamp}_{}.json", slugify(&state.question));
    let path = out_dir.join(filename);

    let file = TraceFile {
        question: &state.question,
        plan: &state.plan,
        evidence: state
            .evidence
            .iter()
            .map(|hit| TraceEvidence {
                chunk_id: &hit.chunk_id,
                doc_id: &hit.doc_id,
                start_page: hit.start_page,
                end_page: hit.end_page,
                score: hit.score,
                text: truncate_text(&hit.text),
            })
            .collect(),
        draft_answer: state.draft_answer.as_deref(),
        final_answer: state.final_answer.as_deref(),
        citations: &state.citations,
        tool_calls: state.tool_calls,
        steps: state.steps,
        trace: &state.trace,
        errors: &state.errors,
        stop_reason: state.stop_reason,
        refusal_reason: state.refusal_reason,
    };

    let body = serde_json::to_string_pretty(&file)?;
    fs::write(&path, body).map_err(|e| CommandError::OutputFailed {
        path: path.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    info!(path = %path.display(), "trace written");
    Ok(path)
}
