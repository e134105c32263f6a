//! Evaluation runner and deterministic report writers.
//!
//! Produces `per_question.jsonl` (sorted by the numeric-aware qid key),
//! `summary.json` (stable key order), and `summary.md`. Two runs over
//! fixed inputs produce byte-identical JSON outputs.

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::answer::AnswerBuilder;
use crate::error::{CommandError, Result};
use crate::eval::dataset::DatasetRow;
use crate::eval::metrics::{mrr_at_k, ndcg_at_k, recall_at_k, Relevance};
use crate::llm::Generator;
use crate::retrieval::{select_evidence, Retriever};

/// Evaluation options.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Metric cutoffs.
    pub ks: Vec<usize>,
    /// Tolerance for the `near_page` diagnostic.
    pub near_page_tolerance: u32,
    /// Whether to also produce answers per question.
    pub with_answers: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            ks: vec![5, 10],
            near_page_tolerance: 1,
            with_answers: false,
        }
    }
}

/// Metric values at one cutoff.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    /// Cutoff.
    pub k: usize,
    /// Strict Recall@k.
    pub recall: f64,
    /// Strict MRR@k.
    pub mrr: f64,
    /// Strict nDCG@k.
    pub ndcg: f64,
    /// Doc-only Recall@k diagnostic.
    pub recall_doc_only: f64,
    /// Near-page Recall@k diagnostic.
    pub recall_near_page: f64,
}

/// Per-question evaluation record.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionReport {
    /// Question id.
    pub qid: String,
    /// Question text.
    pub question: String,
    /// Whether the row is labeled answerable.
    pub answerable: bool,
    /// Whether the row was excluded from scoring.
    pub skipped: bool,
    /// Why the row was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Number of retrieved hits.
    pub hits: usize,
    /// Metrics per cutoff (empty when skipped).
    pub metrics: Vec<MetricRow>,
    /// Answer text when `--with-answers` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Whether the produced answer was a refusal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_refused: Option<bool>,
}

/// Aggregate report.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Total dataset rows.
    pub questions: usize,
    /// Rows included in scoring.
    pub scored: usize,
    /// Skipped qids, in qid order.
    pub skipped: Vec<String>,
    /// Metric cutoffs.
    pub ks: Vec<usize>,
    /// Near-page tolerance used by the diagnostic.
    pub near_page_tolerance: u32,
    /// Mean metrics per cutoff over scored rows.
    pub means: Vec<MetricRow>,
}

/// Full evaluation output.
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Per-question records in qid order.
    pub per_question: Vec<QuestionReport>,
    /// Aggregate summary.
    pub summary: Summary,
}

/// Runs the evaluation over already-validated rows.
///
/// Scoring covers rows with `answerable = true` and non-empty gold; other
/// rows appear in the skipped list. When `answering` is provided the
/// answer layer runs per scored question.
///
/// # Errors
///
/// Propagates retrieval failures; there are no partial runs.
pub fn run_eval(
    retriever: &Retriever,
    rows: &[DatasetRow],
    options: &EvalOptions,
    answering: Option<(&AnswerBuilder, &dyn Generator)>,
) -> Result<EvalReport> {
    let mut ks = options.ks.clone();
    ks.sort_unstable();
    ks.dedup();

    let mut per_question = Vec::with_capacity(rows.len());
    let mut skipped_qids = Vec::new();
    let mut scored = 0usize;

    for row in rows {
        let hits = retriever.retrieve(&row.question)?;

        let skip_reason = if !row.answerable {
            Some("not answerable".to_string())
        } else if row.gold.is_empty() {
            Some("answerable without gold labels".to_string())
        } else {
            None
        };

        let mut report = QuestionReport {
            qid: row.qid.clone(),
            question: row.question.clone(),
            answerable: row.answerable,
            skipped: skip_reason.is_some(),
            skip_reason,
            hits: hits.len(),
            metrics: Vec::new(),
            answer: None,
            answer_refused: None,
        };

        if report.skipped {
            skipped_qids.push(row.qid.clone());
        } else {
            scored += 1;
            for &k in &ks {
                report.metrics.push(MetricRow {
                    k,
                    recall: recall_at_k(&hits, &row.gold, k, Relevance::Strict),
                    mrr: mrr_at_k(&hits, &row.gold, k, Relevance::Strict),
                    ndcg: ndcg_at_k(&hits, &row.gold, k, Relevance::Strict),
                    recall_doc_only: recall_at_k(&hits, &row.gold, k, Relevance::DocOnly),
                    recall_near_page: recall_at_k(
                        &hits,
                        &row.gold,
                        k,
                        Relevance::NearPage(options.near_page_tolerance),
                    ),
                });
            }
        }

        if let Some((builder, generator)) = answering {
            if !report.skipped {
                let selection =
                    select_evidence(&hits, retriever.store(), builder.config());
                let result = builder.build(
                    generator,
                    &row.question,
                    &selection.items,
                    &hits,
                    selection.sufficient,
                );
                report.answer_refused = Some(result.is_refusal());
                report.answer = Some(result.answer);
            }
        }

        per_question.push(report);
    }

    let means = compute_means(&per_question, &ks);
    let summary = Summary {
        questions: rows.len(),
        scored,
        skipped: skipped_qids,
        ks,
        near_page_tolerance: options.near_page_tolerance,
        means,
    };
    info!(
        questions = summary.questions,
        scored = summary.scored,
        "evaluation complete"
    );
    Ok(EvalReport {
        per_question,
        summary,
    })
}

fn compute_means(per_question: &[QuestionReport], ks: &[usize]) -> Vec<MetricRow> {
    let scored: Vec<&QuestionReport> = per_question.iter().filter(|q| !q.skipped).collect();
    ks.iter()
        .map(|&k| {
            let rows: Vec<&MetricRow> = scored
                .iter()
                .filter_map(|q| q.metrics.iter().find(|m| m.k == k))
                .collect();
            let n = rows.len().max(1) as f64;
            let sum = |f: fn(&MetricRow) -> f64| rows.iter().map(|m| f(m)).sum::<f64>() / n;
            MetricRow {
                k,
                recall: sum(|m| m.recall),
                mrr: sum(|m| m.mrr),
                ndcg: sum(|m| m.ndcg),
                recall_doc_only: sum(|m| m.recall_doc_only),
                recall_near_page: sum(|m| m.recall_near_page),
            }
        })
        .collect()
}

fn write_file(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body).map_err(|e| {
        CommandError::OutputFailed {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Writes `per_question.jsonl`, `summary.json`, and `summary.md`.
///
/// Returns the three paths in that order.
///
/// # Errors
///
/// Returns [`CommandError::OutputFailed`] on any write failure.
pub fn write_reports(report: &EvalReport, out_dir: &Path) -> Result<(PathBuf, PathBuf, PathBuf)> {
    fs::create_dir_all(out_dir).map_err(|e| CommandError::OutputFailed {
        path: out_dir.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;

    let jsonl_path = out_dir.join("per_question.jsonl");
    let mut jsonl = String::new();
    for question in &report.per_question {
        jsonl.push_str(&serde_json::to_string(question)?);
        jsonl.push('\n');
    }
    write_file(&jsonl_path, &jsonl)?;

    let json_path = out_dir.join("summary.json");
    let mut json = serde_json::to_string_pretty(&report.summary)?;
    json.push('\n');
    write_file(&json_path, &json)?;

    let md_path = out_dir.join("summary.md");
    write_file(&md_path, &render_markdown(&report.summary))?;

    info!(out_dir = %out_dir.display(), "reports written");
    Ok((jsonl_path, json_path, md_path))
}

fn render_markdown(summary: &Summary) -> String {
    let mut md = String::new();
    md.push_str("# Evaluation summary\n\n");
    let _ = writeln!(
        md,
        "{} questions, {} scored, {} skipped.\n",
        summary.questions,
        summary.scored,
        summary.skipped.len()
    );
    md.push_str("| k | Recall | MRR | nDCG | doc-only | near-page |\n");
    md.push_str("|---|--------|-----|------|----------|-----------|\n");
    for row in &summary.means {
        let _ = writeln!(
            md,
            "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} |",
            row.k, row.recall, row.mrr, row.ndcg, row.recall_doc_only, row.recall_near_page
        );
    }
    if !summary.skipped.is_empty() {
        let _ = writeln!(md, "\nSkipped: {}", summary.skipped.join(", "));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::corpus::{compose_chunk_id, ChunkRecord, ChunkStore};
    use crate::eval::dataset::GoldSpan;
    use crate::index::Bm25Index;
    use std::sync::Arc;

    fn record(vector_id: u32, doc_id: &str, page: u32, text: &str) -> ChunkRecord {
        ChunkRecord {
            vector_id,
            chunk_id: compose_chunk_id(doc_id, page, 0),
            doc_id: doc_id.to_string(),
            start_page: page,
            end_page: page,
            text: text.to_string(),
        }
    }

    fn retriever() -> Retriever {
        let store = Arc::new(
            ChunkStore::from_records(vec![
                record(0, "FIPS.203", 1, "ML-KEM is a key-encapsulation mechanism"),
                record(1, "FIPS.204", 1, "ML-DSA is a digital signature scheme"),
            ])
            .unwrap(),
        );
        let bm25 = Arc::new(Bm25Index::build(&store));
        Retriever::new(store, bm25, RetrievalConfig::default())
    }

    fn rows() -> Vec<DatasetRow> {
        vec![
            DatasetRow {
                qid: "q1".to_string(),
                question: "What is ML-KEM?".to_string(),
                answerable: true,
                gold: vec![GoldSpan {
                    doc_id: "FIPS.203".to_string(),
                    start_page: 1,
                    end_page: 1,
                }],
            },
            DatasetRow {
                qid: "q2".to_string(),
                question: "What about wifi 9?".to_string(),
                answerable: false,
                gold: Vec::new(),
            },
        ]
    }

    #[test]
    fn test_scoring_scope() {
        let r = retriever();
        let report = run_eval(&r, &rows(), &EvalOptions::default(), None).unwrap();
        assert_eq!(report.summary.questions, 2);
        assert_eq!(report.summary.scored, 1);
        assert_eq!(report.summary.skipped, vec!["q2".to_string()]);
        assert!(report.per_question[1].metrics.is_empty());
    }

    #[test]
    fn test_scored_question_finds_gold() {
        let r = retriever();
        let report = run_eval(&r, &rows(), &EvalOptions::default(), None).unwrap();
        let q1 = &report.per_question[0];
        assert!(!q1.skipped);
        let m5 = q1.metrics.iter().find(|m| m.k == 5).unwrap();
        assert!((m5.recall - 1.0).abs() < f64::EPSILON);
        assert!(m5.mrr > 0.0);
        assert!(m5.ndcg > 0.0 && m5.ndcg <= 1.0);
    }

    #[test]
    fn test_reports_byte_identical_across_runs() {
        let r = retriever();
        let options = EvalOptions::default();
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        let report_a = run_eval(&r, &rows(), &options, None).unwrap();
        let report_b = run_eval(&r, &rows(), &options, None).unwrap();
        write_reports(&report_a, dir_a.path()).unwrap();
        write_reports(&report_b, dir_b.path()).unwrap();

        for name in ["per_question.jsonl", "summary.json", "summary.md"] {
            let a = std::fs::read(dir_a.path().join(name)).unwrap();
            let b = std::fs::read(dir_b.path().join(name)).unwrap();
            assert_eq!(a, b, "{name} differs between runs");
        }
    }

    #[test]
    fn test_ks_sorted_and_deduped() {
        let r = retriever();
        let options = EvalOptions {
            ks: vec![10, 5, 5],
            ..EvalOptions::default()
        };
        let report = run_eval(&r, &rows(), &options, None).unwrap();
        assert_eq!(report.summary.ks, vec![5, 10]);
        assert_eq!(report.per_question[0].metrics.len(), 2);
    }

    #[test]
    fn test_markdown_contains_table() {
        let r = retriever();
        let report = run_eval(&r, &rows(), &EvalOptions::default(), None).unwrap();
        let md = render_markdown(&report.summary);
        assert!(md.contains("| k | Recall |"));
        assert!(md.contains("Skipped: q2"));
    }
}
