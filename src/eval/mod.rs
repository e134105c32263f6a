//! Evaluation harness: dataset contract, metrics, deterministic reports.

mod dataset;
mod metrics;
mod report;

pub use dataset::{load_dataset, qid_sort_key, DatasetRow, GoldSpan, QidKey};
pub use metrics::{mrr_at_k, ndcg_at_k, recall_at_k, Relevance};
pub use report::{
    run_eval, write_reports, EvalOptions, EvalReport, MetricRow, QuestionReport, Summary,
};
