//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Flags override the
//! corresponding environment variables; unset flags leave the environment
//! (or the defaults) in charge.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// citeseek: citation-grounded question answering over standards PDFs.
///
/// Retrieval is hybrid (BM25 + dense) with deterministic query-variant
/// fusion; answers carry machine-checkable citations or the exact refusal
/// sentinel.
#[derive(Parser, Debug)]
#[command(name = "citeseek")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the chunk-store JSONL file.
    #[arg(long, env = "CITESEEK_CORPUS", global = true)]
    pub corpus: Option<PathBuf>,

    /// Path to the BM25 artifact. Absent: the index is built in memory
    /// from the corpus at startup.
    #[arg(long, env = "CITESEEK_BM25_INDEX", global = true)]
    pub bm25_index: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the corpus and print ranked hits.
    Search {
        /// The search query.
        query: String,

        /// Retrieval mode (base, hybrid).
        #[arg(long)]
        mode: Option<String>,

        /// Vector backend (faiss, bm25).
        #[arg(long)]
        backend: Option<String>,

        /// Number of hits to return.
        #[arg(short, long)]
        k: Option<usize>,

        /// Per-source candidate pool multiplier.
        #[arg(long)]
        candidate_multiplier: Option<usize>,

        /// RRF k0 constant.
        #[arg(long)]
        k0: Option<f64>,

        /// Disable query-variant fusion.
        #[arg(long)]
        no_query_fusion: bool,

        /// Disable the lexical rerank stage.
        #[arg(long)]
        no_rerank: bool,

        /// Rerank candidate pool size.
        #[arg(long)]
        rerank_pool: Option<usize>,
    },

    /// Answer a question with citations (single retrieval pass).
    Ask {
        /// The question.
        question: String,

        /// Emit a structured JSON payload instead of text.
        #[arg(long)]
        json: bool,

        /// Include the evidence blocks in the output.
        #[arg(long)]
        show_evidence: bool,

        /// Also save the JSON payload to this path.
        #[arg(long)]
        save_json: Option<PathBuf>,
    },

    /// Answer a question with the bounded agent loop.
    AgentAsk {
        /// The question.
        question: String,

        /// Directory for the run trace.
        #[arg(long, default_value = "traces")]
        out_dir: PathBuf,

        /// Skip writing the run trace.
        #[arg(long)]
        no_trace: bool,

        /// Emit a structured JSON payload instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Run the retrieval evaluation harness.
    EvalRun {
        /// Path to the dataset JSONL file.
        #[arg(long)]
        dataset: PathBuf,

        /// Metric cutoffs.
        #[arg(long, value_delimiter = ',', default_value = "5,10")]
        ks: Vec<usize>,

        /// Also produce answers per scored question.
        #[arg(long)]
        with_answers: bool,

        /// Tolerance for the near-page diagnostic.
        #[arg(long, default_value = "1")]
        near_page_tolerance: u32,

        /// Accept answerable rows without gold labels (reported as skipped).
        #[arg(long)]
        allow_unlabeled: bool,

        /// Output directory for the reports.
        #[arg(long, default_value = "eval_out")]
        out_dir: PathBuf,
    },

    /// Build and persist the BM25 artifact from the corpus.
    BuildIndex {
        /// Output path for the artifact.
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_flags() {
        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            "chunks.jsonl",
            "search",
            "ML-KEM",
            "--mode",
            "hybrid",
            "--k",
            "5",
            "--no-rerank",
        ]);
        match cli.command {
            Commands::Search {
                query,
                mode,
                k,
                no_rerank,
                ..
            } => {
                assert_eq!(query, "ML-KEM");
                assert_eq!(mode.as_deref(), Some("hybrid"));
                assert_eq!(k, Some(5));
                assert!(no_rerank);
            }
            _ => unreachable!("expected search command"),
        }
    }

    #[test]
    fn test_eval_run_ks_delimiter() {
        let cli = Cli::parse_from([
            "citeseek",
            "eval-run",
            "--dataset",
            "ds.jsonl",
            "--ks",
            "1,5,10",
        ]);
        match cli.command {
            Commands::EvalRun { ks, .. } => assert_eq!(ks, vec![1, 5, 10]),
            _ => unreachable!("expected eval-run command"),
        }
    }

    #[test]
    fn test_agent_ask_defaults() {
        let cli = Cli::parse_from(["citeseek", "agent-ask", "What is ML-KEM?"]);
        match cli.command {
            Commands::AgentAsk {
                out_dir, no_trace, ..
            } => {
                assert_eq!(out_dir, PathBuf::from("traces"));
                assert!(!no_trace);
            }
            _ => unreachable!("expected agent-ask command"),
        }
    }
}
