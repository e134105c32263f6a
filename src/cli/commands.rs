//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Configuration comes
//! from the environment and is overridden by flags; validation failures
//! surface before any index is loaded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::agent::{write_trace, AgentLoop};
use crate::answer::{assign_keys, AnswerBuilder, AnswerResult, EvidenceItem};
use crate::cli::output::{
    format_agent_result, format_answer, format_eval_summary, format_hits, AgentPayload,
    AskPayload,
};
use crate::cli::parser::{Cli, Commands};
use crate::config::{
    AgentBudgets, AnswerConfig, GeneratorConfig, RetrievalConfig, RetrievalMode, VectorBackend,
};
use crate::corpus::ChunkStore;
use crate::error::{CommandError, ConfigError, Result};
use crate::eval::{load_dataset, run_eval, write_reports, EvalOptions};
use crate::index::Bm25Index;
use crate::llm::{Generator, HttpGenerator};
use crate::retrieval::{select_evidence, Retriever};

/// Executes the parsed CLI command, returning the text to print.
///
/// # Errors
///
/// Returns configuration errors (exit code 2) before touching any index,
/// and command errors (exit code 1) for runtime failures. Zero search
/// results and refusals are normal output, not errors.
pub fn execute(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Search {
            query,
            mode,
            backend,
            k,
            candidate_multiplier,
            k0,
            no_query_fusion,
            no_rerank,
            rerank_pool,
        } => {
            let config = retrieval_config(
                mode.as_deref(),
                backend.as_deref(),
                *k,
                *candidate_multiplier,
                *k0,
                *no_query_fusion,
                *no_rerank,
                *rerank_pool,
            )?;
            cmd_search(cli, query, config)
        }
        Commands::Ask {
            question,
            json,
            show_evidence,
            save_json,
        } => cmd_ask(cli, question, *json, *show_evidence, save_json.as_deref()),
        Commands::AgentAsk {
            question,
            out_dir,
            no_trace,
            json,
        } => cmd_agent_ask(cli, question, out_dir, *no_trace, *json),
        Commands::EvalRun {
            dataset,
            ks,
            with_answers,
            near_page_tolerance,
            allow_unlabeled,
            out_dir,
        } => cmd_eval_run(
            cli,
            dataset,
            ks,
            *with_answers,
            *near_page_tolerance,
            *allow_unlabeled,
            out_dir,
        ),
        Commands::BuildIndex { output } => cmd_build_index(cli, output),
    }
}

/// Resolves the retrieval configuration: environment first, flags on top.
#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
fn retrieval_config(
    mode: Option<&str>,
    backend: Option<&str>,
    k: Option<usize>,
    candidate_multiplier: Option<usize>,
    k0: Option<f64>,
    no_query_fusion: bool,
    no_rerank: bool,
    rerank_pool: Option<usize>,
) -> Result<RetrievalConfig> {
    let mut config = RetrievalConfig::from_env()?;
    if let Some(mode) = mode {
        config.mode = mode.parse::<RetrievalMode>()?;
    }
    if let Some(backend) = backend {
        config.backend = backend.parse::<VectorBackend>()?;
    }
    if let Some(k) = k {
        config.top_k = k;
    }
    if let Some(multiplier) = candidate_multiplier {
        config.candidate_multiplier = multiplier;
    }
    if let Some(k0) = k0 {
        config.rrf_k0 = k0;
    }
    if no_query_fusion {
        config.query_fusion = false;
    }
    if no_rerank {
        config.enable_rerank = false;
    }
    if let Some(pool) = rerank_pool {
        config.rerank_pool = pool;
    }
    config.validate()?;
    Ok(config)
}

fn corpus_path(cli: &Cli) -> Result<&PathBuf> {
    cli.corpus.as_ref().ok_or_else(|| {
        ConfigError::Missing {
            name: "--corpus (CITESEEK_CORPUS)",
        }
        .into()
    })
}

/// Loads the chunk store and the BM25 index.
///
/// With no artifact path the index is built in memory from the corpus.
fn load_engine(cli: &Cli) -> Result<(Arc<ChunkStore>, Arc<Bm25Index>)> {
    let store = Arc::new(ChunkStore::load_jsonl(corpus_path(cli)?)?);
    let bm25 = match &cli.bm25_index {
        Some(path) => Arc::new(Bm25Index::load(path)?),
        None => {
            info!("no BM25 artifact given; building index from corpus");
            Arc::new(Bm25Index::build(&store))
        }
    };
    Ok((store, bm25))
}

fn make_generator() -> Result<HttpGenerator> {
    HttpGenerator::from_config(&GeneratorConfig::from_env()?)
}

fn cmd_search(cli: &Cli, query: &str, config: RetrievalConfig) -> Result<String> {
    let (store, bm25) = load_engine(cli)?;
    let retriever = Retriever::new(store, bm25, config);
    let hits = retriever.retrieve(query)?;
    Ok(format_hits(&hits))
}

/// Runs the single-pass retrieve → select → answer flow shared by `ask`
/// and `eval-run --with-answers`.
fn answer_once(
    retriever: &Retriever,
    builder: &AnswerBuilder,
    generator: &dyn Generator,
    question: &str,
) -> Result<(AnswerResult, Vec<EvidenceItem>)> {
    let hits = retriever.retrieve(question)?;
    let selection = select_evidence(&hits, retriever.store(), builder.config());
    let items = assign_keys(&selection.items);
    let result = builder.build(
        generator,
        question,
        &selection.items,
        &hits,
        selection.sufficient,
    );
    Ok((result, items))
}

fn cmd_ask(
    cli: &Cli,
    question: &str,
    json: bool,
    show_evidence: bool,
    save_json: Option<&Path>,
) -> Result<String> {
    let retrieval = RetrievalConfig::from_env()?;
    let answer_config = AnswerConfig::from_env()?;
    let generator = make_generator()?;

    let (store, bm25) = load_engine(cli)?;
    let retriever = Retriever::new(store, bm25, retrieval);
    let builder = AnswerBuilder::new(answer_config);

    let (result, items) = answer_once(&retriever, &builder, &generator, question)?;

    let rendered_evidence =
        show_evidence.then(|| crate::answer::format_evidence(&items));
    if let Some(path) = save_json {
        let payload = AskPayload::new(question, &result, rendered_evidence.clone());
        let body = serde_json::to_string_pretty(&payload)?;
        std::fs::write(path, body).map_err(|e| CommandError::OutputFailed {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    if json {
        let payload = AskPayload::new(question, &result, rendered_evidence);
        Ok(serde_json::to_string_pretty(&payload)? + "\n")
    } else {
        let evidence = show_evidence.then_some(items.as_slice());
        Ok(format_answer(&result, evidence))
    }
}

fn cmd_agent_ask(
    cli: &Cli,
    question: &str,
    out_dir: &Path,
    no_trace: bool,
    json: bool,
) -> Result<String> {
    let retrieval = RetrievalConfig::from_env()?;
    let answer_config = AnswerConfig::from_env()?;
    let budgets = AgentBudgets::from_env()?;
    let generator = make_generator()?;

    let (store, bm25) = load_engine(cli)?;
    let retriever = Retriever::new(store, bm25, retrieval);
    let builder = AnswerBuilder::new(answer_config);

    let state = AgentLoop::new(&retriever, &builder, &generator, budgets).run(question);

    let trace_path = if no_trace {
        None
    } else {
        Some(write_trace(&state, out_dir)?)
    };
    let trace_str = trace_path.map(|p| p.to_string_lossy().to_string());

    if json {
        let payload = AgentPayload::new(&state, trace_str);
        Ok(serde_json::to_string_pretty(&payload)? + "\n")
    } else {
        Ok(format_agent_result(&state, trace_str.as_deref()))
    }
}

fn cmd_eval_run(
    cli: &Cli,
    dataset: &Path,
    ks: &[usize],
    with_answers: bool,
    near_page_tolerance: u32,
    allow_unlabeled: bool,
    out_dir: &Path,
) -> Result<String> {
    if ks.is_empty() || ks.contains(&0) {
        return Err(ConfigError::NonPositive {
            name: "--ks",
            value: 0,
        }
        .into());
    }

    let mut retrieval = RetrievalConfig::from_env()?;
    // Retrieval must return enough hits to score the largest cutoff.
    let max_k = ks.iter().copied().max().unwrap_or(retrieval.top_k);
    retrieval.top_k = retrieval.top_k.max(max_k);

    let rows = load_dataset(dataset, allow_unlabeled)?;
    let (store, bm25) = load_engine(cli)?;
    let retriever = Retriever::new(store, bm25, retrieval);

    let options = EvalOptions {
        ks: ks.to_vec(),
        near_page_tolerance,
        with_answers,
    };

    let report = if with_answers {
        let generator = make_generator()?;
        let builder = AnswerBuilder::new(AnswerConfig::from_env()?);
        run_eval(&retriever, &rows, &options, Some((&builder, &generator)))?
    } else {
        run_eval(&retriever, &rows, &options, None)?
    };

    let (jsonl, json, md) = write_reports(&report, out_dir)?;
    let mut out = format_eval_summary(&report.summary);
    out.push_str(&format!(
        "\nwrote {}\nwrote {}\nwrote {}\n",
        jsonl.display(),
        json.display(),
        md.display()
    ));
    Ok(out)
}

fn cmd_build_index(cli: &Cli, output: &Path) -> Result<String> {
    let store = ChunkStore::load_jsonl(corpus_path(cli)?)?;
    let index = Bm25Index::build(&store);
    index.save(output)?;
    Ok(format!(
        "indexed {} chunks -> {}\n",
        index.doc_count(),
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::compose_chunk_id;
    use crate::corpus::ChunkRecord;
    use clap::Parser;

    fn write_corpus(dir: &Path) -> PathBuf {
        let records = vec![
            ChunkRecord {
                vector_id: 0,
                chunk_id: compose_chunk_id("FIPS.203", 1, 0),
                doc_id: "FIPS.203".to_string(),
                start_page: 1,
                end_page: 1,
                text: "ML-KEM is a key-encapsulation mechanism".to_string(),
            },
            ChunkRecord {
                vector_id: 1,
                chunk_id: compose_chunk_id("FIPS.204", 1, 0),
                doc_id: "FIPS.204".to_string(),
                start_page: 1,
                end_page: 1,
                text: "ML-DSA is a digital signature scheme".to_string(),
            },
        ];
        let path = dir.join("chunks.jsonl");
        let body: String = records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap() + "\n")
            .collect();
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_search_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "search",
            "digital signature",
            "--k",
            "2",
        ]);
        let out = execute(&cli).unwrap();
        assert!(out.contains("FIPS.204"));
        assert!(out.contains("(FIPS.204::p0001::c000)"));
    }

    #[test]
    fn test_search_zero_results_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "search",
            "zzz-missing-term",
            "--mode",
            "base",
            "--backend",
            "bm25",
            "--no-query-fusion",
        ]);
        let out = execute(&cli).unwrap();
        assert_eq!(out, "No results.\n");
    }

    #[test]
    fn test_missing_corpus_is_config_error() {
        let cli = Cli::parse_from(["citeseek", "search", "anything"]);
        let err = execute(&cli).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_mode_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "search",
            "x",
            "--mode",
            "fuzzy",
        ]);
        let err = execute(&cli).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_build_index_then_search_with_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let artifact = dir.path().join("bm25.json");

        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "build-index",
            "--output",
            artifact.to_str().unwrap(),
        ]);
        let out = execute(&cli).unwrap();
        assert!(out.contains("indexed 2 chunks"));

        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "--bm25-index",
            artifact.to_str().unwrap(),
            "search",
            "encapsulation",
        ]);
        let out = execute(&cli).unwrap();
        assert!(out.contains("FIPS.203"));
    }

    #[test]
    fn test_eval_run_writes_reports() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let dataset = dir.path().join("dataset.jsonl");
        std::fs::write(
            &dataset,
            concat!(
                r#"{"qid":"q1","question":"What is ML-KEM?","answerable":true,"gold":[{"doc_id":"FIPS.203","start_page":1,"end_page":1}]}"#,
                "\n",
                r#"{"qid":"q2","question":"What about wifi 9?","answerable":false,"gold":[]}"#,
                "\n",
            ),
        )
        .unwrap();
        let out_dir = dir.path().join("eval_out");

        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "eval-run",
            "--dataset",
            dataset.to_str().unwrap(),
            "--ks",
            "1,5",
            "--out-dir",
            out_dir.to_str().unwrap(),
        ]);
        let out = execute(&cli).unwrap();
        assert!(out.contains("2 questions, 1 scored, 1 skipped"));
        assert!(out_dir.join("per_question.jsonl").exists());
        assert!(out_dir.join("summary.json").exists());
        assert!(out_dir.join("summary.md").exists());
    }

    #[test]
    fn test_ask_without_generator_is_config_error() {
        // LLM_API_BASE unset: ask must fail fast as a configuration error.
        std::env::remove_var("LLM_API_BASE");
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let cli = Cli::parse_from([
            "citeseek",
            "--corpus",
            corpus.to_str().unwrap(),
            "ask",
            "What is ML-KEM?",
        ]);
        let err = execute(&cli).unwrap_err();
        assert!(err.is_config());
    }
}
