//! CLI smoke tests for the citeseek binary.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn write_corpus(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("chunks.jsonl");
    let body = concat!(
        r#"{"vector_id":0,"chunk_id":"FIPS.203::p0001::c000","doc_id":"FIPS.203","start_page":1,"end_page":1,"text":"ML-KEM is a key-encapsulation mechanism"}"#,
        "\n",
        r#"{"vector_id":1,"chunk_id":"FIPS.204::p0001::c000","doc_id":"FIPS.204","start_page":1,"end_page":1,"text":"ML-DSA is a digital signature scheme"}"#,
        "\n",
    );
    std::fs::write(&path, body).expect("write corpus");
    path
}

#[test]
fn search_prints_hits_and_exits_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = write_corpus(dir.path());

    Command::cargo_bin("citeseek")
        .expect("binary")
        .args([
            "--corpus",
            corpus.to_str().expect("utf-8 path"),
            "search",
            "digital signature",
            "--k",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("FIPS.204"))
        .stdout(predicate::str::contains("p1-p1"));
}

#[test]
fn search_with_zero_results_exits_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = write_corpus(dir.path());

    Command::cargo_bin("citeseek")
        .expect("binary")
        .args([
            "--corpus",
            corpus.to_str().expect("utf-8 path"),
            "search",
            "zzz-missing-term",
            "--mode",
            "base",
            "--backend",
            "bm25",
            "--no-query-fusion",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results."));
}

#[test]
fn invalid_backend_exits_two() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = write_corpus(dir.path());

    Command::cargo_bin("citeseek")
        .expect("binary")
        .args([
            "--corpus",
            corpus.to_str().expect("utf-8 path"),
            "search",
            "anything",
            "--backend",
            "annoy",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown vector backend"));
}

#[test]
fn missing_corpus_exits_two() {
    Command::cargo_bin("citeseek")
        .expect("binary")
        .env_remove("CITESEEK_CORPUS")
        .args(["search", "anything"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing required setting"));
}

#[test]
fn build_index_then_search_against_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = write_corpus(dir.path());
    let artifact = dir.path().join("bm25.json");

    Command::cargo_bin("citeseek")
        .expect("binary")
        .args([
            "--corpus",
            corpus.to_str().expect("utf-8 path"),
            "build-index",
            "--output",
            artifact.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("indexed 2 chunks"));

    Command::cargo_bin("citeseek")
        .expect("binary")
        .args([
            "--corpus",
            corpus.to_str().expect("utf-8 path"),
            "--bm25-index",
            artifact.to_str().expect("utf-8 path"),
            "search",
            "encapsulation",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("FIPS.203"));
}

#[test]
fn agent_ask_without_generator_config_exits_two() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus = write_corpus(dir.path());

    Command::cargo_bin("citeseek")
        .expect("binary")
        .env_remove("LLM_API_BASE")
        .args([
            "--corpus",
            corpus.to_str().expect("utf-8 path"),
            "agent-ask",
            "What is ML-KEM?",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("generator not configured"));
}
