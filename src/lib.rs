//! # citeseek
//!
//! Citation-grounded question answering over a fixed corpus of structured
//! technical PDFs (standards documents). Given a natural-language
//! question, the engine retrieves page-addressable evidence through a
//! deterministic hybrid pipeline (BM25 + dense, query-variant fusion,
//! reciprocal-rank fusion, optional lexical rerank), synthesizes a short
//! answer, and emits machine-checkable citations — or refuses with the
//! exact sentinel rather than emit uncited claims.
//!
//! ## Components
//!
//! - **Corpus / index**: in-memory chunk store and a persisted BM25
//!   artifact with a technical-token-aware tokenizer
//! - **Retrieval**: dense adapter contract, deterministic query variants,
//!   RRF, rerank, evidence selection with neighbor windowing
//! - **Answering**: prompt contract, inline-citation enforcement,
//!   deterministic fallbacks, refusal semantics
//! - **Agent**: bounded control loop (route → retrieve → assess → refine →
//!   answer → verify/refuse) with step/tool/round budgets
//! - **Evaluation**: strict page-overlap relevance, Recall/MRR/nDCG,
//!   byte-stable reports

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped artifact loading (memmap2)
#![warn(unsafe_code)]

pub mod agent;
pub mod answer;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod index;
pub mod llm;
pub mod retrieval;
pub mod schemes;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export corpus and index types
pub use corpus::{compose_chunk_id, ChunkRecord, ChunkStore};
pub use index::{tokenize, Bm25Index};

// Re-export retrieval types
pub use retrieval::{
    expand_query, rrf_fuse, select_evidence, DenseHit, DenseIndex, Hit, Retriever,
};

// Re-export answer types
pub use answer::{AnswerBuilder, AnswerResult, Citation, REFUSAL_SENTINEL};

// Re-export agent types
pub use agent::{AgentLoop, AgentState, Plan, RefusalReason, StopReason};

// Re-export evaluation types
pub use eval::{load_dataset, run_eval, DatasetRow, EvalOptions, GoldSpan};

// Re-export configuration and generator contracts
pub use config::{AgentBudgets, AnswerConfig, GeneratorConfig, RetrievalConfig};
pub use llm::{Generator, HttpGenerator};

// Re-export CLI types
pub use cli::{Cli, Commands};
