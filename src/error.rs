//! Error types for citeseek operations.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! engine operations including corpus loading, indexing, retrieval,
//! generation, evaluation, and CLI commands.

use thiserror::Error;

/// Result type alias for citeseek operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for citeseek operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (invalid mode/backend, non-positive budgets).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Corpus errors (chunk store loading and invariant violations).
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Index errors (BM25 artifact build/load).
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Dataset validation errors (evaluation inputs).
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Generator errors (LLM adapter).
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(String),
}

/// Configuration errors. These fail fast at startup, before any index is
/// touched or the control loop is entered.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unknown retrieval mode.
    #[error("unknown retrieval mode: {value} (expected 'base' or 'hybrid')")]
    UnknownMode {
        /// The rejected value.
        value: String,
    },

    /// Unknown vector backend.
    #[error("unknown vector backend: {value} (expected 'faiss' or 'bm25')")]
    UnknownBackend {
        /// The rejected value.
        value: String,
    },

    /// A numeric setting that must be positive was zero or negative.
    #[error("{name} must be positive, got {value}")]
    NonPositive {
        /// Setting name (env var or flag).
        name: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// An environment variable failed to parse.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// The unparseable value.
        value: String,
    },

    /// The generator adapter is not configured.
    #[error("generator not configured: {0}")]
    GeneratorUnconfigured(String),

    /// A required setting is missing.
    #[error("missing required setting: {name}")]
    Missing {
        /// Setting name (flag or env var).
        name: &'static str,
    },
}

/// Corpus errors raised while loading or validating the chunk store.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// Chunk store file could not be read.
    #[error("failed to read chunk store {path}: {reason}")]
    ReadFailed {
        /// Path to the chunk store.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// A chunk store line failed to parse.
    #[error("chunk store line {line}: {reason}")]
    InvalidRecord {
        /// 1-based line number.
        line: usize,
        /// Reason the record is invalid.
        reason: String,
    },

    /// Duplicate chunk id.
    #[error("duplicate chunk_id: {chunk_id}")]
    DuplicateChunkId {
        /// The duplicated id.
        chunk_id: String,
    },

    /// The vector id sequence is not the contiguous range `[0, N)`.
    #[error("vector_id {found} at position {position} breaks the contiguous range")]
    NonContiguousVectorId {
        /// The vector id found.
        found: u32,
        /// Zero-based record position.
        position: usize,
    },

    /// Chunk not found by id.
    #[error("chunk not found: {chunk_id}")]
    ChunkNotFound {
        /// The missing chunk id.
        chunk_id: String,
    },
}

/// Index errors raised while building, persisting, or loading the BM25
/// artifact.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Artifact file missing.
    #[error("BM25 artifact not found: {path}")]
    ArtifactNotFound {
        /// Path that was probed.
        path: String,
    },

    /// Artifact read failed.
    #[error("failed to read BM25 artifact {path}: {reason}")]
    ReadFailed {
        /// Path to the artifact.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Artifact write failed.
    #[error("failed to write BM25 artifact {path}: {reason}")]
    WriteFailed {
        /// Path to the artifact.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Artifact deserialization failed.
    #[error("corrupt BM25 artifact: {0}")]
    Corrupt(String),
}

/// Dataset validation errors. A single invalid row rejects the run;
/// there are no partial evaluation runs.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Dataset file could not be read.
    #[error("failed to read dataset {path}: {reason}")]
    ReadFailed {
        /// Path to the dataset.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// A dataset row failed validation.
    #[error("dataset line {line}: {reason}")]
    InvalidRow {
        /// 1-based line number.
        line: usize,
        /// Reason the row is invalid.
        reason: String,
    },

    /// Duplicate question id.
    #[error("dataset line {line}: duplicate qid {qid}")]
    DuplicateQid {
        /// 1-based line number.
        line: usize,
        /// The duplicated qid.
        qid: String,
    },
}

/// Generator adapter errors. Transient failures are retried with backoff;
/// persistent failures surface as refusals, never as panics.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// HTTP transport failure.
    #[error("generator request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("generator returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("malformed generator response: {0}")]
    MalformedResponse(String),

    /// All retry attempts exhausted.
    #[error("generator failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The last error message.
        last: String,
    },
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Output write failure.
    #[error("failed to write output {path}: {reason}")]
    OutputFailed {
        /// Path to the output file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

// Implement From traits for standard library and ecosystem errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl Error {
    /// Returns true for configuration errors, which map to exit code 2.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
