//! Runtime configuration.
//!
//! All tunables come from environment variables with hard-coded defaults;
//! CLI flags override the environment. Invalid values fail fast with a
//! [`ConfigError`] before any index is loaded or the control loop runs.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// Retrieval mode: a single source or the full hybrid pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Single-source retrieval against the configured backend.
    Base,
    /// Query-variant fusion over dense and lexical sources.
    Hybrid,
}

impl FromStr for RetrievalMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ConfigError::UnknownMode {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Vector backend for the dense retrieval slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// Dense inner-product index (the built-in flat index, or any engine
    /// implementing the dense contract).
    Faiss,
    /// Lexical stand-in: the BM25 index serves the dense slot as well.
    Bm25,
}

impl FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "faiss" => Ok(Self::Faiss),
            "bm25" => Ok(Self::Bm25),
            _ => Err(ConfigError::UnknownBackend {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faiss => write!(f, "faiss"),
            Self::Bm25 => write!(f, "bm25"),
        }
    }
}

/// Retrieval pipeline configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Dense backend for the vector slot.
    pub backend: VectorBackend,
    /// Base or hybrid pipeline.
    pub mode: RetrievalMode,
    /// Final number of hits returned.
    pub top_k: usize,
    /// Per-source pool multiplier; `per_source_k = max(top_k * multiplier, top_k)`.
    pub candidate_multiplier: usize,
    /// RRF constant `k0`.
    pub rrf_k0: f64,
    /// Whether query-variant fusion is enabled.
    pub query_fusion: bool,
    /// Whether the lexical rerank stage is enabled.
    pub enable_rerank: bool,
    /// Rerank candidate pool; effective pool is `max(top_k, rerank_pool)`.
    pub rerank_pool: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Faiss,
            mode: RetrievalMode::Hybrid,
            top_k: 8,
            candidate_multiplier: 4,
            rrf_k0: 60.0,
            query_fusion: true,
            enable_rerank: true,
            rerank_pool: 24,
        }
    }
}

impl RetrievalConfig {
    /// Builds the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unparseable or non-positive values.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            backend: env_enum("VECTOR_BACKEND", defaults.backend)?,
            mode: env_enum("RETRIEVAL_MODE", defaults.mode)?,
            top_k: env_parse("TOP_K", defaults.top_k)?,
            candidate_multiplier: env_parse(
                "RETRIEVAL_CANDIDATE_MULTIPLIER",
                defaults.candidate_multiplier,
            )?,
            rrf_k0: env_parse("RETRIEVAL_RRF_K0", defaults.rrf_k0)?,
            query_fusion: env_bool("RETRIEVAL_QUERY_FUSION", defaults.query_fusion)?,
            enable_rerank: env_bool("RETRIEVAL_ENABLE_RERANK", defaults.enable_rerank)?,
            rerank_pool: env_parse("RETRIEVAL_RERANK_POOL", defaults.rerank_pool)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a setting that must be positive is zero.
    pub fn validate(&self) -> Result<()> {
        require_positive("TOP_K", self.top_k)?;
        require_positive("RETRIEVAL_CANDIDATE_MULTIPLIER", self.candidate_multiplier)?;
        if self.rrf_k0 <= 0.0 {
            return Err(ConfigError::NonPositive {
                name: "RETRIEVAL_RRF_K0",
                value: self.rrf_k0 as i64,
            }
            .into());
        }
        require_positive("RETRIEVAL_RERANK_POOL", self.rerank_pool)?;
        Ok(())
    }

    /// Per-source candidate pool size.
    #[must_use]
    pub fn per_source_k(&self) -> usize {
        (self.top_k * self.candidate_multiplier).max(self.top_k)
    }
}

/// Answer construction configuration.
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    /// Maximum evidence chunks in the prompt context.
    pub max_context_chunks: usize,
    /// Maximum cumulative evidence characters in the prompt context.
    pub max_context_chars: usize,
    /// Minimum unique hits before the generator is invoked.
    pub min_evidence_hits: usize,
    /// Whether a non-refusal answer must carry citations.
    pub require_citations: bool,
    /// Whether same-document neighbor chunks are pulled into context.
    pub include_neighbor_chunks: bool,
    /// Neighbor window (chunks before and after each seed).
    pub neighbor_window: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_context_chunks: 6,
            max_context_chars: 12_000,
            min_evidence_hits: 2,
            require_citations: true,
            include_neighbor_chunks: false,
            neighbor_window: 1,
        }
    }
}

impl AnswerConfig {
    /// Builds the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unparseable or non-positive values.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            max_context_chunks: env_parse("ASK_MAX_CONTEXT_CHUNKS", defaults.max_context_chunks)?,
            max_context_chars: env_parse("ASK_MAX_CONTEXT_CHARS", defaults.max_context_chars)?,
            min_evidence_hits: env_parse("ASK_MIN_EVIDENCE_HITS", defaults.min_evidence_hits)?,
            require_citations: env_bool("ASK_REQUIRE_CITATIONS", defaults.require_citations)?,
            include_neighbor_chunks: env_bool(
                "ASK_INCLUDE_NEIGHBOR_CHUNKS",
                defaults.include_neighbor_chunks,
            )?,
            neighbor_window: env_parse("ASK_NEIGHBOR_WINDOW", defaults.neighbor_window)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a setting that must be positive is zero.
    pub fn validate(&self) -> Result<()> {
        require_positive("ASK_MAX_CONTEXT_CHUNKS", self.max_context_chunks)?;
        require_positive("ASK_MAX_CONTEXT_CHARS", self.max_context_chars)?;
        require_positive("ASK_MIN_EVIDENCE_HITS", self.min_evidence_hits)?;
        Ok(())
    }
}

/// Control-loop budgets.
#[derive(Debug, Clone)]
pub struct AgentBudgets {
    /// Maximum node entries before forced termination.
    pub max_steps: usize,
    /// Maximum retrieval tool calls.
    pub max_tool_calls: usize,
    /// Maximum retrieval rounds.
    pub max_retrieval_rounds: usize,
    /// Minimum unique evidence hits for sufficiency.
    pub min_evidence_hits: usize,
}

impl Default for AgentBudgets {
    fn default() -> Self {
        Self {
            max_steps: 8,
            max_tool_calls: 3,
            max_retrieval_rounds: 2,
            min_evidence_hits: 2,
        }
    }
}

impl AgentBudgets {
    /// Builds the budgets from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unparseable or non-positive values.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            max_steps: env_parse("AGENT_MAX_STEPS", defaults.max_steps)?,
            max_tool_calls: env_parse("AGENT_MAX_TOOL_CALLS", defaults.max_tool_calls)?,
            max_retrieval_rounds: env_parse(
                "AGENT_MAX_RETRIEVAL_ROUNDS",
                defaults.max_retrieval_rounds,
            )?,
            min_evidence_hits: env_parse("AGENT_MIN_EVIDENCE_HITS", defaults.min_evidence_hits)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the budgets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a budget is zero.
    pub fn validate(&self) -> Result<()> {
        require_positive("AGENT_MAX_STEPS", self.max_steps)?;
        require_positive("AGENT_MAX_TOOL_CALLS", self.max_tool_calls)?;
        require_positive("AGENT_MAX_RETRIEVAL_ROUNDS", self.max_retrieval_rounds)?;
        require_positive("AGENT_MIN_EVIDENCE_HITS", self.min_evidence_hits)?;
        Ok(())
    }

    /// Recursion cap for the graph driver.
    #[must_use]
    pub fn recursion_cap(&self) -> usize {
        (self.max_steps * 4).max(20)
    }
}

/// Generator adapter configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    pub api_base: Option<String>,
    /// Model identifier.
    pub model: String,
    /// API key, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Sampling temperature. The contract requires 0.
    pub temperature: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.0,
        }
    }
}

impl GeneratorConfig {
    /// Builds the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on an unparseable temperature.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_base: env::var("LLM_API_BASE").ok().filter(|s| !s.is_empty()),
            model: env::var("LLM_MODEL").unwrap_or(defaults.model),
            api_key: env::var("LLM_API_KEY").ok().filter(|s| !s.is_empty()),
            temperature: env_parse("LLM_TEMPERATURE", defaults.temperature)?,
        })
    }
}

fn require_positive(name: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(ConfigError::NonPositive { name, value: 0 }.into());
    }
    Ok(())
}

fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|_| {
            ConfigError::InvalidEnv {
                name,
                value: raw.clone(),
            }
            .into()
        }),
        _ => Ok(default),
    }
}

fn env_enum<T>(name: &'static str, default: T) -> Result<T>
where
    T: FromStr<Err = ConfigError>,
{
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(Into::into),
        _ => Ok(default),
    }
}

fn env_bool(name: &'static str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidEnv { name, value: raw }.into()),
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_mode_parse() {
        assert_eq!("base".parse::<RetrievalMode>().unwrap(), RetrievalMode::Base);
        assert_eq!(
            "Hybrid".parse::<RetrievalMode>().unwrap(),
            RetrievalMode::Hybrid
        );
        assert!("fuzzy".parse::<RetrievalMode>().is_err());
    }

    #[test]
    fn test_vector_backend_parse() {
        assert_eq!(
            "faiss".parse::<VectorBackend>().unwrap(),
            VectorBackend::Faiss
        );
        assert_eq!(
            "BM25".parse::<VectorBackend>().unwrap(),
            VectorBackend::Bm25
        );
        assert!("annoy".parse::<VectorBackend>().is_err());
    }

    #[test]
    fn test_per_source_k() {
        let cfg = RetrievalConfig {
            top_k: 8,
            candidate_multiplier: 4,
            ..RetrievalConfig::default()
        };
        assert_eq!(cfg.per_source_k(), 32);

        // Never below top_k even with multiplier 1
        let cfg = RetrievalConfig {
            top_k: 8,
            candidate_multiplier: 1,
            ..RetrievalConfig::default()
        };
        assert_eq!(cfg.per_source_k(), 8);
    }

    #[test]
    fn test_retrieval_defaults() {
        let cfg = RetrievalConfig::default();
        assert_eq!(cfg.mode, RetrievalMode::Hybrid);
        assert_eq!(cfg.backend, VectorBackend::Faiss);
        assert!((cfg.rrf_k0 - 60.0).abs() < f64::EPSILON);
        assert!(cfg.query_fusion);
        assert!(cfg.enable_rerank);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_agent_budget_defaults() {
        let budgets = AgentBudgets::default();
        assert_eq!(budgets.max_steps, 8);
        assert_eq!(budgets.max_tool_calls, 3);
        assert_eq!(budgets.max_retrieval_rounds, 2);
        assert_eq!(budgets.min_evidence_hits, 2);
        assert_eq!(budgets.recursion_cap(), 32);
    }

    #[test]
    fn test_recursion_cap_floor() {
        let budgets = AgentBudgets {
            max_steps: 2,
            ..AgentBudgets::default()
        };
        assert_eq!(budgets.recursion_cap(), 20);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let budgets = AgentBudgets {
            max_steps: 0,
            ..AgentBudgets::default()
        };
        let err = budgets.validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let cfg = RetrievalConfig {
            top_k: 0,
            ..RetrievalConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_answer_defaults_valid() {
        AnswerConfig::default().validate().unwrap();
    }
}
