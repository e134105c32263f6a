//! Generator contract and the HTTP adapter.
//!
//! The generative model is an external collaborator: anything mapping a
//! prompt to deterministic text (temperature 0) satisfies [`Generator`].
//! The built-in adapter talks to an OpenAI-compatible chat-completions
//! endpoint with a fixed retry-with-backoff policy.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::error::{ConfigError, GeneratorError, Result};

/// Retry schedule: 3 attempts with 0.5 s / 1 s / 2 s backoff.
const BACKOFF: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(1000),
    Duration::from_millis(2000),
];

/// Contract for the generative model.
///
/// Implementations must be deterministic for a fixed prompt (temperature 0)
/// and thread-safe; the engine shares one generator across requests.
pub trait Generator: Send + Sync {
    /// Generates text for a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError`] when the model is unreachable or the
    /// response is malformed, after exhausting any internal retries.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// HTTP generator against an OpenAI-compatible chat-completions endpoint.
#[derive(Debug)]
pub struct HttpGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpGenerator {
    /// Creates the adapter from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::GeneratorUnconfigured`] when no API base is
    /// set — answering commands require a generator; retrieval-only
    /// commands never construct one.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let api_base = config.api_base.clone().ok_or_else(|| {
            ConfigError::GeneratorUnconfigured(
                "set LLM_API_BASE to an OpenAI-compatible endpoint".to_string(),
            )
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(GeneratorError::from)?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    fn request_once(&self, prompt: &str) -> std::result::Result<String, GeneratorError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| GeneratorError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| GeneratorError::MalformedResponse("no choices".to_string()))
    }
}

impl Generator for HttpGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let mut last_error = String::new();
        for (attempt, delay) in BACKOFF.iter().enumerate() {
            match self.request_once(prompt) {
                Ok(text) => {
                    debug!(attempt = attempt + 1, chars = text.len(), "generation complete");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "generation attempt failed");
                    last_error = e.to_string();
                    if attempt + 1 < BACKOFF.len() {
                        std::thread::sleep(*delay);
                    }
                }
            }
        }
        Err(GeneratorError::RetriesExhausted {
            attempts: BACKOFF.len(),
            last: last_error,
        }
        .into())
    }
}
