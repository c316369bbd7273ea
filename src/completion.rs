//! Text-completion seam.
//!
//! The reply interpreter asks an LLM to extract structured answers from
//! free text. The service may fail or produce garbage; callers go
//! through `analysis::interpret`, which fails soft. This module only
//! carries the transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion backend unreachable at {0}")]
    Connection(String),

    #[error("completion request timed out after {0}s")]
    Timeout(u64),

    #[error("completion backend returned status {status}")]
    Status { status: u16 },

    #[error("completion transport error: {0}")]
    Transport(String),
}

/// Prompt in, text out, may fail.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Strip markdown code fencing from a model reply.
///
/// Models regularly wrap JSON in ```json fences despite being told not
/// to. Removes a leading fence line (with or without a language tag) and
/// a trailing fence; inner content is untouched.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag (e.g. "json") up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim().trim_end_matches("```").trim()
}

/// HTTP completion client for an Ollama-compatible generate endpoint.
pub struct HttpCompletionClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Local Ollama instance with a 60s budget — parameter extraction is
    /// a short prompt, anything slower than this is effectively down.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", "llama3.2", 60)
    }

    pub fn from_env() -> Self {
        let base_url = std::env::var("CARELINE_COMPLETION_URL")
            .unwrap_or_else(|_| "http://localhost:11434".into());
        let model =
            std::env::var("CARELINE_COMPLETION_MODEL").unwrap_or_else(|_| "llama3.2".into());
        Self::new(&base_url, &model, 60)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_connect() {
                CompletionError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                CompletionError::Timeout(self.timeout_secs)
            } else {
                CompletionError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        Ok(parsed.response)
    }
}
