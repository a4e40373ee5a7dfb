//! Pluggable text-generation backend abstraction
//!
//! This module provides a backend-agnostic gateway for narrative generation.
//!
//! # Architecture
//!
//! - `AIBackend` trait: `generate` (free text) and `generate_structured`
//!   (`insight_text` + `recommendations`), both returning `GenerationResult`
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`,
//!   `GeminiBackend`, `MockBackend`
//!
//! # Failure handling
//!
//! Every HTTP client is built with the configured timeout. Transport
//! failures are retried up to `max_retries` times with a fixed backoff;
//! status and parse failures are returned immediately. Callers never see a
//! panic or an untyped error: a `GenerationError` names what went wrong.
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = Config::load(None)?;
//! let ai = AIClient::from_config(&config.generation);
//!
//! match ai.generate_structured(&prompt).await {
//!     Ok(insight) => println!("{}", insight.insight_text),
//!     Err(e) => tracing::warn!(kind = e.kind(), "falling back to template"),
//! }
//! ```

mod gemini;
mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::{MockBackend, MockBehavior};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{GenerationBackendKind, GenerationConfig};

use parsing::parse_generated_insight;

/// Trait defining the interface for all text-generation backends
///
/// Backends must be Send + Sync: the formatter calls them concurrently.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Generate free text for a prompt
    async fn generate(&self, prompt: &str) -> GenerationResult<String>;

    /// Generate and parse an `{insight_text, recommendations}` object
    ///
    /// A response that does not parse into both fields is
    /// `GenerationError::MalformedResponse`.
    async fn generate_structured(&self, prompt: &str) -> GenerationResult<GeneratedInsight> {
        let response = self.generate(prompt).await?;
        parse_generated_insight(&response)
    }

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Timeout and retry settings shared by the HTTP backends
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts after a transport failure
    pub max_retries: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// HTTP client honoring the timeout
    pub(crate) fn http_client(&self) -> Client {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                Client::new()
            })
    }
}

/// Run `op`, retrying transport failures per the policy
pub(crate) async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> GenerationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GenerationResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::debug!(attempt, error = %e, "Transport failure, retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            result => return result,
        }
    }
}

/// Turn a non-success HTTP status into `GenerationError::Status`
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> GenerationResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = match body.char_indices().nth(300) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body,
    };
    Err(GenerationError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Google Gemini (requires API key)
    Gemini(GeminiBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Build the configured backend
    pub fn from_config(config: &GenerationConfig) -> Self {
        let policy = RetryPolicy::from_config(config);
        let host = config.host_or_default();

        match config.backend {
            GenerationBackendKind::Ollama => {
                AIClient::Ollama(OllamaBackend::with_policy(&host, &config.model, policy))
            }
            GenerationBackendKind::OpenAICompatible => {
                AIClient::OpenAICompatible(OpenAICompatibleBackend::with_policy(
                    &host,
                    &config.model,
                    config.api_key.clone(),
                    policy,
                ))
            }
            GenerationBackendKind::Gemini => AIClient::Gemini(GeminiBackend::with_policy(
                &host,
                &config.model,
                config.api_key.clone(),
                policy,
            )),
            GenerationBackendKind::Mock => AIClient::Mock(MockBackend::new()),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Backend name for display
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::Ollama(_) => "ollama",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Gemini(_) => "gemini",
            AIClient::Mock(_) => "mock",
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Gemini(b) => AIClient::Gemini(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        match self {
            AIClient::Ollama(b) => b.generate(prompt).await,
            AIClient::OpenAICompatible(b) => b.generate(prompt).await,
            AIClient::Gemini(b) => b.generate(prompt).await,
            AIClient::Mock(b) => b.generate(prompt).await,
        }
    }

    async fn generate_structured(&self, prompt: &str) -> GenerationResult<GeneratedInsight> {
        match self {
            AIClient::Ollama(b) => b.generate_structured(prompt).await,
            AIClient::OpenAICompatible(b) => b.generate_structured(prompt).await,
            AIClient::Gemini(b) => b.generate_structured(prompt).await,
            AIClient::Mock(b) => b.generate_structured(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Gemini(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Gemini(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Free-text generation through an optional client
///
/// No client configured counts as a missing credential.
pub async fn try_generate(ai: Option<&AIClient>, prompt: &str) -> GenerationResult<String> {
    match ai {
        Some(client) => client.generate(prompt).await,
        None => Err(GenerationError::MissingCredential {
            backend: "none".into(),
        }),
    }
}

/// Structured generation through an optional client
pub async fn try_generate_structured(
    ai: Option<&AIClient>,
    prompt: &str,
) -> GenerationResult<GeneratedInsight> {
    match ai {
        Some(client) => client.generate_structured(prompt).await,
        None => Err(GenerationError::MissingCredential {
            backend: "none".into(),
        }),
    }
}
