//! Ollama backend implementation
//!
//! HTTP client for the Ollama `/api/generate` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{GenerationError, GenerationResult};
use super::{check_status, with_retry, AIBackend, RetryPolicy};

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default timeout and retry policy
    pub fn new(base_url: &str, model: &str) -> Self {
        Self::with_policy(base_url, model, RetryPolicy::default())
    }

    /// Create with an explicit timeout/retry policy
    pub fn with_policy(base_url: &str, model: &str, retry: RetryPolicy) -> Self {
        Self {
            http_client: retry.http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            retry,
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    async fn generate_once(&self, prompt: &str) -> GenerationResult<String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("Unexpected Ollama payload: {}", e))
        })?;
        debug!(chars = ollama_response.response.len(), "Ollama response");

        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        with_retry(&self.retry, || self.generate_once(prompt)).await
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockLlmServer, MockMode};

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = MockLlmServer::start().await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2");

        assert!(backend.health_check().await);
        let text = backend.generate("Say hello").await.unwrap();
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn test_generate_structured_against_mock_server() {
        let server = MockLlmServer::start().await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2");

        let insight = backend
            .generate_structured("Return JSON with keys \"insight_text\" and \"recommendations\".")
            .await
            .unwrap();
        assert!(!insight.insight_text.is_empty());
        assert!(!insight.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_status_error_not_retried() {
        let server = MockLlmServer::start_with(MockMode::Failing).await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2");

        let err = backend.generate("anything").await.unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 500, .. }));
        assert_eq!(server.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_structured_output() {
        let server = MockLlmServer::start_with(MockMode::Malformed).await;
        let backend = OllamaBackend::new(&server.url(), "llama3.2");

        let err = backend
            .generate_structured("Return JSON with keys \"insight_text\" and \"recommendations\".")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let policy = RetryPolicy {
            max_retries: 1,
            backoff: std::time::Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let backend = OllamaBackend::with_policy("http://127.0.0.1:1", "llama3.2", policy);

        assert!(!backend.health_check().await);
        let err = backend.generate("anything").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }
}
