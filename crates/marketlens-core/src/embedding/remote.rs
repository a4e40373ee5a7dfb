//! HTTP embedding backends
//!
//! - Ollama: `POST /api/embed` with `{model, input}` returning `{embeddings}`
//! - OpenAI-compatible: `POST /v1/embeddings` returning `{data: [{index, embedding}]}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingBackend, EmbeddingError, EmbeddingResult};

fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
        Client::new()
    })
}

async fn check_status(response: reqwest::Response) -> EmbeddingResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(300)
        .collect();
    Err(EmbeddingError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Ollama embedding backend
#[derive(Clone)]
pub struct OllamaEmbedder {
    http_client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http_client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let response = self
            .http_client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: OllamaEmbedResponse = response.json().await.map_err(|e| {
            EmbeddingError::MalformedResponse(format!("Unexpected Ollama payload: {}", e))
        })?;
        debug!(count = parsed.embeddings.len(), "Ollama embeddings");
        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible embedding backend
#[derive(Clone)]
pub struct OpenAICompatibleEmbedder {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAICompatibleEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http_client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAICompatibleEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let mut request = self
            .http_client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = check_status(request.send().await?).await?;

        let mut parsed: OpenAIEmbedResponse = response.json().await.map_err(|e| {
            EmbeddingError::MalformedResponse(format!("Unexpected embeddings payload: {}", e))
        })?;
        parsed.data.sort_by_key(|d| d.index);
        debug!(count = parsed.data.len(), "OpenAI-compatible embeddings");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockLlmServer, MockMode};

    #[tokio::test]
    async fn test_ollama_embed_against_mock_server() {
        let server = MockLlmServer::start().await;
        let embedder = OllamaEmbedder::new(&server.url(), "all-minilm", Duration::from_secs(5));

        let texts = vec!["first text".to_string(), "second text".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), vectors[1].len());

        let again = embedder.embed(&texts[..1]).await.unwrap();
        assert_eq!(again[0], vectors[0]);
    }

    #[tokio::test]
    async fn test_ollama_embed_status_error() {
        let server = MockLlmServer::start_with(MockMode::Failing).await;
        let embedder = OllamaEmbedder::new(&server.url(), "all-minilm", Duration::from_secs(5));

        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "m", Duration::from_secs(2));
        let err = embedder.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Transport(_)));
    }

    #[test]
    fn test_openai_response_shape() {
        let json = r#"{"data":[{"index":1,"embedding":[0.5,0.5]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let mut parsed: OpenAIEmbedResponse = serde_json::from_str(json).unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0, 0.0]);
    }
}
