//! Google Gemini backend implementation
//!
//! Calls `generateContent` on the Generative Language API. Requires an API
//! key; without one every call fails fast with `MissingCredential`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{GenerationError, GenerationResult};
use super::{check_status, with_retry, AIBackend, RetryPolicy};

#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl GeminiBackend {
    pub const DEFAULT_HOST: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self::with_policy(base_url, model, api_key, RetryPolicy::default())
    }

    pub fn with_policy(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http_client: retry.http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            retry,
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> GenerationResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GenerationError::MissingCredential {
                backend: "gemini".into(),
            })
    }

    async fn generate_once(&self, prompt: &str) -> GenerationResult<String> {
        let key = self.key()?;
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .http_client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", key)])
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("Unexpected Gemini payload: {}", e))
        })?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| GenerationError::MalformedResponse("No candidates in response".into()))?;
        debug!(chars = text.len(), "Gemini response");

        Ok(text)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[async_trait]
impl AIBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        with_retry(&self.retry, || self.generate_once(prompt)).await
    }

    async fn health_check(&self) -> bool {
        let Ok(key) = self.key() else {
            return false;
        };
        match self
            .http_client
            .get(format!("{}/v1beta/models/{}", self.base_url, self.model))
            .query(&[("key", key)])
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
