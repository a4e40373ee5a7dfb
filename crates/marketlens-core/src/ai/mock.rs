//! Mock backend for testing
//!
//! Deterministic responses without a running model server. Structured
//! prompts (those asking for `insight_text`) get a JSON object back; other
//! prompts get a short free-text answer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::types::{GenerationError, GenerationResult};
use super::AIBackend;

/// How the mock responds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    /// Well-formed responses
    #[default]
    Healthy,
    /// Every call fails with a transport error
    Unavailable,
    /// Calls succeed but return text that is not the requested JSON shape
    Malformed,
}

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Create a mock whose calls all fail
    pub fn unavailable() -> Self {
        Self {
            healthy: false,
            behavior: MockBehavior::Unavailable,
            ..Default::default()
        }
    }

    /// Create a mock that returns unparseable structured output
    pub fn malformed() -> Self {
        Self {
            healthy: true,
            behavior: MockBehavior::Malformed,
            ..Default::default()
        }
    }

    /// Create a new instance with a different model (no-op for mock)
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }

    /// Number of `generate` calls made through this mock and its clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Unavailable => {
                Err(GenerationError::Transport("mock backend unavailable".into()))
            }
            MockBehavior::Malformed => Ok("Sure! Here are my thoughts, no JSON today.".into()),
            MockBehavior::Healthy => {
                if prompt.contains("insight_text") {
                    let response = serde_json::json!({
                        "insight_text": format!("Generated insight from {} characters of data.", prompt.len()),
                        "recommendations": ["Act on the generated finding.", "Track the metric monthly."],
                    });
                    Ok(response.to_string())
                } else {
                    Ok(format!("Mock response to a {}-character prompt.", prompt.len()))
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_structured_prompt_parses() {
        let mock = MockBackend::new();
        let insight = mock
            .generate_structured("Return keys \"insight_text\" and \"recommendations\"")
            .await
            .unwrap();
        assert!(insight.insight_text.starts_with("Generated insight"));
        assert_eq!(insight.recommendations.len(), 2);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_and_malformed() {
        let down = MockBackend::unavailable();
        assert!(!down.health_check().await);
        assert!(matches!(
            down.generate("x").await,
            Err(GenerationError::Transport(_))
        ));

        let bad = MockBackend::malformed();
        assert!(matches!(
            bad.generate_structured("insight_text").await,
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_call_counter() {
        let mock = MockBackend::new();
        let clone = mock.clone();
        clone.generate("a").await.unwrap();
        mock.generate("b").await.unwrap();
        assert_eq!(mock.call_count(), 2);
    }
}
