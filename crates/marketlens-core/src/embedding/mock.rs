//! Mock embedder for testing
//!
//! Texts registered with `with_vector` get that exact vector; anything else
//! gets the zero vector. A failing mock returns a transport error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{EmbeddingBackend, EmbeddingError, EmbeddingResult};

#[derive(Debug, Clone, Default)]
pub struct MockEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    failing: bool,
    calls: Arc<AtomicUsize>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            ..Default::default()
        }
    }

    /// An embedder whose every call fails
    pub fn failing(dimension: usize) -> Self {
        Self {
            failing: true,
            ..Self::new(dimension)
        }
    }

    /// Register the vector returned for `text`
    ///
    /// The vector is resized to the mock's dimension.
    pub fn with_vector(mut self, text: impl Into<String>, mut vector: Vec<f32>) -> Self {
        vector.resize(self.dimension, 0.0);
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Number of `embed` calls made through this mock and its clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(EmbeddingError::Transport(
                "mock embedder configured to fail".into(),
            ));
        }
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_and_unknown_texts() {
        let mock = MockEmbedder::new(3).with_vector("known", vec![1.0]);
        let out = mock
            .embed(&["known".to_string(), "unknown".to_string()])
            .await
            .unwrap();

        assert_eq!(out[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(out[1], vec![0.0, 0.0, 0.0]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing() {
        let mock = MockEmbedder::failing(3);
        assert!(mock.embed(&["x".to_string()]).await.is_err());
    }
}
