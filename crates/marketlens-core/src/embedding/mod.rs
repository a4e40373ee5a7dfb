//! Embedding backends for the semantic index
//!
//! - `HashingEmbedder`: offline feature hashing, the default
//! - `OllamaEmbedder`: `/api/embed` on an Ollama server
//! - `OpenAICompatibleEmbedder`: `/v1/embeddings`
//! - `MockEmbedder`: fixed vectors for tests
//!
//! All backends return one vector per input text, all of the same length;
//! `validate_batch` enforces this before vectors reach the index.

mod hashing;
mod mock;
mod remote;

pub use hashing::HashingEmbedder;
pub use mock::MockEmbedder;
pub use remote::{OllamaEmbedder, OpenAICompatibleEmbedder};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};

/// Embedding failure kinds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding transport error: {0}")]
    Transport(String),

    #[error("embedding backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;

/// Turns text into fixed-dimension vectors
///
/// Must be deterministic for identical input text.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, one vector per text, in input order
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Vector size, when known before the first call
    fn dimension(&self) -> Option<usize>;

    /// Model name (for logging)
    fn model(&self) -> &str;
}

/// Concrete embedding client enum
#[derive(Clone)]
pub enum EmbeddingClient {
    Hashing(HashingEmbedder),
    Ollama(OllamaEmbedder),
    OpenAICompatible(OpenAICompatibleEmbedder),
    Mock(MockEmbedder),
}

impl EmbeddingClient {
    /// Build the configured backend
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let host = config.host_or_default();
        match config.backend {
            EmbeddingBackendKind::Hashing => {
                EmbeddingClient::Hashing(HashingEmbedder::new(config.dimension))
            }
            EmbeddingBackendKind::Ollama => EmbeddingClient::Ollama(OllamaEmbedder::new(
                &host,
                &config.model,
                config.timeout(),
            )),
            EmbeddingBackendKind::OpenAICompatible => {
                EmbeddingClient::OpenAICompatible(OpenAICompatibleEmbedder::new(
                    &host,
                    &config.model,
                    config.api_key.clone(),
                    config.timeout(),
                ))
            }
            EmbeddingBackendKind::Mock => EmbeddingClient::Mock(MockEmbedder::new(config.dimension)),
        }
    }

    /// Offline hashing embedder with the given dimension
    pub fn hashing(dimension: usize) -> Self {
        EmbeddingClient::Hashing(HashingEmbedder::new(dimension))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            EmbeddingClient::Hashing(_) => "hashing",
            EmbeddingClient::Ollama(_) => "ollama",
            EmbeddingClient::OpenAICompatible(_) => "openai_compatible",
            EmbeddingClient::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl EmbeddingBackend for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let vectors = match self {
            EmbeddingClient::Hashing(b) => b.embed(texts).await,
            EmbeddingClient::Ollama(b) => b.embed(texts).await,
            EmbeddingClient::OpenAICompatible(b) => b.embed(texts).await,
            EmbeddingClient::Mock(b) => b.embed(texts).await,
        }?;
        validate_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }

    fn dimension(&self) -> Option<usize> {
        match self {
            EmbeddingClient::Hashing(b) => b.dimension(),
            EmbeddingClient::Ollama(b) => b.dimension(),
            EmbeddingClient::OpenAICompatible(b) => b.dimension(),
            EmbeddingClient::Mock(b) => b.dimension(),
        }
    }

    fn model(&self) -> &str {
        match self {
            EmbeddingClient::Hashing(b) => b.model(),
            EmbeddingClient::Ollama(b) => b.model(),
            EmbeddingClient::OpenAICompatible(b) => b.model(),
            EmbeddingClient::Mock(b) => b.model(),
        }
    }
}

/// Check count, equal non-zero length and finiteness of a batch
pub fn validate_batch(expected_count: usize, vectors: &[Vec<f32>]) -> EmbeddingResult<()> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::MalformedResponse(format!(
            "expected {} vectors, got {}",
            expected_count,
            vectors.len()
        )));
    }
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let dim = first.len();
    if dim == 0 {
        return Err(EmbeddingError::MalformedResponse("empty vector".into()));
    }
    for v in vectors {
        if v.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::MalformedResponse(
                "vector contains non-finite values".into(),
            ));
        }
    }
    Ok(())
}
