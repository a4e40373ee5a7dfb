//! Shared types for text-generation backends

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a generation call produced no usable output
///
/// Callers treat every kind the same way (fall back to a template), but the
/// kind is kept so logs and run summaries can say what went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("no API credential configured for {backend}")]
    MissingCredential { backend: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Only transport failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Short label for logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
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

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// Structured narrative returned by `generate_structured`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedInsight {
    pub insight_text: String,
    pub recommendations: Vec<String>,
}
