//! Test utilities for marketlens-core
//!
//! This module provides a mock Ollama-style server (`/api/tags`,
//! `/api/generate`, `/api/embed`) for backend and integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::embedding::HashingEmbedder;

/// Vector size served by `/api/embed`
pub const MOCK_EMBED_DIMENSION: usize = 32;

/// How the mock server answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Well-formed answers
    Healthy,
    /// Every generate/embed call returns HTTP 500
    Failing,
    /// Generate returns text that is not JSON
    Malformed,
}

#[derive(Clone)]
struct ServerState {
    mode: MockMode,
    generate_calls: Arc<AtomicUsize>,
    embedder: HashingEmbedder,
}

/// Mock LLM server for testing
pub struct MockLlmServer {
    addr: SocketAddr,
    generate_calls: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start a healthy mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(MockMode::Healthy).await
    }

    /// Start the mock server in the given mode
    pub async fn start_with(mode: MockMode) -> Self {
        let generate_calls = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            mode,
            generate_calls: Arc::clone(&generate_calls),
            embedder: HashingEmbedder::new(MOCK_EMBED_DIMENSION),
        };

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .route("/api/embed", post(handle_embed))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            generate_calls,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of `/api/generate` requests received
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            size: 2_000_000_000,
        }],
    })
}

async fn handle_generate(
    State(state): State<ServerState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);

    let response = match state.mode {
        MockMode::Failing => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response()
        }
        MockMode::Malformed => "I think the data shows growth, but no JSON here.".to_string(),
        // Structured prompts (prompts/*_insight.md) ask for these keys
        MockMode::Healthy if request.prompt.contains("insight_text") => serde_json::json!({
            "insight_text": "Mock server insight about the supplied market data.",
            "recommendations": ["Validate the finding with a second data source."],
        })
        .to_string(),
        MockMode::Healthy => "Mock server answer based on the provided context.".to_string(),
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
    .into_response()
}

async fn handle_embed(
    State(state): State<ServerState>,
    Json(request): Json<EmbedRequest>,
) -> Response {
    if state.mode == MockMode::Failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "embedding model missing").into_response();
    }
    let embeddings = request
        .input
        .iter()
        .map(|text| state.embedder.embed_text(text))
        .collect();
    Json(EmbedResponse {
        model: request.model,
        embeddings,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EmbedResponse {
    model: String,
    embeddings: Vec<Vec<f32>>,
}
