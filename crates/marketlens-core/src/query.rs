//! Retrieval-augmented query engine
//!
//! Built once per process. Construction embeds the knowledge base; a failed
//! or empty build leaves the engine permanently uninitialized, and every
//! answer then says so instead of guessing. Once ready the engine holds no
//! per-query state, so `answer` can be called concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ai::{try_generate, AIClient};
use crate::embedding::{EmbeddingBackend, EmbeddingClient};
use crate::error::{Error, Result};
use crate::index::{ScoredRecord, SemanticIndex};
use crate::knowledge::KnowledgeBase;
use crate::prompts::{PromptId, PromptLibrary};

/// Answer when the engine failed to initialize
pub const NOT_READY: &str =
    "The query engine is not ready. Generate a knowledge base first and check the embedding backend.";
/// Answer when retrieval finds nothing
pub const NO_RELEVANT_INSIGHT: &str =
    "I could not find any specific insights related to your query. Please try rephrasing your question.";
/// Answer when the question could not be embedded
pub const RETRIEVAL_UNAVAILABLE: &str =
    "There was an issue searching the knowledge base. Please check the embedding backend and try again.";
/// Answer when generation fails
pub const GENERATION_UNAVAILABLE: &str =
    "There was an issue generating an AI response. Please check your API key and try again.";

enum EngineState {
    Ready(SemanticIndex),
    Uninitialized { reason: String },
}

pub struct QueryEngine {
    state: EngineState,
    embedder: EmbeddingClient,
    ai: Option<AIClient>,
    prompts: Arc<PromptLibrary>,
    top_k: usize,
}

impl QueryEngine {
    /// Build the engine; never fails, check `is_ready` afterwards
    pub async fn build(
        kb: &KnowledgeBase,
        embedder: EmbeddingClient,
        ai: Option<AIClient>,
        prompts: Arc<PromptLibrary>,
        top_k: usize,
    ) -> Self {
        let state = if kb.is_empty() {
            warn!("Knowledge base is empty, query engine not ready");
            EngineState::Uninitialized {
                reason: "knowledge base is empty".into(),
            }
        } else {
            match SemanticIndex::build(kb, &embedder).await {
                Ok(index) => {
                    info!(records = index.len(), "Query engine ready");
                    EngineState::Ready(index)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to build semantic index, query engine not ready");
                    EngineState::Uninitialized {
                        reason: e.to_string(),
                    }
                }
            }
        };

        Self {
            state,
            embedder,
            ai,
            prompts,
            top_k: top_k.max(1),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    /// Why the engine is not ready, if it isn't
    pub fn not_ready_reason(&self) -> Option<&str> {
        match &self.state {
            EngineState::Ready(_) => None,
            EngineState::Uninitialized { reason } => Some(reason),
        }
    }

    /// Number of indexed records (0 when not ready)
    pub fn indexed_records(&self) -> usize {
        match &self.state {
            EngineState::Ready(index) => index.len(),
            EngineState::Uninitialized { .. } => 0,
        }
    }

    /// Top-k records for a question, best first
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredRecord>> {
        let index = match &self.state {
            EngineState::Ready(index) => index,
            EngineState::Uninitialized { reason } => return Err(Error::NotReady(reason.clone())),
        };

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors.pop().unwrap_or_default();
        let hits = index.search(&query_vector, self.top_k)?;
        debug!(
            hits = hits.len(),
            best = hits.first().map(|h| h.score),
            "Retrieved insights"
        );
        Ok(hits)
    }

    /// Answer a question from retrieved insights only
    ///
    /// Always returns text; failures map to the fixed messages above.
    pub async fn answer(&self, query: &str) -> String {
        if !self.is_ready() {
            return NOT_READY.to_string();
        }
        if query.trim().is_empty() {
            return NO_RELEVANT_INSIGHT.to_string();
        }

        let hits = match self.retrieve(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Retrieval failed");
                return RETRIEVAL_UNAVAILABLE.to_string();
            }
        };
        if hits.is_empty() {
            return NO_RELEVANT_INSIGHT.to_string();
        }

        let vars = HashMap::from([
            ("context", build_context(&hits)),
            ("question", query.to_string()),
        ]);
        let prompt = match self.prompts.render(PromptId::GroundedAnswer, &vars) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Answer prompt unavailable");
                return GENERATION_UNAVAILABLE.to_string();
            }
        };

        match try_generate(self.ai.as_ref(), &prompt).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!("Generation returned an empty answer");
                GENERATION_UNAVAILABLE.to_string()
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Answer generation failed");
                GENERATION_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Context block: each record's narrative and recommendations, in rank order
pub fn build_context(hits: &[ScoredRecord]) -> String {
    let mut context = String::new();
    for hit in hits {
        context.push_str(&format!("- Insight: {}\n", hit.record.insight_text));
        if !hit.record.recommendations.is_empty() {
            context.push_str(&format!(
                "  - Recommendations: {}\n\n",
                hit.record.recommendations.join(" ")
            ));
        }
    }
    context
}
