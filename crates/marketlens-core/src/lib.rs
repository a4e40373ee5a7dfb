//! Marketlens Core Library
//!
//! App-market insight engine:
//! - Dataset loading from the merged market CSV
//! - Statistical analyzers producing typed findings
//! - Pluggable text-generation backends (Ollama, OpenAI-compatible, Gemini)
//! - Narrative formatter with deterministic template fallback
//! - Knowledge base artifact
//! - Embedding backends and a semantic index
//! - Retrieval-augmented query engine
//! - Executive report synthesis
//! - Prompt library for customizable prompts

pub mod ai;
pub mod analysis;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod formatter;
pub mod index;
pub mod knowledge;
pub mod prompts;
pub mod query;
pub mod report;

/// Test utilities including mock LLM server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, GeneratedInsight, GeminiBackend, GenerationError, GenerationResult,
    MockBackend, OllamaBackend, OpenAICompatibleBackend, RetryPolicy,
};
pub use analysis::{AnalysisEngine, AnalysisKind, AnalysisThresholds, Analyzer, RawFinding};
pub use config::{Config, EmbeddingBackendKind, GenerationBackendKind};
pub use dataset::{AppRecord, Column, Dataset};
pub use embedding::{
    EmbeddingBackend, EmbeddingClient, EmbeddingError, HashingEmbedder, MockEmbedder,
};
pub use error::{Error, Result};
pub use formatter::{InsightTemplate, NarrativeFormatter};
pub use index::{ScoredRecord, SemanticIndex};
pub use knowledge::{
    Actionability, BusinessImpact, InsightCategory, KnowledgeBase, KnowledgeRecord,
    NarrativeSource,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use query::QueryEngine;
pub use report::{Report, ReportSynthesizer};
