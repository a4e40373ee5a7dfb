//! Configuration for marketlens
//!
//! Config is resolved once, at startup:
//! 1. Embedded defaults (compiled into binary)
//! 2. Override file: explicit path, else ~/.local/share/marketlens/config.toml
//! 3. Environment variables (`MARKETLENS_*`, `GEMINI_API_KEY`)
//!
//! The resulting `Config` is passed to backend constructors explicitly;
//! nothing reads the environment after `Config::load` returns.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisThresholds;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/marketlens.toml");

/// Text-generation backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationBackendKind {
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai_compatible")]
    OpenAICompatible,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "mock")]
    Mock,
}

impl GenerationBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAICompatible => "openai_compatible",
            Self::Gemini => "gemini",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for GenerationBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                Ok(Self::OpenAICompatible)
            }
            "gemini" | "google" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!("Unknown generation backend: {}", other))),
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingBackendKind {
    #[serde(rename = "hashing")]
    Hashing,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai_compatible")]
    OpenAICompatible,
    #[serde(rename = "mock")]
    Mock,
}

impl EmbeddingBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hashing => "hashing",
            Self::Ollama => "ollama",
            Self::OpenAICompatible => "openai_compatible",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for EmbeddingBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "local" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai" => Ok(Self::OpenAICompatible),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!("Unknown embedding backend: {}", other))),
        }
    }
}

/// Text-generation gateway settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: GenerationBackendKind,
    /// Server URL; `None` selects the backend's usual default
    pub host: Option<String>,
    pub model: String,
    /// Never written back out; only read from the environment or override file
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Retries on transport failure only
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl GenerationConfig {
    /// Configured host, or the conventional default for the backend
    pub fn host_or_default(&self) -> String {
        self.host.clone().unwrap_or_else(|| {
            match self.backend {
                GenerationBackendKind::Ollama | GenerationBackendKind::Mock => {
                    "http://localhost:11434"
                }
                GenerationBackendKind::OpenAICompatible => "http://localhost:8000",
                GenerationBackendKind::Gemini => "https://generativelanguage.googleapis.com",
            }
            .to_string()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackendKind::Ollama,
            host: None,
            model: "llama3.2".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

/// Embedding backend settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    /// Server URL; `None` selects the backend's usual default
    pub host: Option<String>,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Vector size for the hashing embedder
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Configured host, or the conventional default for the backend
    pub fn host_or_default(&self) -> String {
        self.host.clone().unwrap_or_else(|| {
            match self.backend {
                EmbeddingBackendKind::OpenAICompatible => "http://localhost:8000",
                _ => "http://localhost:11434",
            }
            .to_string()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::Hashing,
            host: None,
            model: "all-minilm".to_string(),
            api_key: None,
            dimension: 384,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dimension", &self.dimension)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormattingConfig {
    /// Findings narrated at once
    pub concurrency: usize,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Records retrieved per question
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Records fed to the executive summary prompt
    pub summary_seed_size: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            summary_seed_size: 10,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub analysis: AnalysisThresholds,
    pub formatting: FormattingConfig,
    pub query: QueryConfig,
    pub report: ReportConfig,
}

impl Config {
    /// Load config: override file (or embedded default), then environment
    ///
    /// An explicit path that does not exist is an error; the default
    /// override location is optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::embedded()?,
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse TOML; missing sections and keys take their defaults
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("MARKETLENS_AI_BACKEND") {
            self.generation.backend = backend.parse()?;
        }
        if let Some(host) = get("MARKETLENS_AI_HOST") {
            self.generation.host = Some(host);
        }
        if let Some(model) = get("MARKETLENS_AI_MODEL") {
            self.generation.model = model;
        }
        if let Some(key) = get("MARKETLENS_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(backend) = get("MARKETLENS_EMBEDDING_BACKEND") {
            self.embedding.backend = backend.parse()?;
        }
        if let Some(host) = get("MARKETLENS_EMBEDDING_HOST") {
            self.embedding.host = Some(host);
        }
        if let Some(model) = get("MARKETLENS_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(key) = get("MARKETLENS_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".into()));
        }
        if self.query.top_k == 0 {
            return Err(Error::Config("query.top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.analysis.top_quantile) {
            return Err(Error::Config(
                "analysis.top_quantile must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

/// Base data directory (~/.local/share/marketlens on Linux)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("marketlens"))
}

/// Default override config path
pub fn default_config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_embedded_matches_defaults() {
        let embedded = Config::embedded().unwrap();
        let defaults = Config::default();

        assert_eq!(embedded.generation.backend, defaults.generation.backend);
        assert_eq!(embedded.generation.timeout_secs, 60);
        assert_eq!(embedded.generation.max_retries, 1);
        assert_eq!(embedded.embedding.backend, EmbeddingBackendKind::Hashing);
        assert_eq!(embedded.embedding.dimension, defaults.embedding.dimension);
        assert_eq!(embedded.analysis, AnalysisThresholds::default());
        assert_eq!(embedded.query.top_k, 5);
        assert_eq!(embedded.formatting.concurrency, 4);
        assert_eq!(embedded.report.summary_seed_size, 10);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse(
            r#"
[generation]
backend = "gemini"
model = "gemini-2.0-flash"

[query]
top_k = 3
"#,
        )
        .unwrap();

        assert_eq!(config.generation.backend, GenerationBackendKind::Gemini);
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert_eq!(config.generation.timeout_secs, 60);
        assert_eq!(
            config.generation.host_or_default(),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(config.query.top_k, 3);
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::Hashing);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MARKETLENS_AI_BACKEND", "openai"),
            ("MARKETLENS_AI_HOST", "http://10.0.0.2:8000"),
            ("GEMINI_API_KEY", "secret-key"),
            ("MARKETLENS_EMBEDDING_BACKEND", "ollama"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(
            config.generation.backend,
            GenerationBackendKind::OpenAICompatible
        );
        assert_eq!(config.generation.host_or_default(), "http://10.0.0.2:8000");
        assert_eq!(config.generation.api_key.as_deref(), Some("secret-key"));
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::Ollama);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|k| (k == "MARKETLENS_AI_BACKEND").then(|| "nope".into()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = Config::default();
        config.generation.api_key = Some("super-secret".into());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::parse("[query]\ntop_k = 0\n").is_err());
        assert!(Config::parse("[embedding]\ndimension = 0\n").is_err());
    }

    #[test]
    fn test_missing_explicit_path() {
        let result = Config::load(Some(Path::new("/nonexistent/marketlens.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
