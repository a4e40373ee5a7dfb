//! Prompt Library for narrative generation
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/marketlens/prompts/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! All prompts are parsed when the library is built, so a broken override
//! file is reported at startup instead of halfway through a run.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CORRELATION_INSIGHT: &str = include_str!("../../../prompts/correlation_insight.md");
    pub const RATING_IMPACT_INSIGHT: &str =
        include_str!("../../../prompts/rating_impact_insight.md");
    pub const PRICING_INSIGHT: &str = include_str!("../../../prompts/pricing_insight.md");
    pub const MARKET_OPPORTUNITY_INSIGHT: &str =
        include_str!("../../../prompts/market_opportunity_insight.md");
    pub const FEATURE_RECOMMENDATION_INSIGHT: &str =
        include_str!("../../../prompts/feature_recommendation_insight.md");
    pub const GROUNDED_ANSWER: &str = include_str!("../../../prompts/grounded_answer.md");
    pub const EXECUTIVE_SUMMARY: &str = include_str!("../../../prompts/executive_summary.md");
    pub const ACTION_PLAN: &str = include_str!("../../../prompts/action_plan.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    CorrelationInsight,
    RatingImpactInsight,
    PricingInsight,
    MarketOpportunityInsight,
    FeatureRecommendationInsight,
    /// Retrieval-augmented answer to a user question
    GroundedAnswer,
    ExecutiveSummary,
    ActionPlan,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CorrelationInsight => "correlation_insight",
            Self::RatingImpactInsight => "rating_impact_insight",
            Self::PricingInsight => "pricing_insight",
            Self::MarketOpportunityInsight => "market_opportunity_insight",
            Self::FeatureRecommendationInsight => "feature_recommendation_insight",
            Self::GroundedAnswer => "grounded_answer",
            Self::ExecutiveSummary => "executive_summary",
            Self::ActionPlan => "action_plan",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[
            Self::CorrelationInsight,
            Self::RatingImpactInsight,
            Self::PricingInsight,
            Self::MarketOpportunityInsight,
            Self::FeatureRecommendationInsight,
            Self::GroundedAnswer,
            Self::ExecutiveSummary,
            Self::ActionPlan,
        ]
    }

    /// Look up an ID by its string form
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == name)
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::CorrelationInsight => defaults::CORRELATION_INSIGHT,
            Self::RatingImpactInsight => defaults::RATING_IMPACT_INSIGHT,
            Self::PricingInsight => defaults::PRICING_INSIGHT,
            Self::MarketOpportunityInsight => defaults::MARKET_OPPORTUNITY_INSIGHT,
            Self::FeatureRecommendationInsight => defaults::FEATURE_RECOMMENDATION_INSIGHT,
            Self::GroundedAnswer => defaults::GROUNDED_ANSWER,
            Self::ExecutiveSummary => defaults::EXECUTIVE_SUMMARY,
            Self::ActionPlan => defaults::ACTION_PLAN,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// What the prompt is used for (structured_insight, grounded_answer, report_synthesis)
    pub task: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the full prompt text sent to a backend
    ///
    /// System and user sections are joined by a blank line, headers dropped.
    /// A prompt without sections renders its whole body.
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        let rendered = match (self.system_section(), self.user_section()) {
            (Some(system), Some(user)) => format!(
                "{}\n\n{}",
                substitute(system, vars),
                substitute(user, vars)
            ),
            (None, Some(user)) => substitute(user, vars),
            _ => substitute(&self.content, vars),
        };

        // Checked against the template; values may legitimately contain braces
        let leftover: Vec<&str> = placeholder_regex()
            .captures_iter(&self.content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| !vars.contains_key(name))
            .collect();
        if !leftover.is_empty() {
            tracing::warn!(
                prompt = %self.metadata.id,
                placeholders = ?leftover,
                "Prompt rendered with unfilled placeholders"
            );
        }
        rendered
    }
}

/// Prompt library with every known prompt parsed up front
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
    prompts: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Load with the default override directory
    pub fn new() -> Result<Self> {
        Self::load(default_prompts_dir())
    }

    /// Load with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Load embedded prompts only
    pub fn embedded_only() -> Result<Self> {
        Self::load(None)
    }

    fn load(override_dir: Option<PathBuf>) -> Result<Self> {
        let mut prompts = HashMap::new();
        for &id in PromptId::all() {
            prompts.insert(id, load_prompt(override_dir.as_ref(), id)?);
        }
        Ok(Self {
            override_dir,
            prompts,
        })
    }

    /// Get a prompt by ID
    pub fn get(&self, id: PromptId) -> Result<&Prompt> {
        self.prompts
            .get(&id)
            .ok_or_else(|| Error::Prompt(format!("Prompt not loaded: {}", id.as_str())))
    }

    /// Render a prompt by ID
    pub fn render(&self, id: PromptId, vars: &HashMap<&str, String>) -> Result<String> {
        Ok(self.get(id)?.render(vars))
    }

    /// List all prompts with their override status
    pub fn list(&self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .filter_map(|id| self.prompts.get(id))
            .map(|prompt| PromptInfo {
                id: prompt.metadata.id.clone(),
                version: prompt.metadata.version,
                task: prompt.metadata.task.clone(),
                has_override: prompt.is_override,
                override_path: prompt.override_path.clone(),
            })
            .collect()
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

/// Load a prompt (checking override first, then default)
fn load_prompt(override_dir: Option<&PathBuf>, id: PromptId) -> Result<Prompt> {
    if let Some(override_dir) = override_dir {
        let override_path = override_dir.join(format!("{}.md", id.as_str()));
        if override_path.exists() {
            let content = fs::read_to_string(&override_path).map_err(|e| {
                Error::Prompt(format!(
                    "Failed to read prompt override {}: {}",
                    override_path.display(),
                    e
                ))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            tracing::debug!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(override_path),
            });
        }
    }

    let (metadata, body) = parse_prompt(id.default_content())?;
    Ok(Prompt {
        metadata,
        content: body,
        is_override: false,
        override_path: None,
    })
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Prompt identifier
    pub id: String,
    /// Version from metadata
    pub version: u32,
    pub task: String,
    /// Whether an override exists
    pub has_override: bool,
    /// Path to override file (if exists)
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    crate::config::data_dir().map(|d| d.join("prompts"))
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("valid regex"))
}

fn conditional_regex() -> &'static Regex {
    static CONDITIONAL: OnceLock<Regex> = OnceLock::new();
    CONDITIONAL.get_or_init(|| {
        Regex::new(r"(?s)\{\{#if\s+([A-Za-z_][A-Za-z0-9_]*)\s*\}\}(.*?)\{\{/if\}\}")
            .expect("valid regex")
    })
}

/// Resolve `{{#if var}}` blocks, then replace `{{var}}` markers
///
/// Both passes scan the template only; inserted values are never rescanned.
/// Unknown markers are left as they are.
fn substitute(template: &str, vars: &HashMap<&str, String>) -> String {
    let resolved = conditional_regex().replace_all(template, |caps: &Captures| {
        let keep = vars.get(&caps[1]).is_some_and(|v| !v.is_empty());
        if keep {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    placeholder_regex()
        .replace_all(&resolved, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::Prompt(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::Prompt("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Up to the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}
