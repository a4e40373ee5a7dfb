//! Knowledge records and the knowledge base artifact
//!
//! The artifact is a JSON object with a single `insights` key holding the
//! records in generation order. It is written once by `generate` and read
//! back verbatim by the index, query engine and report synthesizer.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Knowledge record category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    SuccessFactors,
    PricingStrategyOptimization,
    MarketOpportunityAssessment,
    FeatureAndCategoryRecommendations,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessFactors => "success_factors",
            Self::PricingStrategyOptimization => "pricing_strategy_optimization",
            Self::MarketOpportunityAssessment => "market_opportunity_assessment",
            Self::FeatureAndCategoryRecommendations => "feature_and_category_recommendations",
        }
    }
}

impl std::fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessImpact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actionability {
    Immediate,
    Strategic,
}

/// Where a record's narrative text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeSource {
    /// Text-generation backend
    Generated,
    /// Deterministic fallback template
    Template,
}

/// One formatted, narrated finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Sequential id, `INSIGHT_001` onwards
    #[serde(rename = "insight_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: InsightCategory,
    /// Market category a per-category finding refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_category: Option<String>,
    pub insight_text: String,
    pub supporting_data: BTreeMap<String, serde_json::Value>,
    pub confidence_score: f64,
    pub business_impact: BusinessImpact,
    pub actionability: Actionability,
    pub recommendations: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_source: Option<NarrativeSource>,
}

impl KnowledgeRecord {
    /// Zero-padded id for a 1-based sequence number
    pub fn id_for(sequence: usize) -> String {
        format!("INSIGHT_{:03}", sequence)
    }

    /// Text embedded for semantic search: narrative followed by tags
    pub fn embedding_input(&self) -> String {
        if self.tags.is_empty() {
            self.insight_text.clone()
        } else {
            format!("{} {}", self.insight_text, self.tags.join(" "))
        }
    }

    /// Whether the narrative came from the fallback template
    pub fn is_degraded(&self) -> bool {
        self.narrative_source == Some(NarrativeSource::Template)
    }

    /// String-valued supporting metric, if present
    pub fn supporting_str(&self, key: &str) -> Option<&str> {
        self.supporting_data.get(key).and_then(|v| v.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::KnowledgeBase("record with empty insight_id".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(Error::KnowledgeBase(format!(
                "{}: confidence_score {} outside [0, 1]",
                self.id, self.confidence_score
            )));
        }
        Ok(())
    }
}

/// Deduplicate tags, keeping first occurrence order
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Ordered collection of knowledge records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub insights: Vec<KnowledgeRecord>,
}

impl KnowledgeBase {
    pub fn new(insights: Vec<KnowledgeRecord>) -> Self {
        Self { insights }
    }

    /// Read and validate a knowledge base file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::KnowledgeBase(format!(
                "Knowledge base not found at {}. Run `marketlens generate` first.",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let kb: KnowledgeBase = serde_json::from_str(&content).map_err(|e| {
            Error::KnowledgeBase(format!("Corrupt knowledge base {}: {}", path.display(), e))
        })?;
        let mut seen = HashSet::new();
        for record in &kb.insights {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(Error::KnowledgeBase(format!(
                    "Duplicate insight_id {} in {}",
                    record.id,
                    path.display()
                )));
            }
        }
        debug!(path = %path.display(), records = kb.len(), "Loaded knowledge base");
        Ok(kb)
    }

    /// Write atomically: temp file in the target directory, then rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        info!(path = %path.display(), records = self.len(), "Saved knowledge base");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.insights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.insights
    }

    /// Records whose narrative fell back to the template
    pub fn degraded_count(&self) -> usize {
        self.insights.iter().filter(|r| r.is_degraded()).count()
    }

    /// Top `n` records by descending confidence, ties in insertion order
    ///
    /// `None` ranks across all categories.
    pub fn top_by_confidence(
        &self,
        category: Option<InsightCategory>,
        n: usize,
    ) -> Vec<&KnowledgeRecord> {
        let mut selected: Vec<&KnowledgeRecord> = self
            .insights
            .iter()
            .filter(|r| category.map_or(true, |c| r.category == c))
            .collect();
        // sort_by is stable
        selected.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
        selected.truncate(n);
        selected
    }

    /// Record counts per category, in category order
    pub fn counts_by_category(&self) -> BTreeMap<InsightCategory, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.insights {
            *counts.entry(record.category).or_insert(0) += 1;
        }
        counts
    }
}
