//! Executive report synthesis
//!
//! Ranks knowledge records per category and renders a Markdown report. The
//! executive summary and action plan are generated; each falls back to a
//! fixed placeholder when generation fails.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::ai::{try_generate, AIClient};
use crate::error::Result;
use crate::knowledge::{InsightCategory, KnowledgeBase, KnowledgeRecord};
use crate::prompts::{PromptId, PromptLibrary};

/// Report text for an empty knowledge base
pub const EMPTY_REPORT: &str = "No insights were provided to generate a report.";

pub const SUMMARY_FALLBACK: &str = "*(AI summary generation failed. Please check API key. This is a placeholder.)*\n\nThe analysis has identified several key drivers of app success, including the strong correlation between user reviews and downloads. Strategic pricing and identifying underserved market categories are also highlighted as significant opportunities.";

pub const ACTION_PLAN_FALLBACK: &str = "*(AI action plan generation failed. Please check API key.)*";

const SUCCESS_FACTOR_COUNT: usize = 2;
const TABLE_MARKET_COUNT: usize = 5;
const TABLE_DETAIL_COUNT: usize = 20;
const TABLE_ROWS: usize = 5;
const PRICING_COUNT: usize = 5;

/// A rendered report
#[derive(Debug, Clone)]
pub struct Report {
    pub markdown: String,
    /// False when the summary placeholder was used
    pub summary_generated: bool,
    /// False when the action plan placeholder was used
    pub action_plan_generated: bool,
}

impl Report {
    /// Write to `<dir>/App_Success_Report_<YYYYmmdd_HHMMSS>.md`
    pub fn write_to_dir(&self, dir: &Path, at: DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(report_file_name(at));
        fs::write(&path, &self.markdown)?;
        info!(path = %path.display(), "Wrote report");
        Ok(path)
    }
}

pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("App_Success_Report_{}.md", at.format("%Y%m%d_%H%M%S"))
}

pub struct ReportSynthesizer {
    ai: Option<AIClient>,
    prompts: Arc<PromptLibrary>,
    summary_seed_size: usize,
}

impl ReportSynthesizer {
    pub fn new(ai: Option<AIClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            ai,
            prompts,
            summary_seed_size: 10,
        }
    }

    /// Records fed to the executive summary prompt
    pub fn with_summary_seed_size(mut self, n: usize) -> Self {
        self.summary_seed_size = n.max(1);
        self
    }

    pub async fn synthesize(&self, kb: &KnowledgeBase) -> Report {
        self.synthesize_at(kb, Local::now()).await
    }

    /// Render with an explicit generation time
    pub async fn synthesize_at(&self, kb: &KnowledgeBase, at: DateTime<Local>) -> Report {
        if kb.is_empty() {
            return Report {
                markdown: EMPTY_REPORT.to_string(),
                summary_generated: false,
                action_plan_generated: false,
            };
        }

        let (summary, summary_generated) = self.executive_summary(kb).await;
        let success_factors = success_factors_section(kb);
        let category_table = category_performance_table(kb);
        let pricing = pricing_section(kb);
        let (action_plan, action_plan_generated) = self.action_plan(kb).await;

        let markdown = format!(
            "# App Store Success Intelligence Report\n\n\
             **Generated on:** {generated}\n\
             **Analysis Coverage:** Approx. {coverage} apps across Google Play Store\n\
             ---\n\
             ## 🎯 Executive Summary\n\
             {summary}\n\n\
             ## 📈 Key Market Insights\n\
             {success_factors}\n\
             {category_table}\n\n\
             ## 💰 Pricing Strategy Recommendations\n\
             {pricing}\n\n\
             ## 🚀 Action Plan\n\
             {action_plan}\n\n\
             ---\n\
             *Report generated by AI-Powered App Market Intelligence System*\n",
            generated = at.format("%Y-%m-%d %H:%M:%S"),
            coverage = coverage(kb),
        );

        Report {
            markdown,
            summary_generated,
            action_plan_generated,
        }
    }

    async fn executive_summary(&self, kb: &KnowledgeBase) -> (String, bool) {
        let findings: String = kb
            .top_by_confidence(None, self.summary_seed_size)
            .iter()
            .map(|r| format!("- {}\n", r.insight_text))
            .collect();
        self.generate_or(
            PromptId::ExecutiveSummary,
            HashMap::from([("findings", findings)]),
            SUMMARY_FALLBACK,
        )
        .await
    }

    async fn action_plan(&self, kb: &KnowledgeBase) -> (String, bool) {
        let recommendations = unique_recommendations(kb).join("\n");
        self.generate_or(
            PromptId::ActionPlan,
            HashMap::from([("recommendations", recommendations)]),
            ACTION_PLAN_FALLBACK,
        )
        .await
    }

    async fn generate_or(
        &self,
        id: PromptId,
        vars: HashMap<&str, String>,
        fallback: &str,
    ) -> (String, bool) {
        let prompt = match self.prompts.render(id, &vars) {
            Ok(p) => p,
            Err(e) => {
                warn!(prompt = id.as_str(), error = %e, "Prompt unavailable, using placeholder");
                return (fallback.to_string(), false);
            }
        };
        match try_generate(self.ai.as_ref(), &prompt).await {
            Ok(text) if !text.trim().is_empty() => (text.trim().to_string(), true),
            Ok(_) => {
                warn!(prompt = id.as_str(), "Empty generation, using placeholder");
                (fallback.to_string(), false)
            }
            Err(e) => {
                warn!(prompt = id.as_str(), kind = e.kind(), error = %e, "Generation failed, using placeholder");
                (fallback.to_string(), false)
            }
        }
    }
}

/// Sample size of the first record, as the report's coverage figure
fn coverage(kb: &KnowledgeBase) -> String {
    match kb.records().first().and_then(|r| r.supporting_data.get("sample_size")) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "N/A".to_string(),
    }
}

/// Every record's recommendations, deduplicated in first-seen order
pub fn unique_recommendations(kb: &KnowledgeBase) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    kb.records()
        .iter()
        .flat_map(|r| r.recommendations.iter())
        .map(String::as_str)
        .filter(|rec| seen.insert(*rec))
        .collect()
}

fn success_factors_section(kb: &KnowledgeBase) -> String {
    let top = kb.top_by_confidence(Some(InsightCategory::SuccessFactors), SUCCESS_FACTOR_COUNT);
    if top.is_empty() {
        return String::new();
    }

    let mut section = String::from("### Success Factor Rankings\n");
    for (i, record) in top.iter().enumerate() {
        let title = record
            .tags
            .get(1)
            .map(|t| title_case(&t.replace('_', " ")))
            .unwrap_or_else(|| "Key Finding".to_string());
        let impact = (record.confidence_score * 10.0).floor() as i64;
        section.push_str(&format!(
            "{}. **{}** - Impact Score: {}/10\n> {}\n\n",
            i + 1,
            title,
            impact,
            record.insight_text
        ));
    }
    section
}

/// Per-category records keyed by market category; a later record wins
fn by_app_category(records: Vec<&KnowledgeRecord>) -> BTreeMap<&str, &KnowledgeRecord> {
    records
        .into_iter()
        .filter_map(|r| r.app_category.as_deref().map(|c| (c, r)))
        .collect()
}

fn category_performance_table(kb: &KnowledgeBase) -> String {
    let market = by_app_category(kb.top_by_confidence(
        Some(InsightCategory::MarketOpportunityAssessment),
        TABLE_MARKET_COUNT,
    ));
    let pricing = by_app_category(kb.top_by_confidence(
        Some(InsightCategory::PricingStrategyOptimization),
        TABLE_DETAIL_COUNT,
    ));
    let features = by_app_category(kb.top_by_confidence(
        Some(InsightCategory::FeatureAndCategoryRecommendations),
        TABLE_DETAIL_COUNT,
    ));

    let categories: BTreeSet<&str> = market
        .keys()
        .chain(pricing.keys())
        .chain(features.keys())
        .copied()
        .collect();

    let mut table = String::from("### Category Performance Analysis\n");
    table.push_str("| Category | Opportunity Score | Optimal Price | Top Feature Recommendation |\n");
    table.push_str("|----------|-------------------|---------------|----------------------------|\n");

    for category in categories.into_iter().take(TABLE_ROWS) {
        let score = market
            .get(category)
            .and_then(|r| r.supporting_data.get("opportunity_score"))
            .and_then(|v| v.as_f64())
            .map(|s| format!("{:.0}", s))
            .unwrap_or_else(|| "N/A".to_string());
        let price = pricing
            .get(category)
            .and_then(|r| r.supporting_str("optimal_price_range"))
            .unwrap_or("N/A (Free focus)");
        let feature = features
            .get(category)
            .and_then(|r| r.supporting_str("recommended_feature"))
            .unwrap_or("N/A");
        table.push_str(&format!("| {} | {} | {} | {} |\n", category, score, price, feature));
    }
    table
}

fn pricing_section(kb: &KnowledgeBase) -> String {
    let top = kb.top_by_confidence(Some(InsightCategory::PricingStrategyOptimization), PRICING_COUNT);
    if top.is_empty() {
        return String::new();
    }

    let mut section = String::from("### Optimal Pricing by Category\n");
    for record in top {
        section.push_str(&format!(
            "- **{}**: The data suggests an optimal price point in the **{}** range, which correlates with the highest user satisfaction.\n",
            record.app_category.as_deref().unwrap_or("N/A"),
            record.supporting_str("optimal_price_range").unwrap_or("N/A"),
        ));
    }
    section
}

/// Capitalize the first letter of each word, lowercase the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::ai::MockBackend;
    use crate::knowledge::{Actionability, BusinessImpact};

    fn record(
        seq: usize,
        category: InsightCategory,
        app_category: Option<&str>,
        confidence: f64,
        data: &[(&str, serde_json::Value)],
        tags: &[&str],
        recs: &[&str],
    ) -> KnowledgeRecord {
        KnowledgeRecord {
            id: KnowledgeRecord::id_for(seq),
            timestamp: Utc::now(),
            category,
            app_category: app_category.map(String::from),
            insight_text: format!("Insight {}", seq),
            supporting_data: data.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            confidence_score: confidence,
            business_impact: BusinessImpact::High,
            actionability: Actionability::Strategic,
            recommendations: recs.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            narrative_source: None,
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            record(
                1,
                InsightCategory::SuccessFactors,
                None,
                0.85,
                &[("sample_size", json!(9660))],
                &["success_factors", "correlation", "reviews"],
                &["Monitor these metrics closely post-launch."],
            ),
            record(
                2,
                InsightCategory::SuccessFactors,
                None,
                0.90,
                &[("sample_size", json!(9660))],
                &["success_factors", "rating_impact", "user_sentiment"],
                &["Implement a proactive review management strategy."],
            ),
            record(
                3,
                InsightCategory::PricingStrategyOptimization,
                Some("FAMILY"),
                0.82,
                &[("optimal_price_range", json!("$2.00-$4.99"))],
                &["pricing", "optimization", "family"],
                &["Monitor these metrics closely post-launch."],
            ),
            record(
                4,
                InsightCategory::MarketOpportunityAssessment,
                Some("WEATHER"),
                0.78,
                &[("opportunity_score", json!(64233.92))],
                &["market_opportunity"],
                &[],
            ),
            record(
                5,
                InsightCategory::FeatureAndCategoryRecommendations,
                Some("FAMILY"),
                0.75,
                &[("recommended_feature", json!("Education"))],
                &["feature_recommendation"],
                &[],
            ),
        ])
    }

    fn synthesizer(ai: Option<AIClient>) -> ReportSynthesizer {
        ReportSynthesizer::new(ai, Arc::new(PromptLibrary::embedded_only().unwrap()))
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("rating impact"), "Rating Impact");
        assert_eq!(title_case("CORRELATION"), "Correlation");
    }

    #[test]
    fn test_success_factors_section() {
        let section = success_factors_section(&kb());
        assert_eq!(
            section,
            "### Success Factor Rankings\n\
             1. **Rating Impact** - Impact Score: 9/10\n> Insight 2\n\n\
             2. **Correlation** - Impact Score: 8/10\n> Insight 1\n\n"
        );
    }

    #[test]
    fn test_category_table() {
        let table = category_performance_table(&kb());
        assert!(table.contains("| FAMILY | N/A | $2.00-$4.99 | Education |\n"));
        assert!(table.contains("| WEATHER | 64234 | N/A (Free focus) | N/A |\n"));
        let family = table.find("| FAMILY").unwrap();
        let weather = table.find("| WEATHER").unwrap();
        assert!(family < weather);
    }

    #[test]
    fn test_unique_recommendations_keep_order() {
        assert_eq!(
            unique_recommendations(&kb()),
            vec![
                "Monitor these metrics closely post-launch.",
                "Implement a proactive review management strategy."
            ]
        );
    }

    #[tokio::test]
    async fn test_report_with_failed_generation() {
        let at = Local.with_ymd_and_hms(2025, 9, 21, 14, 30, 5).unwrap();
        let report = synthesizer(Some(AIClient::Mock(MockBackend::unavailable())))
            .synthesize_at(&kb(), at)
            .await;

        assert!(!report.summary_generated && !report.action_plan_generated);
        let md = &report.markdown;
        assert!(md.starts_with("# App Store Success Intelligence Report\n\n**Generated on:** 2025-09-21 14:30:05\n"));
        assert!(md.contains("**Analysis Coverage:** Approx. 9660 apps across Google Play Store\n---\n"));
        assert!(md.contains(SUMMARY_FALLBACK));
        assert!(md.contains(ACTION_PLAN_FALLBACK));
        assert!(md.contains("- **FAMILY**: The data suggests an optimal price point in the **$2.00-$4.99** range"));
        assert!(md.ends_with("*Report generated by AI-Powered App Market Intelligence System*\n"));
        assert_eq!(report_file_name(at), "App_Success_Report_20250921_143005.md");
    }

    #[tokio::test]
    async fn test_report_with_generation() {
        let report = synthesizer(Some(AIClient::mock())).synthesize(&kb()).await;
        assert!(report.summary_generated && report.action_plan_generated);
        assert!(report.markdown.contains("Mock response"));
        assert!(!report.markdown.contains(SUMMARY_FALLBACK));
    }

    #[tokio::test]
    async fn test_empty_knowledge_base() {
        let report = synthesizer(None).synthesize(&KnowledgeBase::default()).await;
        assert_eq!(report.markdown, EMPTY_REPORT);
    }

    #[tokio::test]
    async fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let report = synthesizer(None).synthesize(&kb()).await;
        let at = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let path = report.write_to_dir(dir.path(), at).unwrap();
        assert!(path.ends_with("App_Success_Report_20250102_030405.md"));
        assert_eq!(fs::read_to_string(path).unwrap(), report.markdown);
    }
}
