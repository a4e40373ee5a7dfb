//! Narrative formatter
//!
//! Turns one `RawFinding` into one `KnowledgeRecord`. The structural fields
//! (category, supporting data, impact, actionability, tags) come from a fixed
//! per-variant template; only `insight_text` and `recommendations` are asked
//! of the text-generation backend. Any generation failure falls back to the
//! template narrative, so formatting never fails.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::ai::{try_generate_structured, AIClient, GeneratedInsight};
use crate::analysis::RawFinding;
use crate::knowledge::{
    dedup_tags, Actionability, BusinessImpact, InsightCategory, KnowledgeBase, KnowledgeRecord,
    NarrativeSource,
};
use crate::prompts::{PromptId, PromptLibrary};

/// Deterministic per-variant parts of a record
#[derive(Debug, Clone)]
pub struct InsightTemplate {
    pub category: InsightCategory,
    pub app_category: Option<String>,
    pub supporting_data: BTreeMap<String, Value>,
    /// Confidence when the narrative was generated
    pub generated_confidence: f64,
    /// Confidence when the fallback narrative was used
    pub fallback_confidence: f64,
    pub business_impact: BusinessImpact,
    pub actionability: Actionability,
    pub tags: Vec<String>,
    pub prompt: PromptId,
    pub prompt_vars: HashMap<&'static str, String>,
    pub fallback_text: String,
    pub fallback_recommendations: Vec<String>,
}

impl InsightTemplate {
    /// Build the template for a finding
    pub fn for_finding(finding: &RawFinding) -> Self {
        match finding {
            RawFinding::Correlation {
                primary_metric,
                secondary_metric,
                correlation_value,
                sample_size,
            } => Self {
                category: InsightCategory::SuccessFactors,
                app_category: None,
                supporting_data: BTreeMap::from([
                    ("sample_size".to_string(), json!(sample_size)),
                    ("correlation_strength".to_string(), json!(round_to(*correlation_value, 2))),
                    (
                        "statistical_significance".to_string(),
                        json!("N/A (pending deeper analysis)"),
                    ),
                ]),
                generated_confidence: 0.95,
                fallback_confidence: 0.85,
                business_impact: BusinessImpact::High,
                actionability: Actionability::Immediate,
                tags: dedup_tags([
                    "success_factors".to_string(),
                    "correlation".to_string(),
                    secondary_metric.to_lowercase(),
                ]),
                prompt: PromptId::CorrelationInsight,
                prompt_vars: HashMap::from([
                    ("correlation_value", format!("{:.2}", correlation_value)),
                    ("secondary_metric", secondary_metric.clone()),
                    ("primary_metric", primary_metric.clone()),
                    ("sample_size", sample_size.to_string()),
                ]),
                fallback_text: format!(
                    "There is a strong positive correlation between an app's {} and its total number of {}.",
                    secondary_metric, primary_metric
                ),
                fallback_recommendations: vec![
                    format!(
                        "Focus on strategies to improve {} to drive more installs.",
                        secondary_metric
                    ),
                    "Monitor these metrics closely post-launch.".to_string(),
                ],
            },

            RawFinding::RatingImpact {
                threshold,
                avg_installs_high,
                avg_installs_low,
                install_multiple,
                sample_size,
            } => {
                let threshold = decimal(*threshold);
                let high = group_thousands(*avg_installs_high);
                let low = group_thousands(*avg_installs_low);
                Self {
                    category: InsightCategory::SuccessFactors,
                    app_category: None,
                    supporting_data: BTreeMap::from([
                        ("sample_size".to_string(), json!(sample_size)),
                        (
                            "comparison".to_string(),
                            json!(format!("Avg installs for >= {} apps: {}", threshold, high)),
                        ),
                        (
                            "comparison_base".to_string(),
                            json!(format!("Avg installs for < {} apps: {}", threshold, low)),
                        ),
                    ]),
                    generated_confidence: 0.98,
                    fallback_confidence: 0.90,
                    business_impact: BusinessImpact::High,
                    actionability: Actionability::Immediate,
                    tags: dedup_tags(["success_factors", "rating_impact", "user_sentiment"]),
                    prompt: PromptId::RatingImpactInsight,
                    prompt_vars: HashMap::from([
                        ("threshold", threshold.clone()),
                        ("install_multiple", format!("{:.1}", install_multiple)),
                        ("avg_installs_high", high.clone()),
                        ("avg_installs_low", low.clone()),
                        ("sample_size", sample_size.to_string()),
                    ]),
                    fallback_text: format!(
                        "Apps with a user rating of {} or higher have, on average, {:.1}x more installs than lower-rated apps.",
                        threshold, install_multiple
                    ),
                    fallback_recommendations: vec![
                        format!(
                            "Prioritize user feedback and app quality to maintain a rating above {}.",
                            threshold
                        ),
                        "Implement a proactive review management strategy.".to_string(),
                    ],
                }
            }

            RawFinding::PricingOptimization {
                category,
                optimal_price_range,
                avg_rating_in_range,
                sample_size,
            } => Self {
                category: InsightCategory::PricingStrategyOptimization,
                app_category: Some(category.clone()),
                supporting_data: BTreeMap::from([
                    ("sample_size".to_string(), json!(sample_size)),
                    ("optimal_price_range".to_string(), json!(optimal_price_range)),
                    ("avg_rating_in_range".to_string(), json!(round_to(*avg_rating_in_range, 2))),
                ]),
                generated_confidence: 0.92,
                fallback_confidence: 0.82,
                business_impact: BusinessImpact::Medium,
                actionability: Actionability::Strategic,
                tags: dedup_tags([
                    "pricing".to_string(),
                    "optimization".to_string(),
                    category.to_lowercase(),
                ]),
                prompt: PromptId::PricingInsight,
                prompt_vars: HashMap::from([
                    ("category", category.clone()),
                    ("optimal_price_range", optimal_price_range.clone()),
                    ("avg_rating_in_range", format!("{:.2}", avg_rating_in_range)),
                    ("sample_size", sample_size.to_string()),
                ]),
                fallback_text: format!(
                    "For the '{}' category, the price range of {} correlates with the highest average user ratings, suggesting a strong value proposition at this price point.",
                    category, optimal_price_range
                ),
                fallback_recommendations: vec![
                    format!(
                        "Consider pricing new '{}' apps within the {} range to maximize perceived value.",
                        category, optimal_price_range
                    ),
                    "Analyze competitor pricing within this specific tier.".to_string(),
                ],
            },

            RawFinding::MarketOpportunity {
                category,
                avg_installs,
                app_count,
                opportunity_score,
            } => {
                let installs = group_thousands(*avg_installs);
                Self {
                    category: InsightCategory::MarketOpportunityAssessment,
                    app_category: Some(category.clone()),
                    supporting_data: BTreeMap::from([
                        ("app_count_in_category".to_string(), json!(app_count)),
                        ("avg_installs_in_category".to_string(), json!(installs)),
                        ("opportunity_score".to_string(), json!(round_to(*opportunity_score, 2))),
                    ]),
                    generated_confidence: 0.88,
                    fallback_confidence: 0.78,
                    business_impact: BusinessImpact::High,
                    actionability: Actionability::Strategic,
                    tags: dedup_tags([
                        "market_opportunity".to_string(),
                        "untapped_market".to_string(),
                        category.to_lowercase(),
                    ]),
                    prompt: PromptId::MarketOpportunityInsight,
                    prompt_vars: HashMap::from([
                        ("category", category.clone()),
                        ("avg_installs", installs.clone()),
                        ("app_count", app_count.to_string()),
                    ]),
                    fallback_text: format!(
                        "The '{}' category shows a high ratio of average installs to the number of competing apps, indicating a potential market opportunity.",
                        category
                    ),
                    fallback_recommendations: vec![
                        format!("Conduct deeper market research into the '{}' category.", category),
                        format!(
                            "Identify feature gaps not being met by the {} existing apps.",
                            app_count
                        ),
                    ],
                }
            }

            RawFinding::FeatureRecommendation {
                category,
                recommended_feature,
                feature_frequency,
                successful_app_sample_size,
            } => Self {
                category: InsightCategory::FeatureAndCategoryRecommendations,
                app_category: Some(category.clone()),
                supporting_data: BTreeMap::from([
                    (
                        "successful_app_sample_size".to_string(),
                        json!(successful_app_sample_size),
                    ),
                    ("recommended_feature".to_string(), json!(recommended_feature)),
                    ("feature_frequency_in_top_apps".to_string(), json!(feature_frequency)),
                ]),
                generated_confidence: 0.85,
                fallback_confidence: 0.75,
                business_impact: BusinessImpact::Medium,
                actionability: Actionability::Strategic,
                tags: dedup_tags([
                    "feature_recommendation".to_string(),
                    "product_development".to_string(),
                    category.to_lowercase(),
                    recommended_feature.to_lowercase().replace(" & ", "_and_"),
                ]),
                prompt: PromptId::FeatureRecommendationInsight,
                prompt_vars: HashMap::from([
                    ("category", category.clone()),
                    ("recommended_feature", recommended_feature.clone()),
                    ("feature_frequency", feature_frequency.to_string()),
                    ("successful_app_sample_size", successful_app_sample_size.to_string()),
                ]),
                fallback_text: format!(
                    "Within the '{}' category, top apps commonly feature '{}'.",
                    category, recommended_feature
                ),
                fallback_recommendations: vec![
                    format!(
                        "Consider adding features related to '{}' to '{}' apps.",
                        recommended_feature, category
                    ),
                    "Analyze how competitors implement these features.".to_string(),
                ],
            },
        }
    }

    fn into_record(
        self,
        sequence: usize,
        generated: Option<GeneratedInsight>,
    ) -> KnowledgeRecord {
        let (insight_text, recommendations, confidence, source) = match generated {
            Some(g) => (
                g.insight_text,
                g.recommendations,
                self.generated_confidence,
                NarrativeSource::Generated,
            ),
            None => (
                self.fallback_text,
                self.fallback_recommendations,
                self.fallback_confidence,
                NarrativeSource::Template,
            ),
        };

        KnowledgeRecord {
            id: KnowledgeRecord::id_for(sequence),
            timestamp: Utc::now(),
            category: self.category,
            app_category: self.app_category,
            insight_text,
            supporting_data: self.supporting_data,
            confidence_score: confidence,
            business_impact: self.business_impact,
            actionability: self.actionability,
            recommendations,
            tags: self.tags,
            narrative_source: Some(source),
        }
    }
}

/// Formats findings into knowledge records
#[derive(Clone)]
pub struct NarrativeFormatter {
    ai: Option<AIClient>,
    prompts: Arc<PromptLibrary>,
    concurrency: usize,
}

impl NarrativeFormatter {
    /// `ai = None` means no backend is configured; every record uses its template
    pub fn new(ai: Option<AIClient>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            ai,
            prompts,
            concurrency: 4,
        }
    }

    /// Number of findings narrated at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Format one finding with a 1-based sequence number
    pub async fn format(&self, finding: &RawFinding, sequence: usize) -> KnowledgeRecord {
        let template = InsightTemplate::for_finding(finding);
        let generated = self.generate(finding, &template).await;
        template.into_record(sequence, generated)
    }

    async fn generate(
        &self,
        finding: &RawFinding,
        template: &InsightTemplate,
    ) -> Option<GeneratedInsight> {
        let prompt = match self.prompts.render(template.prompt, &template.prompt_vars) {
            Ok(p) => p,
            Err(e) => {
                warn!(finding = finding.type_name(), error = %e, "Prompt unavailable, using template");
                return None;
            }
        };

        match try_generate_structured(self.ai.as_ref(), &prompt).await {
            Ok(insight) => {
                debug!(finding = finding.type_name(), "Generated narrative");
                Some(insight)
            }
            Err(e) => {
                warn!(
                    finding = finding.type_name(),
                    kind = e.kind(),
                    error = %e,
                    "Generation failed, using template narrative"
                );
                None
            }
        }
    }

    /// Format every finding in order, narrating up to `concurrency` at once
    pub async fn format_all(&self, findings: &[RawFinding]) -> KnowledgeBase {
        let records: Vec<KnowledgeRecord> = stream::iter(findings.iter().enumerate())
            .map(|(i, finding)| self.format(finding, i + 1))
            .buffered(self.concurrency)
            .collect()
            .await;

        let kb = KnowledgeBase::new(records);
        info!(
            records = kb.len(),
            degraded = kb.degraded_count(),
            "Formatted findings"
        );
        kb
    }
}

/// Round half away from zero to `places` decimals
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Decimal rendering that always shows a fractional part (4 -> "4.0")
fn decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Truncate to an integer and group thousands with commas
pub(crate) fn group_thousands(value: f64) -> String {
    let int = value.trunc() as i64;
    let digits = int.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if int < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn findings() -> Vec<RawFinding> {
        vec![
            RawFinding::Correlation {
                primary_metric: "Installs".into(),
                secondary_metric: "Reviews".into(),
                correlation_value: 0.6341,
                sample_size: 9_660,
            },
            RawFinding::RatingImpact {
                threshold: 4.5,
                avg_installs_high: 12_345_678.9,
                avg_installs_low: 4_000_000.0,
                install_multiple: 3.0864,
                sample_size: 9_660,
            },
            RawFinding::PricingOptimization {
                category: "FAMILY".into(),
                optimal_price_range: "$2.00-$4.99".into(),
                avg_rating_in_range: 4.3333,
                sample_size: 40,
            },
            RawFinding::MarketOpportunity {
                category: "WEATHER".into(),
                avg_installs: 5_074_486.2,
                app_count: 79,
                opportunity_score: 64_233.9,
            },
            RawFinding::FeatureRecommendation {
                category: "FAMILY".into(),
                recommended_feature: "Action & Adventure".into(),
                feature_frequency: 12,
                successful_app_sample_size: 30,
            },
        ]
    }

    fn formatter(ai: Option<AIClient>) -> NarrativeFormatter {
        NarrativeFormatter::new(ai, Arc::new(PromptLibrary::embedded_only().unwrap()))
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.9), "999");
        assert_eq!(group_thousands(1_000.0), "1,000");
        assert_eq!(group_thousands(12_345_678.9), "12,345,678");
        assert_eq!(group_thousands(-1_234.0), "-1,234");
    }

    #[test]
    fn test_decimal() {
        assert_eq!(decimal(4.5), "4.5");
        assert_eq!(decimal(4.0), "4.0");
    }

    #[test]
    fn test_fallback_templates_complete() {
        for finding in findings() {
            let t = InsightTemplate::for_finding(&finding);
            assert!(!t.fallback_text.is_empty());
            assert!(!t.fallback_text.contains('{') && !t.fallback_text.contains('}'));
            assert!(!t.fallback_recommendations.is_empty() && t.fallback_recommendations.len() <= 2);
            for rec in &t.fallback_recommendations {
                assert!(!rec.is_empty());
                assert!(!rec.contains('{') && !rec.contains('}'));
            }
            assert!(t.generated_confidence > t.fallback_confidence);
        }
    }

    #[test]
    fn test_template_texts() {
        let t = InsightTemplate::for_finding(&findings()[1]);
        assert_eq!(
            t.fallback_text,
            "Apps with a user rating of 4.5 or higher have, on average, 3.1x more installs than lower-rated apps."
        );
        assert_eq!(
            t.supporting_data["comparison"],
            json!("Avg installs for >= 4.5 apps: 12,345,678")
        );

        let t = InsightTemplate::for_finding(&findings()[4]);
        assert_eq!(
            t.tags,
            vec!["feature_recommendation", "product_development", "family", "action_and_adventure"]
        );
    }

    #[tokio::test]
    async fn test_fallback_when_unavailable() {
        let f = formatter(Some(AIClient::Mock(MockBackend::unavailable())));
        let record = f.format(&findings()[2], 7).await;

        assert_eq!(record.id, "INSIGHT_007");
        assert_eq!(record.category, InsightCategory::PricingStrategyOptimization);
        assert_eq!(record.app_category.as_deref(), Some("FAMILY"));
        assert_eq!(record.confidence_score, 0.82);
        assert_eq!(record.narrative_source, Some(NarrativeSource::Template));
        assert_eq!(record.supporting_data["avg_rating_in_range"], json!(4.33));
        assert_eq!(record.tags, vec!["pricing", "optimization", "family"]);
    }

    #[tokio::test]
    async fn test_fallback_when_malformed_or_unconfigured() {
        for f in [
            formatter(Some(AIClient::Mock(MockBackend::malformed()))),
            formatter(None),
        ] {
            let record = f.format(&findings()[0], 1).await;
            assert_eq!(record.confidence_score, 0.85);
            assert_eq!(
                record.insight_text,
                "There is a strong positive correlation between an app's Reviews and its total number of Installs."
            );
        }
    }

    #[tokio::test]
    async fn test_generated_narrative_raises_confidence() {
        let mock = MockBackend::new();
        let f = formatter(Some(AIClient::Mock(mock.clone())));
        let record = f.format(&findings()[3], 1).await;

        assert_eq!(mock.call_count(), 1);
        assert_eq!(record.narrative_source, Some(NarrativeSource::Generated));
        assert_eq!(record.confidence_score, 0.88);
        assert!(record.insight_text.starts_with("Generated insight"));
        // structural fields never depend on the backend
        assert_eq!(record.supporting_data["avg_installs_in_category"], json!("5,074,486"));
        assert_eq!(record.tags, vec!["market_opportunity", "untapped_market", "weather"]);
    }

    #[tokio::test]
    async fn test_format_all_preserves_order() {
        let f = formatter(Some(AIClient::Mock(MockBackend::unavailable()))).with_concurrency(3);
        let kb = f.format_all(&findings()).await;

        let ids: Vec<&str> = kb.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["INSIGHT_001", "INSIGHT_002", "INSIGHT_003", "INSIGHT_004", "INSIGHT_005"]
        );
        assert_eq!(kb.records()[3].category, InsightCategory::MarketOpportunityAssessment);
        assert_eq!(kb.degraded_count(), 5);
    }
}
