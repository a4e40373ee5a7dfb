//! Analysis types
//!
//! `RawFinding` is the un-narrated output of the analyzers. Every numeric
//! field must be finite; the engine drops anything that is not.

use serde::{Deserialize, Serialize};

/// Analysis family that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    SuccessFactors,
    Pricing,
    MarketOpportunity,
    FeatureRecommendation,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessFactors => "success_factors",
            Self::Pricing => "pricing",
            Self::MarketOpportunity => "market_opportunity",
            Self::FeatureRecommendation => "feature_recommendation",
        }
    }
}

/// A statistical finding before narration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawFinding {
    Correlation {
        primary_metric: String,
        secondary_metric: String,
        correlation_value: f64,
        sample_size: usize,
    },
    RatingImpact {
        threshold: f64,
        avg_installs_high: f64,
        avg_installs_low: f64,
        install_multiple: f64,
        sample_size: usize,
    },
    PricingOptimization {
        category: String,
        optimal_price_range: String,
        avg_rating_in_range: f64,
        sample_size: usize,
    },
    MarketOpportunity {
        category: String,
        avg_installs: f64,
        app_count: usize,
        opportunity_score: f64,
    },
    FeatureRecommendation {
        category: String,
        recommended_feature: String,
        feature_frequency: usize,
        successful_app_sample_size: usize,
    },
}

impl RawFinding {
    /// Stable identifier of the variant (matches the serialized `type` tag)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Correlation { .. } => "correlation",
            Self::RatingImpact { .. } => "rating_impact",
            Self::PricingOptimization { .. } => "pricing_optimization",
            Self::MarketOpportunity { .. } => "market_opportunity",
            Self::FeatureRecommendation { .. } => "feature_recommendation",
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Correlation { .. } | Self::RatingImpact { .. } => AnalysisKind::SuccessFactors,
            Self::PricingOptimization { .. } => AnalysisKind::Pricing,
            Self::MarketOpportunity { .. } => AnalysisKind::MarketOpportunity,
            Self::FeatureRecommendation { .. } => AnalysisKind::FeatureRecommendation,
        }
    }

    /// Market category the finding refers to, if it is per-category
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Correlation { .. } | Self::RatingImpact { .. } => None,
            Self::PricingOptimization { category, .. }
            | Self::MarketOpportunity { category, .. }
            | Self::FeatureRecommendation { category, .. } => Some(category),
        }
    }

    /// True if every floating point field is finite
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Correlation {
                correlation_value, ..
            } => correlation_value.is_finite(),
            Self::RatingImpact {
                threshold,
                avg_installs_high,
                avg_installs_low,
                install_multiple,
                ..
            } => [threshold, avg_installs_high, avg_installs_low, install_multiple]
                .iter()
                .all(|v| v.is_finite()),
            Self::PricingOptimization {
                avg_rating_in_range,
                ..
            } => avg_rating_in_range.is_finite(),
            Self::MarketOpportunity {
                avg_installs,
                opportunity_score,
                ..
            } => avg_installs.is_finite() && opportunity_score.is_finite(),
            Self::FeatureRecommendation { .. } => true,
        }
    }
}

/// Tunable thresholds for every analysis family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisThresholds {
    /// Rating at or above which an app counts as high-rated
    pub rating_threshold: f64,
    /// Paid apps must have strictly more installs than this
    pub paid_install_floor: f64,
    /// Minimum paid apps for a category to get a pricing finding
    pub min_paid_apps_per_category: usize,
    /// Categories need strictly more apps than this for a market finding
    pub min_category_supply: usize,
    /// Categories need strictly more apps than this for feature findings
    pub min_feature_category_size: usize,
    /// Install quantile marking the successful apps of a category
    pub top_quantile: f64,
    /// Features emitted per category
    pub features_per_category: usize,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            rating_threshold: 4.5,
            paid_install_floor: 1000.0,
            min_paid_apps_per_category: 10,
            min_category_supply: 20,
            min_feature_category_size: 50,
            top_quantile: 0.75,
            features_per_category: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tag_matches_type_name() {
        let finding = RawFinding::MarketOpportunity {
            category: "WEATHER".into(),
            avg_installs: 1_000_000.0,
            app_count: 25,
            opportunity_score: 40_000.0,
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["type"], finding.type_name());

        let back: RawFinding = serde_json::from_value(json).unwrap();
        assert_eq!(back, finding);
    }

    #[test]
    fn test_is_finite() {
        let ok = RawFinding::RatingImpact {
            threshold: 4.5,
            avg_installs_high: 100.0,
            avg_installs_low: 50.0,
            install_multiple: 2.0,
            sample_size: 10,
        };
        assert!(ok.is_finite());

        let bad = RawFinding::RatingImpact {
            threshold: 4.5,
            avg_installs_high: 100.0,
            avg_installs_low: 0.0,
            install_multiple: f64::INFINITY,
            sample_size: 10,
        };
        assert!(!bad.is_finite());
    }

    #[test]
    fn test_kind_and_category() {
        let f = RawFinding::FeatureRecommendation {
            category: "GAME".into(),
            recommended_feature: "Action".into(),
            feature_frequency: 4,
            successful_app_sample_size: 9,
        };
        assert_eq!(f.kind(), AnalysisKind::FeatureRecommendation);
        assert_eq!(f.category(), Some("GAME"));
    }
}
