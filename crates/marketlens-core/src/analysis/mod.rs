//! Statistical analysis of the app-market dataset
//!
//! Each analyzer scans the dataset for one family of findings:
//! - `SuccessFactorsAnalyzer`: install correlation and rating impact
//! - `PricingAnalyzer`: best price bucket per category
//! - `MarketOpportunityAnalyzer`: demand over supply per category
//! - `FeatureRecommendationAnalyzer`: common genres among top apps
//!
//! `AnalysisEngine` runs them in that order and guarantees every emitted
//! finding is finite.

pub mod engine;
mod feature_recommendation;
mod market_opportunity;
mod pricing;
pub mod stats;
mod success_factors;
pub mod types;

pub use engine::{AnalysisEngine, Analyzer};
pub use feature_recommendation::FeatureRecommendationAnalyzer;
pub use market_opportunity::MarketOpportunityAnalyzer;
pub use pricing::{price_bucket, PricingAnalyzer, PRICE_BUCKETS};
pub use success_factors::SuccessFactorsAnalyzer;
pub use types::{AnalysisKind, AnalysisThresholds, RawFinding};
