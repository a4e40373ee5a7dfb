//! Analysis engine - runs every registered analyzer over a dataset

use crate::dataset::Dataset;

use super::types::{AnalysisKind, AnalysisThresholds, RawFinding};
use super::{
    FeatureRecommendationAnalyzer, MarketOpportunityAnalyzer, PricingAnalyzer,
    SuccessFactorsAnalyzer,
};

/// Trait for analysis families
///
/// Analyzers are pure: the same dataset always yields the same findings.
/// Absent columns or empty candidate sets produce an empty result, never an error.
pub trait Analyzer: Send + Sync {
    /// Family this analyzer belongs to
    fn id(&self) -> AnalysisKind;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Scan the dataset and produce findings
    fn analyze(&self, dataset: &Dataset) -> Vec<RawFinding>;
}

/// Orchestrates the analyzers in a fixed order
pub struct AnalysisEngine {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEngine {
    /// Create an engine with the built-in analyzers and default thresholds
    pub fn new() -> Self {
        Self::with_thresholds(&AnalysisThresholds::default())
    }

    /// Create an engine with the built-in analyzers using the given thresholds
    pub fn with_thresholds(thresholds: &AnalysisThresholds) -> Self {
        let mut engine = Self { analyzers: vec![] };

        // Order here is the order of the knowledge base
        engine.register(Box::new(SuccessFactorsAnalyzer::from_thresholds(thresholds)));
        engine.register(Box::new(PricingAnalyzer::from_thresholds(thresholds)));
        engine.register(Box::new(MarketOpportunityAnalyzer::from_thresholds(
            thresholds,
        )));
        engine.register(Box::new(FeatureRecommendationAnalyzer::from_thresholds(
            thresholds,
        )));

        engine
    }

    /// Register an analyzer; it runs after the ones already registered
    pub fn register(&mut self, analyzer: Box<dyn Analyzer>) {
        self.analyzers.push(analyzer);
    }

    /// Names of the registered analyzers, in run order
    pub fn analyzer_names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Run all analyzers and concatenate their findings
    pub fn analyze_all(&self, dataset: &Dataset) -> Vec<RawFinding> {
        let mut all_findings = vec![];

        for analyzer in &self.analyzers {
            let findings = analyzer.analyze(dataset);
            let produced = findings.len();
            let kept: Vec<RawFinding> = findings.into_iter().filter(|f| f.is_finite()).collect();

            if kept.len() < produced {
                tracing::warn!(
                    analyzer = analyzer.id().as_str(),
                    dropped = produced - kept.len(),
                    "Dropped findings with non-finite values"
                );
            }
            tracing::debug!(
                analyzer = analyzer.id().as_str(),
                count = kept.len(),
                "Analysis complete"
            );
            all_findings.extend(kept);
        }

        all_findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AppRecord;

    struct BrokenAnalyzer;

    impl Analyzer for BrokenAnalyzer {
        fn id(&self) -> AnalysisKind {
            AnalysisKind::MarketOpportunity
        }

        fn name(&self) -> &'static str {
            "Broken"
        }

        fn analyze(&self, _dataset: &Dataset) -> Vec<RawFinding> {
            vec![RawFinding::MarketOpportunity {
                category: "X".into(),
                avg_installs: f64::NAN,
                app_count: 30,
                opportunity_score: f64::NAN,
            }]
        }
    }

    #[test]
    fn test_builtin_order() {
        let engine = AnalysisEngine::new();
        assert_eq!(
            engine.analyzer_names(),
            vec![
                "Success Factors",
                "Pricing Strategy",
                "Market Opportunity",
                "Feature Recommendations"
            ]
        );
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let engine = AnalysisEngine::new();
        assert!(engine.analyze_all(&Dataset::default()).is_empty());
        assert!(engine
            .analyze_all(&Dataset::from_records(vec![AppRecord::default()]))
            .is_empty());
    }

    #[test]
    fn test_non_finite_findings_are_dropped() {
        let mut engine = AnalysisEngine { analyzers: vec![] };
        engine.register(Box::new(BrokenAnalyzer));
        assert!(engine.analyze_all(&Dataset::default()).is_empty());
    }
}
