//! Success Factors Analysis
//!
//! Two findings about what drives installs:
//! - the numeric column most correlated with installs
//! - how much more high-rated apps are installed than the rest

use crate::dataset::{Column, Dataset};

use super::engine::Analyzer;
use super::stats::{mean, pearson};
use super::types::{AnalysisKind, AnalysisThresholds, RawFinding};

/// Columns considered for the correlation scan, in tie-break order
const CORRELATION_COLUMNS: [Column; 4] = [
    Column::Rating,
    Column::Reviews,
    Column::Installs,
    Column::SentimentPolarity,
];

/// Analyzer for install drivers
pub struct SuccessFactorsAnalyzer {
    /// Rating at or above which an app is "high-rated"
    pub rating_threshold: f64,
}

impl SuccessFactorsAnalyzer {
    pub fn new() -> Self {
        Self::from_thresholds(&AnalysisThresholds::default())
    }

    pub fn from_thresholds(thresholds: &AnalysisThresholds) -> Self {
        Self {
            rating_threshold: thresholds.rating_threshold,
        }
    }

    /// Create with a custom rating threshold
    pub fn with_threshold(rating_threshold: f64) -> Self {
        Self { rating_threshold }
    }

    fn correlation(&self, dataset: &Dataset) -> Option<RawFinding> {
        if !dataset.has_column(Column::Installs) {
            return None;
        }

        let mut best: Option<(Column, f64)> = None;
        for column in CORRELATION_COLUMNS {
            if column == Column::Installs || !dataset.has_column(column) {
                continue;
            }
            let pairs: Vec<(f64, f64)> = dataset
                .records()
                .iter()
                .filter_map(|r| Some((r.numeric(column)?, r.installs?)))
                .collect();
            let Some(r) = pearson(&pairs) else {
                continue;
            };
            // Strictly greater keeps the first column on ties
            if best.map_or(true, |(_, b)| r > b) {
                best = Some((column, r));
            }
        }

        best.map(|(column, value)| RawFinding::Correlation {
            primary_metric: Column::Installs.as_str().to_string(),
            secondary_metric: column.as_str().to_string(),
            correlation_value: value,
            sample_size: dataset.len(),
        })
    }

    fn rating_impact(&self, dataset: &Dataset) -> Option<RawFinding> {
        if !dataset.has_columns(&[Column::Rating, Column::Installs]) {
            return None;
        }

        let (high, low): (Vec<_>, Vec<_>) = dataset
            .records()
            .iter()
            .filter(|r| r.rating.is_some())
            .partition(|r| r.rating.is_some_and(|v| v >= self.rating_threshold));

        if high.is_empty() || low.is_empty() {
            return None;
        }

        let avg_high = mean(high.iter().filter_map(|r| r.installs))?;
        let avg_low = mean(low.iter().filter_map(|r| r.installs))?;
        if avg_low <= 0.0 {
            return None;
        }

        Some(RawFinding::RatingImpact {
            threshold: self.rating_threshold,
            avg_installs_high: avg_high,
            avg_installs_low: avg_low,
            install_multiple: avg_high / avg_low,
            sample_size: dataset.len(),
        })
    }
}

impl Default for SuccessFactorsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for SuccessFactorsAnalyzer {
    fn id(&self) -> AnalysisKind {
        AnalysisKind::SuccessFactors
    }

    fn name(&self) -> &'static str {
        "Success Factors"
    }

    fn analyze(&self, dataset: &Dataset) -> Vec<RawFinding> {
        self.correlation(dataset)
            .into_iter()
            .chain(self.rating_impact(dataset))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AppRecord;

    fn app(rating: f64, reviews: f64, installs: f64, sentiment: f64) -> AppRecord {
        AppRecord {
            app: Some("a".into()),
            category: Some("GAME".into()),
            rating: Some(rating),
            reviews: Some(reviews),
            installs: Some(installs),
            sentiment_polarity: Some(sentiment),
            ..Default::default()
        }
    }

    #[test]
    fn test_reviews_strongest_correlation() {
        let records = vec![
            app(4.0, 10.0, 100.0, 0.3),
            app(4.6, 200.0, 2_000.0, 0.1),
            app(3.9, 50.0, 500.0, 0.5),
            app(4.8, 1_000.0, 10_000.0, 0.2),
        ];
        let findings = SuccessFactorsAnalyzer::new().analyze(&Dataset::from_records(records));

        match &findings[0] {
            RawFinding::Correlation {
                primary_metric,
                secondary_metric,
                correlation_value,
                sample_size,
            } => {
                assert_eq!(primary_metric, "Installs");
                assert_eq!(secondary_metric, "Reviews");
                assert!(*correlation_value > 0.99);
                assert_eq!(*sample_size, 4);
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_rating_impact_multiple() {
        let records = vec![
            app(4.5, 1.0, 3_000.0, 0.0),
            app(4.9, 2.0, 1_000.0, 0.1),
            app(3.0, 3.0, 500.0, 0.2),
            app(4.0, 4.0, 1_500.0, 0.3),
        ];
        let findings = SuccessFactorsAnalyzer::new().analyze(&Dataset::from_records(records));
        let impact = findings
            .iter()
            .find(|f| matches!(f, RawFinding::RatingImpact { .. }))
            .unwrap();

        match impact {
            RawFinding::RatingImpact {
                avg_installs_high,
                avg_installs_low,
                install_multiple,
                ..
            } => {
                assert_eq!(*avg_installs_high, 2_000.0);
                assert_eq!(*avg_installs_low, 1_000.0);
                assert_eq!(*install_multiple, 2.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_rating_impact_skipped_on_zero_denominator() {
        let records = vec![app(4.7, 1.0, 1_000.0, 0.0), app(3.1, 2.0, 0.0, 0.1)];
        let findings = SuccessFactorsAnalyzer::new().analyze(&Dataset::from_records(records));
        assert!(findings
            .iter()
            .all(|f| !matches!(f, RawFinding::RatingImpact { .. })));
    }

    #[test]
    fn test_rating_impact_skipped_when_group_empty() {
        let records = vec![app(4.7, 1.0, 1_000.0, 0.0), app(4.9, 2.0, 10.0, 0.1)];
        let findings = SuccessFactorsAnalyzer::new().analyze(&Dataset::from_records(records));
        assert!(findings
            .iter()
            .all(|f| !matches!(f, RawFinding::RatingImpact { .. })));
    }

    #[test]
    fn test_missing_installs_column() {
        let records = vec![app(4.7, 1.0, 1_000.0, 0.0), app(3.0, 2.0, 10.0, 0.1)];
        let ds = Dataset::with_columns([Column::Rating, Column::Reviews], records);
        assert!(SuccessFactorsAnalyzer::new().analyze(&ds).is_empty());
    }
}
