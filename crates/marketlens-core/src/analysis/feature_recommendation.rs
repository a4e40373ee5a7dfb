//! Feature Recommendation Analysis
//!
//! Looks at the top install quartile of each large category and reports the
//! genre tokens those apps share most often.

use std::collections::{BTreeMap, HashMap};

use crate::dataset::{AppRecord, Column, Dataset};

use super::engine::Analyzer;
use super::stats::quantile;
use super::types::{AnalysisKind, AnalysisThresholds, RawFinding};

/// Analyzer for features common among top apps
pub struct FeatureRecommendationAnalyzer {
    /// Categories need strictly more apps than this
    pub min_category_size: usize,
    /// Install quantile marking the successful apps
    pub top_quantile: f64,
    /// Features reported per category
    pub max_features: usize,
}

impl FeatureRecommendationAnalyzer {
    pub fn new() -> Self {
        Self::from_thresholds(&AnalysisThresholds::default())
    }

    pub fn from_thresholds(thresholds: &AnalysisThresholds) -> Self {
        Self {
            min_category_size: thresholds.min_feature_category_size,
            top_quantile: thresholds.top_quantile,
            max_features: thresholds.features_per_category,
        }
    }

    fn category_findings(&self, category: &str, apps: &[&AppRecord]) -> Vec<RawFinding> {
        let installs: Vec<f64> = apps.iter().filter_map(|a| a.installs).collect();
        let Some(cutoff) = quantile(&installs, self.top_quantile) else {
            return vec![];
        };
        let successful: Vec<&&AppRecord> = apps
            .iter()
            .filter(|a| a.installs.is_some_and(|i| i >= cutoff))
            .collect();
        if successful.is_empty() {
            return vec![];
        }

        let category_key = normalize_token(category);
        let counts = count_tokens(
            successful
                .iter()
                .filter_map(|a| a.genres.as_deref())
                .flat_map(|g| g.split(';'))
                .filter(|t| normalize_token(t) != category_key),
        );

        counts
            .into_iter()
            .take(self.max_features)
            .map(|(feature, frequency)| RawFinding::FeatureRecommendation {
                category: category.to_string(),
                recommended_feature: feature,
                feature_frequency: frequency,
                successful_app_sample_size: successful.len(),
            })
            .collect()
    }
}

impl Default for FeatureRecommendationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for FeatureRecommendationAnalyzer {
    fn id(&self) -> AnalysisKind {
        AnalysisKind::FeatureRecommendation
    }

    fn name(&self) -> &'static str {
        "Feature Recommendations"
    }

    fn analyze(&self, dataset: &Dataset) -> Vec<RawFinding> {
        if !dataset.has_columns(&[Column::Genres, Column::Category, Column::Installs]) {
            return vec![];
        }

        let mut by_category: BTreeMap<&str, Vec<&AppRecord>> = BTreeMap::new();
        for record in dataset.records() {
            if record.genres.is_none() || record.installs.is_none() {
                continue;
            }
            if let Some(category) = record.category.as_deref() {
                by_category.entry(category).or_default().push(record);
            }
        }

        let mut categories: Vec<(&str, Vec<&AppRecord>)> = by_category
            .into_iter()
            .filter(|(_, apps)| apps.len() > self.min_category_size)
            .collect();
        categories.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        categories
            .iter()
            .flat_map(|(category, apps)| self.category_findings(category, apps))
            .collect()
    }
}

/// Case, underscore and whitespace insensitive comparison key
fn normalize_token(token: &str) -> String {
    token
        .to_uppercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count trimmed, non-empty tokens; most frequent first, ties in first-seen order
fn count_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match index.get(token) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(token.to_string(), order.len());
                order.push((token.to_string(), 1));
            }
        }
    }

    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}
