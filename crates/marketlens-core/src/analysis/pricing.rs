//! Pricing Strategy Analysis
//!
//! For each category with enough established paid apps, finds the price
//! bucket whose apps have the best mean rating.

use std::collections::BTreeMap;

use crate::dataset::{AppRecord, Column, Dataset};

use super::engine::Analyzer;
use super::stats::mean;
use super::types::{AnalysisKind, AnalysisThresholds, RawFinding};

/// Right-closed price buckets `(previous upper, upper]`, in ascending order
pub const PRICE_BUCKETS: [(f64, &str); 5] = [
    (1.99, "$0.01-$1.99"),
    (4.99, "$2.00-$4.99"),
    (9.99, "$5.00-$9.99"),
    (29.99, "$10.00-$29.99"),
    (f64::INFINITY, "$30.00+"),
];

/// Index of the bucket a positive price falls into
pub fn price_bucket(price: f64) -> Option<usize> {
    if price <= 0.0 || price.is_nan() {
        return None;
    }
    PRICE_BUCKETS.iter().position(|(upper, _)| price <= *upper)
}

/// Analyzer for optimal price ranges per category
pub struct PricingAnalyzer {
    /// Paid apps need strictly more installs than this
    pub install_floor: f64,
    /// Minimum paid apps in a category
    pub min_paid_apps: usize,
}

impl PricingAnalyzer {
    pub fn new() -> Self {
        Self::from_thresholds(&AnalysisThresholds::default())
    }

    pub fn from_thresholds(thresholds: &AnalysisThresholds) -> Self {
        Self {
            install_floor: thresholds.paid_install_floor,
            min_paid_apps: thresholds.min_paid_apps_per_category,
        }
    }

    /// Create with custom thresholds
    pub fn with_thresholds(install_floor: f64, min_paid_apps: usize) -> Self {
        Self {
            install_floor,
            min_paid_apps,
        }
    }

    fn is_candidate(&self, record: &AppRecord) -> bool {
        record.is_paid()
            && record.price.is_some_and(|p| p > 0.0)
            && record.installs.is_some_and(|i| i > self.install_floor)
    }

    /// Bucket with the highest mean rating; the first bucket wins ties
    fn optimal_bucket(apps: &[&AppRecord]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, _) in PRICE_BUCKETS.iter().enumerate() {
            let avg = mean(
                apps.iter()
                    .filter(|a| a.price.and_then(price_bucket) == Some(idx))
                    .filter_map(|a| a.rating),
            );
            if let Some(avg) = avg {
                if best.map_or(true, |(_, b)| avg > b) {
                    best = Some((idx, avg));
                }
            }
        }
        best
    }
}

impl Default for PricingAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for PricingAnalyzer {
    fn id(&self) -> AnalysisKind {
        AnalysisKind::Pricing
    }

    fn name(&self) -> &'static str {
        "Pricing Strategy"
    }

    fn analyze(&self, dataset: &Dataset) -> Vec<RawFinding> {
        let required = [
            Column::Category,
            Column::Rating,
            Column::Installs,
            Column::Type,
            Column::Price,
        ];
        if !dataset.has_columns(&required) {
            return vec![];
        }

        let mut by_category: BTreeMap<&str, Vec<&AppRecord>> = BTreeMap::new();
        for record in dataset.records().iter().filter(|r| self.is_candidate(r)) {
            if let Some(category) = record.category.as_deref() {
                by_category.entry(category).or_default().push(record);
            }
        }

        // Most paid apps first, then by name
        let mut categories: Vec<(&str, Vec<&AppRecord>)> = by_category
            .into_iter()
            .filter(|(_, apps)| apps.len() >= self.min_paid_apps)
            .collect();
        categories.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        categories
            .into_iter()
            .filter_map(|(category, apps)| {
                let (bucket, avg) = Self::optimal_bucket(&apps)?;
                Some(RawFinding::PricingOptimization {
                    category: category.to_string(),
                    optimal_price_range: PRICE_BUCKETS[bucket].1.to_string(),
                    avg_rating_in_range: avg,
                    sample_size: apps.len(),
                })
            })
            .collect()
    }
}
