//! Market Opportunity Analysis
//!
//! Scores each category by demand (mean installs) over supply (app count).

use std::collections::BTreeMap;

use crate::dataset::{Column, Dataset};

use super::engine::Analyzer;
use super::stats::mean;
use super::types::{AnalysisKind, AnalysisThresholds, RawFinding};

/// Analyzer for under-served categories
pub struct MarketOpportunityAnalyzer {
    /// Categories need strictly more apps than this
    pub min_supply: usize,
}

impl MarketOpportunityAnalyzer {
    pub fn new() -> Self {
        Self::from_thresholds(&AnalysisThresholds::default())
    }

    pub fn from_thresholds(thresholds: &AnalysisThresholds) -> Self {
        Self {
            min_supply: thresholds.min_category_supply,
        }
    }

    pub fn with_min_supply(min_supply: usize) -> Self {
        Self { min_supply }
    }
}

impl Default for MarketOpportunityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for MarketOpportunityAnalyzer {
    fn id(&self) -> AnalysisKind {
        AnalysisKind::MarketOpportunity
    }

    fn name(&self) -> &'static str {
        "Market Opportunity"
    }

    fn analyze(&self, dataset: &Dataset) -> Vec<RawFinding> {
        if !dataset.has_columns(&[Column::App, Column::Category, Column::Installs]) {
            return vec![];
        }

        // category -> (supply, install values)
        let mut groups: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();
        for record in dataset.records() {
            let Some(category) = record.category.as_deref() else {
                continue;
            };
            let entry = groups.entry(category).or_default();
            if record.app.is_some() {
                entry.0 += 1;
            }
            if let Some(installs) = record.installs {
                entry.1.push(installs);
            }
        }

        let mut findings: Vec<RawFinding> = groups
            .into_iter()
            .filter(|(_, (supply, _))| *supply > self.min_supply)
            .filter_map(|(category, (supply, installs))| {
                let demand = mean(installs)?;
                let score = demand / supply as f64;
                score.is_finite().then(|| RawFinding::MarketOpportunity {
                    category: category.to_string(),
                    avg_installs: demand,
                    app_count: supply,
                    opportunity_score: score,
                })
            })
            .collect();

        findings.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        findings
    }
}

fn score_of(finding: &RawFinding) -> f64 {
    match finding {
        RawFinding::MarketOpportunity {
            opportunity_score, ..
        } => *opportunity_score,
        _ => 0.0,
    }
}
