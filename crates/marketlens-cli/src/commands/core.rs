//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_config` / `load_prompts` / `generation_client` - Shared setup
//! - `cmd_analyze` - Run the analysis and print raw findings
//! - `cmd_generate` - Analyze, narrate and write the knowledge base

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use marketlens_core::{
    AIClient, AnalysisEngine, AnalysisKind, Config, Dataset, NarrativeFormatter, PromptLibrary,
    RawFinding,
};

/// Resolve configuration once for the process
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

/// Prompt library with user overrides applied
pub fn load_prompts() -> Result<Arc<PromptLibrary>> {
    let library = PromptLibrary::new().context("Failed to load prompt templates")?;
    Ok(Arc::new(library))
}

/// The configured text-generation client
pub fn generation_client(config: &Config) -> AIClient {
    AIClient::from_config(&config.generation)
}

fn load_dataset(data: &Path) -> Result<Dataset> {
    Dataset::from_path(data).with_context(|| {
        format!(
            "Could not load dataset {}. Check the path points to the merged app-market CSV.",
            data.display()
        )
    })
}

fn analyze(config: &Config, dataset: &Dataset) -> Vec<RawFinding> {
    let engine = AnalysisEngine::with_thresholds(&config.analysis);
    println!("   Analyzers: {}", engine.analyzer_names().join(", "));
    engine.analyze_all(dataset)
}

/// Findings per analysis family, in family order
pub fn family_counts(findings: &[RawFinding]) -> BTreeMap<AnalysisKind, usize> {
    let mut counts = BTreeMap::new();
    for finding in findings {
        *counts.entry(finding.kind()).or_insert(0) += 1;
    }
    counts
}

pub fn cmd_analyze(config: &Config, data: &Path) -> Result<()> {
    println!("🔍 Analyzing {}...", data.display());

    let dataset = load_dataset(data)?;
    println!("   Loaded {} apps", dataset.len());

    let findings = analyze(config, &dataset);
    println!("   Found {} raw findings", findings.len());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&findings).context("Failed to serialize findings")?
    );

    Ok(())
}

pub async fn cmd_generate(config: &Config, data: &Path, output: &Path) -> Result<()> {
    println!("🔍 Analyzing {}...", data.display());

    let dataset = load_dataset(data)?;
    println!("   Loaded {} apps", dataset.len());

    let findings = analyze(config, &dataset);

    println!();
    println!("📊 Analysis Results");
    println!("   ─────────────────────────────");
    let counts = family_counts(&findings);
    for kind in [
        AnalysisKind::SuccessFactors,
        AnalysisKind::Pricing,
        AnalysisKind::MarketOpportunity,
        AnalysisKind::FeatureRecommendation,
    ] {
        println!(
            "   {}: {}",
            kind.as_str(),
            counts.get(&kind).copied().unwrap_or(0)
        );
    }

    if findings.is_empty() {
        println!();
        println!("⚠️  No findings. The dataset may be missing required columns.");
    }

    let prompts = load_prompts()?;
    let ai = generation_client(config);
    println!();
    println!(
        "✍️  Writing insights with {} ({})...",
        ai.backend_name(),
        config.generation.model
    );

    let formatter =
        NarrativeFormatter::new(Some(ai), prompts).with_concurrency(config.formatting.concurrency);
    let kb = formatter.format_all(&findings).await;

    kb.save(output)
        .with_context(|| format!("Failed to write knowledge base {}", output.display()))?;

    let degraded = kb.degraded_count();
    println!();
    println!("✅ Wrote {} insights to {}", kb.len(), output.display());
    if degraded > 0 {
        println!(
            "   ⚠️  {} of {} used template text (generation unavailable)",
            degraded,
            kb.len()
        );
        println!("   💡 Tip: Run 'marketlens backend test' to check the generation backend");
    }

    println!();
    println!("Next steps:");
    println!("  1. Write a report: marketlens report --kb {}", output.display());
    println!("  2. Ask questions: marketlens query --kb {}", output.display());

    Ok(())
}
