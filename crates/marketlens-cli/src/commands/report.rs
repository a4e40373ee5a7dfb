//! Report command implementation

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use marketlens_core::{Config, KnowledgeBase, ReportSynthesizer};

use super::core::{generation_client, load_prompts};

/// Synthesize the executive report and write it under `output_dir`
pub async fn cmd_report(config: &Config, kb_path: &Path, output_dir: &Path) -> Result<()> {
    println!("📄 Building report from {}...", kb_path.display());

    let kb = KnowledgeBase::load(kb_path).context("Failed to load knowledge base")?;
    println!("   {} insights loaded", kb.len());
    for (category, count) in kb.counts_by_category() {
        println!("   • {}: {}", category, count);
    }

    let synthesizer = ReportSynthesizer::new(Some(generation_client(config)), load_prompts()?)
        .with_summary_seed_size(config.report.summary_seed_size);

    let now = Local::now();
    let report = synthesizer.synthesize_at(&kb, now).await;
    let path = report
        .write_to_dir(output_dir, now)
        .with_context(|| format!("Failed to write report to {}", output_dir.display()))?;

    if !kb.is_empty() {
        if !report.summary_generated {
            println!("   ⚠️  Executive summary used placeholder text");
        }
        if !report.action_plan_generated {
            println!("   ⚠️  Action plan used placeholder text");
        }
    }

    println!("✅ Report written to {}", path.display());
    Ok(())
}
