//! Backend connectivity check

use anyhow::Result;
use marketlens_core::{AIBackend, AIClient, Config, EmbeddingBackend, EmbeddingClient};

const PROBE_TEXT: &str = "Pricing strategy for productivity apps";

/// Show the resolved backends and check each one responds
pub async fn cmd_backend_test(config: &Config) -> Result<()> {
    println!("🔍 Testing backends...\n");

    let ai = AIClient::from_config(&config.generation);
    println!("  Generation backend: {}", ai.backend_name());
    println!("  Host: {}", ai.host());
    println!("  Model: {}", ai.model());
    if config.generation.api_key.is_some() {
        println!("  API key: set");
    }

    print!("\nChecking generation backend... ");
    let generation_ok = ai.health_check().await;
    if generation_ok {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("   Insights will use template text and queries cannot be answered.");
    }

    let embedder = EmbeddingClient::from_config(&config.embedding);
    println!("\n  Embedding backend: {}", embedder.backend_name());
    println!("  Model: {}", embedder.model());

    print!("\nEmbedding a probe string... ");
    let embedding_ok = match embedder.embed(&[PROBE_TEXT.to_string()]).await {
        Ok(vectors) => {
            let dimension = vectors.first().map_or(0, |v| v.len());
            println!("✅ {} dimensions", dimension);
            true
        }
        Err(e) => {
            println!("❌ {}", e);
            false
        }
    };

    println!();
    if generation_ok && embedding_ok {
        println!("✅ All backends ready");
    } else {
        println!("⚠️  Some backends are unavailable");
        println!("\nConfigure backends with:");
        println!("  MARKETLENS_AI_BACKEND, MARKETLENS_AI_HOST, MARKETLENS_AI_MODEL");
        println!("  MARKETLENS_EMBEDDING_BACKEND, MARKETLENS_EMBEDDING_HOST");
        println!("  or a config file passed with --config");
    }

    Ok(())
}
