//! Query command implementations

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use marketlens_core::{Config, EmbeddingClient, KnowledgeBase, QueryEngine};

use super::core::{generation_client, load_prompts};
use super::truncate;

/// Load the knowledge base and build a ready query engine
pub async fn build_engine(config: &Config, kb_path: &Path) -> Result<QueryEngine> {
    let kb = KnowledgeBase::load(kb_path).context("Failed to load knowledge base")?;
    let embedder = EmbeddingClient::from_config(&config.embedding);

    println!(
        "🔎 Indexing {} insights with {} embeddings...",
        kb.len(),
        embedder.backend_name()
    );

    let engine = QueryEngine::build(
        &kb,
        embedder,
        Some(generation_client(config)),
        load_prompts()?,
        config.query.top_k,
    )
    .await;

    if !engine.is_ready() {
        bail!(
            "Query engine is not ready: {}. Run 'marketlens generate' and 'marketlens backend test'.",
            engine.not_ready_reason().unwrap_or("unknown reason")
        );
    }
    Ok(engine)
}

pub async fn cmd_query(config: &Config, kb_path: &Path, question: Option<&str>) -> Result<()> {
    let engine = build_engine(config, kb_path).await?;

    match question {
        Some(q) => {
            print_sources(&engine, q).await;
            println!();
            println!("{}", engine.answer(q).await);
            Ok(())
        }
        None => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_session(&engine, stdin.lock(), stdout.lock()).await
        }
    }
}

/// Interactive question loop until `exit`, `quit` or end of input
pub async fn run_session<R, W>(engine: &QueryEngine, input: R, mut output: W) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "💬 Ask about the app market. Type 'exit' or 'quit' to leave.")?;

    let mut lines = input.lines();
    loop {
        write!(output, "\n> ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read question")?;
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let answer = engine.answer(question).await;
        writeln!(output, "\n{}", answer)?;
    }

    writeln!(output, "👋 Goodbye")?;
    Ok(())
}

async fn print_sources(engine: &QueryEngine, question: &str) {
    if let Ok(hits) = engine.retrieve(question).await {
        println!("   Sources:");
        for hit in hits {
            println!(
                "   {} ({:.2}) {}",
                hit.record.id,
                hit.score,
                truncate(&hit.record.insight_text, 60)
            );
        }
    }
}
