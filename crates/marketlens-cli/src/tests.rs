//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::Path;

use marketlens_core::{
    report::EMPTY_REPORT, AnalysisKind, Config, GenerationBackendKind, KnowledgeBase,
};
use tempfile::tempdir;

use crate::commands::{self, truncate};

/// Offline config: mock generation, hashing embeddings
fn test_config() -> Config {
    let mut config = Config::default();
    config.generation.backend = GenerationBackendKind::Mock;
    config
}

/// 25 productivity apps, 12 of them established paid apps
fn write_dataset(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from(
        "App,Category,Rating,Reviews,Installs,Type,Price,Genres,Sentiment_Polarity\n",
    );
    for i in 0..12 {
        let (price, rating) = match i % 3 {
            0 => ("$0.99", 3.8),
            1 => ("$2.99", 4.7),
            _ => ("$5.99", 4.0),
        };
        csv.push_str(&format!(
            "Paid {i},PRODUCTIVITY,{rating},{},\"10,000+\",Paid,{price},Productivity,0.3\n",
            200 + i * 10
        ));
    }
    for i in 0..13 {
        csv.push_str(&format!(
            "Free {i},PRODUCTIVITY,4.2,{},\"1,000,000+\",Free,0,Productivity,0.1\n",
            5_000 + i * 100
        ));
    }

    let path = dir.join("apps.csv");
    fs::write(&path, csv).unwrap();
    path
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer sentence", 10), "a longe...");
    assert_eq!(truncate("ééééééé", 5), "éé...");
}

#[test]
fn test_generation_client_follows_config() {
    assert_eq!(commands::generation_client(&test_config()).backend_name(), "mock");

    let mut config = test_config();
    config.generation.backend = GenerationBackendKind::Gemini;
    assert_eq!(commands::generation_client(&config).backend_name(), "gemini");
}

#[test]
fn test_family_counts() {
    use marketlens_core::RawFinding;

    let findings = vec![
        RawFinding::MarketOpportunity {
            category: "WEATHER".into(),
            avg_installs: 1_000_000.0,
            app_count: 30,
            opportunity_score: 33_333.3,
        },
        RawFinding::MarketOpportunity {
            category: "EVENTS".into(),
            avg_installs: 2_000_000.0,
            app_count: 25,
            opportunity_score: 80_000.0,
        },
    ];

    let counts = commands::family_counts(&findings);
    assert_eq!(counts.get(&AnalysisKind::MarketOpportunity), Some(&2));
    assert_eq!(counts.get(&AnalysisKind::Pricing), None);
}

// ========== Analyze / Generate Command Tests ==========

#[test]
fn test_cmd_analyze() {
    let dir = tempdir().unwrap();
    let data = write_dataset(dir.path());

    let result = commands::cmd_analyze(&test_config(), &data);
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cmd_generate_writes_knowledge_base() {
    let dir = tempdir().unwrap();
    let data = write_dataset(dir.path());
    let output = dir.path().join("out").join("generated_insights.json");

    let result = commands::cmd_generate(&test_config(), &data, &output).await;
    assert!(result.is_ok(), "{:?}", result);

    let kb = KnowledgeBase::load(&output).unwrap();
    assert!(!kb.is_empty());
    assert_eq!(kb.records()[0].id, "INSIGHT_001");
    assert_eq!(kb.degraded_count(), 0);
}

#[tokio::test]
async fn test_cmd_generate_missing_dataset_writes_nothing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("generated_insights.json");

    let result =
        commands::cmd_generate(&test_config(), &dir.path().join("missing.csv"), &output).await;

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("Could not load dataset"));
    assert!(!output.exists());
}

// ========== Report Command Tests ==========

#[tokio::test]
async fn test_cmd_report_writes_markdown() {
    let dir = tempdir().unwrap();
    let data = write_dataset(dir.path());
    let kb_path = dir.path().join("kb.json");
    let reports = dir.path().join("reports");

    commands::cmd_generate(&test_config(), &data, &kb_path)
        .await
        .unwrap();
    commands::cmd_report(&test_config(), &kb_path, &reports)
        .await
        .unwrap();

    let files: Vec<_> = fs::read_dir(&reports).unwrap().collect();
    assert_eq!(files.len(), 1);

    let path = files[0].as_ref().unwrap().path();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("App_Success_Report_") && name.ends_with(".md"));

    let markdown = fs::read_to_string(&path).unwrap();
    assert!(markdown.starts_with("# App Store Success Intelligence Report"));
}

#[tokio::test]
async fn test_cmd_report_empty_knowledge_base() {
    let dir = tempdir().unwrap();
    let kb_path = dir.path().join("kb.json");
    KnowledgeBase::default().save(&kb_path).unwrap();

    commands::cmd_report(&test_config(), &kb_path, dir.path())
        .await
        .unwrap();

    let report = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().ends_with(".md"))
        .unwrap();
    assert_eq!(fs::read_to_string(report.path()).unwrap(), EMPTY_REPORT);
}

#[tokio::test]
async fn test_cmd_report_missing_knowledge_base() {
    let dir = tempdir().unwrap();
    let result =
        commands::cmd_report(&test_config(), &dir.path().join("nope.json"), dir.path()).await;
    assert!(result.is_err());
}

// ========== Query Command Tests ==========

#[tokio::test]
async fn test_query_engine_not_ready_for_empty_knowledge_base() {
    let dir = tempdir().unwrap();
    let kb_path = dir.path().join("kb.json");
    KnowledgeBase::default().save(&kb_path).unwrap();

    let result = commands::build_engine(&test_config(), &kb_path).await;
    let message = format!("{:#}", result.err().unwrap());
    assert!(message.contains("not ready"));
    assert!(message.contains("knowledge base is empty"));
}

#[tokio::test]
async fn test_cmd_query_single_question() {
    let dir = tempdir().unwrap();
    let data = write_dataset(dir.path());
    let kb_path = dir.path().join("kb.json");

    commands::cmd_generate(&test_config(), &data, &kb_path)
        .await
        .unwrap();

    let result =
        commands::cmd_query(&test_config(), &kb_path, Some("What should productivity apps cost?"))
            .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_query_session_skips_blank_lines_and_stops_on_quit() {
    let dir = tempdir().unwrap();
    let data = write_dataset(dir.path());
    let kb_path = dir.path().join("kb.json");

    commands::cmd_generate(&test_config(), &data, &kb_path)
        .await
        .unwrap();
    let engine = commands::build_engine(&test_config(), &kb_path)
        .await
        .unwrap();

    let input = "\n   \nWhich price range works best?\nQUIT\nNever asked?\n";
    let mut output = Vec::new();
    commands::run_session(&engine, input.as_bytes(), &mut output)
        .await
        .unwrap();

    let transcript = String::from_utf8(output).unwrap();
    assert_eq!(transcript.matches("Mock response").count(), 1);
    assert!(transcript.ends_with("👋 Goodbye\n"));
}

#[tokio::test]
async fn test_query_session_ends_at_end_of_input() {
    let dir = tempdir().unwrap();
    let data = write_dataset(dir.path());
    let kb_path = dir.path().join("kb.json");

    commands::cmd_generate(&test_config(), &data, &kb_path)
        .await
        .unwrap();
    let engine = commands::build_engine(&test_config(), &kb_path)
        .await
        .unwrap();

    let mut output = Vec::new();
    commands::run_session(&engine, "".as_bytes(), &mut output)
        .await
        .unwrap();
    assert!(String::from_utf8(output).unwrap().contains("Goodbye"));
}

// ========== Backend / Prompts Command Tests ==========

#[tokio::test]
async fn test_cmd_backend_test_mock() {
    let result = commands::cmd_backend_test(&test_config()).await;
    assert!(result.is_ok());
}

#[test]
fn test_cmd_prompts_list() {
    assert!(commands::cmd_prompts_list().is_ok());
}

#[test]
fn test_cmd_prompts_show() {
    assert!(commands::cmd_prompts_show("pricing_insight").is_ok());
    assert!(commands::cmd_prompts_show("no_such_prompt").is_ok());
}

#[test]
fn test_cmd_prompts_path() {
    assert!(commands::cmd_prompts_path().is_ok());
}
