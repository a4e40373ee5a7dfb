//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Marketlens - Turn app-store data into queryable market intelligence
#[derive(Parser)]
#[command(name = "marketlens")]
#[command(about = "App-market insight engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the data directory, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the statistical analysis and print raw findings as JSON
    Analyze {
        /// Merged market dataset (CSV)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Analyze a dataset and write the knowledge base
    Generate {
        /// Merged market dataset (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Knowledge base output file
        #[arg(short, long, default_value = "generated_insights.json")]
        output: PathBuf,
    },

    /// Write an executive Markdown report from a knowledge base
    Report {
        /// Knowledge base file
        #[arg(long, default_value = "generated_insights.json")]
        kb: PathBuf,

        /// Directory for the report file
        #[arg(short, long, default_value = "reports")]
        output_dir: PathBuf,
    },

    /// Ask questions answered from the knowledge base
    ///
    /// Without a question, starts an interactive session.
    Query {
        /// Knowledge base file
        #[arg(long, default_value = "generated_insights.json")]
        kb: PathBuf,

        /// Question to answer
        question: Option<String>,
    },

    /// Text-generation and embedding backend commands
    Backend {
        #[command(subcommand)]
        action: BackendAction,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum BackendAction {
    /// Show the resolved backends and check they respond
    Test,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., pricing_insight, grounded_answer)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
