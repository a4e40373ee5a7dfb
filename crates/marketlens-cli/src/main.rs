//! Marketlens CLI - App-market insight engine
//!
//! Usage:
//!   marketlens generate --data apps.csv     Analyze and build the knowledge base
//!   marketlens report                       Write the executive report
//!   marketlens query "How should I price?"  Ask the knowledge base
//!   marketlens backend test                 Check the configured backends

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Analyze { data } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_analyze(&config, &data)
        }
        Commands::Generate { data, output } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_generate(&config, &data, &output).await
        }
        Commands::Report { kb, output_dir } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_report(&config, &kb, &output_dir).await
        }
        Commands::Query { kb, question } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_query(&config, &kb, question.as_deref()).await
        }
        Commands::Backend { action } => match action {
            BackendAction::Test => {
                let config = commands::load_config(cli.config.as_deref())?;
                commands::cmd_backend_test(&config).await
            }
        },
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
