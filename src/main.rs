//! Screenrag CLI entry point.

use anyhow::Result;
use clap::Parser;
use screenrag::cli::{commands, Cli, Commands};
use screenrag::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("screenrag={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Ingest => {
            commands::run_ingest(settings)?;
        }

        Commands::Chunk => {
            commands::run_chunk(settings)?;
        }

        Commands::Index { no_verify } => {
            commands::run_index(*no_verify, settings).await?;
        }

        Commands::Build { no_verify } => {
            commands::run_build(*no_verify, settings).await?;
        }

        Commands::Ask { question } => {
            commands::run_ask(question, settings).await?;
        }

        Commands::Chat => {
            commands::run_chat(settings).await?;
        }

        Commands::Search {
            query,
            top_k,
            min_similarity,
        } => {
            commands::run_search(query, *top_k, *min_similarity, settings).await?;
        }

        Commands::Stats => {
            commands::run_stats(settings)?;
        }

        Commands::Log { tail } => {
            commands::run_log(*tail, settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(config_path, &settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
