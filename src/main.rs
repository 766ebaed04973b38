mod api;
mod cli;
mod config;
mod error;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::Metric;
use crate::services::posts::PostQuery;

#[derive(Parser)]
#[command(name = "bracketlens")]
#[command(about = "March Madness seed, classification and correlation analytics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Best team per seed for one season
    Seeds {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, default_value = "net")]
        metric: Metric,
    },
    /// Play back the seed race across seasons
    Race {
        /// Milliseconds between seasons
        #[arg(long)]
        cadence_ms: Option<u64>,
    },
    /// Correlation heatmaps for one season
    Heatmap {
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Best team per tournament finish
    Classify {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, default_value = "net")]
        metric: Metric,
    },
    /// Metric against net rating for seeded teams
    Factors {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, default_value = "offensive")]
        metric: Metric,
    },
    /// Query a team's seasons
    Team {
        #[arg(short, long)]
        name: String,
    },
    /// List synced blog posts
    Posts {
        #[arg(short = 'q', long, default_value = "")]
        search: String,
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Export best-per-seed aggregates
    Export {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, default_value = "net")]
        metric: Metric,
        #[arg(short, long, value_enum, default_value = "csv")]
        format: cli::ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Pull published posts from Notion into the content directory
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting BracketLens API server on port {}", port);
            api::serve(port, config).await?;
        }
        Some(Commands::Seeds { year, metric }) => {
            cli::show_seeds(&config, year.unwrap_or(config.default_year), metric).await?;
        }
        Some(Commands::Race { cadence_ms }) => {
            if let Some(ms) = cadence_ms.filter(|ms| *ms > 0) {
                config.playback_cadence = std::time::Duration::from_millis(ms);
            }
            cli::run_race(&config).await?;
        }
        Some(Commands::Heatmap { year }) => {
            cli::show_heatmaps(&config, year.unwrap_or(config.default_year)).await?;
        }
        Some(Commands::Classify { year, metric }) => {
            cli::show_classifications(&config, year.unwrap_or(config.default_year), metric).await?;
        }
        Some(Commands::Factors { year, metric }) => {
            cli::show_success_factors(&config, year.unwrap_or(config.default_year), metric).await?;
        }
        Some(Commands::Team { name }) => {
            tracing::info!("Querying team: {}", name);
            cli::query_team(&config, &name).await?;
        }
        Some(Commands::Posts { search, tag }) => {
            cli::list_posts(&config, PostQuery { search, tag }).await?;
        }
        Some(Commands::Export {
            year,
            metric,
            format,
            output,
        }) => {
            let year = year.unwrap_or(config.default_year);
            cli::export_seeds(&config, year, metric, format, output.as_deref()).await?;
        }
        Some(Commands::Sync) => {
            tracing::info!("Syncing content...");
            cli::sync_content(&config).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting BracketLens API server on port 3000");
            api::serve(3000, config).await?;
        }
    }

    Ok(())
}
