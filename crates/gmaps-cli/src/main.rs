mod extract;
mod search;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gmaps-cli")]
#[command(about = "Map-search scraping engine command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one search job against a real browser and print the result JSON.
    Search {
        /// Free-text search query.
        query: String,
        /// Stop after this many places.
        #[arg(long)]
        max_places: Option<usize>,
        /// Interface language code.
        #[arg(long, default_value = gmaps_core::request::DEFAULT_LANG)]
        lang: String,
        /// Show the browser window.
        #[arg(long)]
        headful: bool,
        /// Maximum concurrently open browser sessions.
        #[arg(long, default_value_t = gmaps_core::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        #[arg(long)]
        pretty: bool,
    },
    /// Run the extraction pipeline over a saved place page.
    Extract {
        file: PathBuf,
        /// URL the page was captured from.
        #[arg(long)]
        link: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = gmaps_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Search {
            query,
            max_places,
            lang,
            headful,
            concurrency,
            pretty,
        } => {
            let args = search::SearchArgs {
                query,
                max_places,
                lang,
                headless: !headful,
                concurrency,
                pretty,
            };
            search::run_search_command(&config, args).await
        }
        Commands::Extract { file, link } => {
            extract::run_extract_command(&file, link.as_deref()).await
        }
    }
}
