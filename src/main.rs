use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mechanic_scraper::assembler::CorpusAssembler;
use mechanic_scraper::config::Config;
use mechanic_scraper::fetch::HttpFetcher;
use mechanic_scraper::pairs;
use mechanic_scraper::storage::open_store;

#[derive(Parser)]
#[command(name = "mechanic-scraper", version, about = "Scrape a mechanic forum into an instruction-tuning corpus")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the forum and persist the corpus
    Scrape,
    /// Derive instruction pairs from a persisted corpus
    Pairs {
        /// Corpus JSON file
        #[arg(short, long)]
        input: PathBuf,
        /// Output JSON Lines file
        #[arg(short, long)]
        output: PathBuf,
        /// Earlier responses kept as context (defaults to CONTEXT_WINDOW)
        #[arg(short, long)]
        window: Option<usize>,
        /// Include the rendered prompt with each pair
        #[arg(long)]
        prompts: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::Scrape => scrape(config).await,
        Command::Pairs {
            input,
            output,
            window,
            prompts,
        } => {
            let window = window.unwrap_or(config.context_window);
            let corpus = pairs::load_corpus(&input).await?;
            let dataset = pairs::derive_dataset(&corpus, window);
            info!(
                discussions = corpus.len(),
                pairs = dataset.len(),
                window,
                "Derived instruction pairs"
            );
            pairs::write_pairs_jsonl(&output, &dataset, prompts).await
        }
    }
}

async fn scrape(config: Config) -> Result<()> {
    info!(
        listing_url = %config.listing_url,
        first_page = config.listing_first_page,
        last_page = config.listing_last_page,
        "Starting mechanic-scraper"
    );

    let fetcher = HttpFetcher::new(&config).context("Failed to build HTTP client")?;
    let store = open_store(&config)?;
    let assembler = CorpusAssembler::new(config, Arc::new(fetcher), store);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, saving completed discussions");
        signal_token.cancel();
    });

    let report = assembler.run(&cancel).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to render run report")?
    );
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mechanic_scraper=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
