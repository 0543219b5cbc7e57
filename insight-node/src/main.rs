//! # Insight CLI
//!
//! Command-line interface and HTTP service for the Insight result cache.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use insight_node::commands::{self, config_cmd::ConfigAction};
use insight_node::AppContext;

/// CLI structure
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(about = "Insight - result cache with bounded-concurrency batch computation")]
#[command(version)]
struct Cli {
    /// Output JSON format
    #[arg(long, global = true, help = "Output in JSON format")]
    json: bool,

    /// Configuration file (defaults to INSIGHT_CONFIG, ./insight.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address, overrides server.bind_address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Batch similar-product suggestions
    Batch {
        /// Products to process
        #[arg(required = true)]
        products: Vec<String>,
        /// Maximum concurrent producers
        #[arg(short = 'w', long)]
        max_workers: Option<usize>,
        /// Skip the cache entirely
        #[arg(long)]
        no_cache: bool,
    },

    /// Batch market analysis with optional prices
    Market {
        /// Products to process
        #[arg(required = true)]
        products: Vec<String>,
        /// Prices matched to products by position, padded with batch.default_price
        #[arg(short, long = "price")]
        prices: Vec<f64>,
        /// Maximum concurrent producers
        #[arg(short = 'w', long)]
        max_workers: Option<usize>,
        /// Skip the cache entirely
        #[arg(long)]
        no_cache: bool,
    },

    /// Show cache statistics
    Stats,

    /// Remove expired and corrupt cache entries
    Sweep,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run_command(cli).await {
        Ok(_) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    let json = cli.json;

    match cli.command {
        Commands::Config { action } => commands::config_cmd::handle_config(action, config_path, json),
        Commands::Serve { bind } => {
            let ctx = AppContext::load(config_path).await?;
            commands::serve::serve(ctx, bind).await
        }
        Commands::Batch {
            products,
            max_workers,
            no_cache,
        } => {
            let ctx = AppContext::load(config_path).await?;
            commands::batch::run_similar(&ctx, &products, max_workers, no_cache, json).await
        }
        Commands::Market {
            products,
            prices,
            max_workers,
            no_cache,
        } => {
            let ctx = AppContext::load(config_path).await?;
            commands::batch::run_market(&ctx, &products, &prices, max_workers, no_cache, json).await
        }
        Commands::Stats => {
            let ctx = AppContext::load(config_path).await?;
            commands::cache::show_stats(&ctx, json).await
        }
        Commands::Sweep => {
            let ctx = AppContext::load(config_path).await?;
            commands::cache::sweep(&ctx, json).await
        }
    }
}
