use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lookalike::{cli, config, server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lookalike", version, about = "Visual similarity search over an image dataset")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP match server
    Serve,
    /// Rebuild the feature store from the dataset directory
    Index {
        /// Dataset root (one subdirectory per category)
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Directory stored paths are made relative to
        #[arg(long)]
        asset_root: Option<PathBuf>,
    },
    /// Find the images most similar to a local file
    Search {
        image: PathBuf,
        /// Only return matches from this category (case-insensitive)
        #[arg(long)]
        category: Option<String>,
        /// Minimum cosine similarity (default 0.4)
        #[arg(long)]
        threshold: Option<String>,
    },
    /// Show feature store statistics
    Stats,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download an ONNX model to ~/.lookalike/models/
    Download {
        /// URL of the ONNX feature-extractor export
        #[arg(long)]
        url: String,
        /// Replace an existing model file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::LookalikeConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve(config).await?;
        }
        Command::Index {
            dataset,
            asset_root,
        } => {
            tokio::task::spawn_blocking(move || cli::index::index(&config, dataset, asset_root))
                .await??;
        }
        Command::Search {
            image,
            category,
            threshold,
        } => {
            cli::search::search(&config, &image, category, threshold).await?;
        }
        Command::Stats => {
            cli::stats::stats(&config)?;
        }
        Command::Model { action } => match action {
            ModelAction::Download { url, force } => {
                cli::model_download(&config.embedding, &url, force).await?;
            }
        },
    }

    Ok(())
}
