//! Flood Classifier
//!
//! A machine learning-based tool for classifying satellite images as
//! flooded or dry, from dataset preparation to interactive analysis.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::CONFIG;
use tracing_subscriber::EnvFilter;

mod alert_log;
mod commands;

/// Flood Classifier
#[derive(Parser)]
#[command(name = "flood-classifier")]
#[command(about = "CNN-based flood classifier for satellite images")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset bundle from labeled image folders
    BuildDataset {
        /// Root folder containing the 'seca' and 'alagada' subfolders
        #[arg(short, long)]
        dataset_dir: Option<PathBuf>,

        /// Output path for the dataset bundle
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train the convolutional classifier on a dataset bundle
    Train {
        /// Path to the dataset bundle produced by build-dataset
        #[arg(short, long)]
        bundle: Option<PathBuf>,

        /// Base path for the trained model checkpoint
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long, default_value = "15")]
        epochs: usize,

        /// Batch size for training
        #[arg(long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.0001")]
        learning_rate: f64,
    },

    /// Interactively classify satellite images and append results to the alert log
    Analyze {
        /// Base path of the trained model checkpoint
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Path of the CSV alert log
        #[arg(short, long)]
        log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::BuildDataset {
            dataset_dir,
            output,
        } => {
            let dataset_dir = dataset_dir.unwrap_or_else(|| CONFIG.dataset_dir.clone());
            let output = output.unwrap_or_else(|| CONFIG.bundle_path.clone());
            commands::build_dataset::run(&dataset_dir, &output)?;
        }
        Commands::Train {
            bundle,
            model,
            epochs,
            batch_size,
            learning_rate,
        } => {
            let bundle = bundle.unwrap_or_else(|| CONFIG.bundle_path.clone());
            let model = model.unwrap_or_else(|| CONFIG.model_path.clone());
            commands::train::run(&bundle, &model, epochs, batch_size, learning_rate)?;
        }
        Commands::Analyze { model, log } => {
            let model = model.unwrap_or_else(|| CONFIG.model_path.clone());
            let log = log.unwrap_or_else(|| CONFIG.log_path.clone());
            commands::analyze::run(&model, &log)?;
        }
    }

    Ok(())
}
