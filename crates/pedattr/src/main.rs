//! pedattr CLI - Pedestrian attribute recognition from the command line.
//!
//! Loads a trained backbone + attribute head once and scores pedestrian
//! photos: one probability per attribute, printed as JSON. Optionally writes
//! an annotated copy of each image listing the attributes it recognized.
//!
//! # Usage
//!
//! ```bash
//! # Score a single image (a path, or an id inside the upload directory)
//! pedattr score walker.jpg --annotate
//!
//! # Score a directory
//! pedattr score ./static/uploads/ --output results.jsonl --format jsonl
//!
//! # Long-running mode: one image id per stdin line, one JSON line back
//! pedattr stream < ids.txt
//!
//! # List backbones and view configuration
//! pedattr backbones
//! pedattr config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// pedattr - Pedestrian attribute recognition inference.
#[derive(Parser, Debug)]
#[command(name = "pedattr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "PEDATTR_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: cli::Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Score images and print per-attribute probabilities
    Score(cli::score::ScoreArgs),

    /// Read image ids from stdin and score each one
    Stream(cli::stream::StreamArgs),

    /// List the available backbones
    Backbones,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = cli::effective_config(cli.config.as_deref(), &cli.overrides)?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs)?;

    tracing::debug!("pedattr v{}", pedattr_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Score(args) => cli::score::execute(args, config),
        Commands::Stream(args) => cli::stream::execute(args, config),
        Commands::Backbones => cli::backbones::execute(),
        Commands::Config(args) => cli::config::execute(args, config, cli.config),
    }
}
