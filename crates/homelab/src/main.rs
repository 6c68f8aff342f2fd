//! Homelab - cached metrics API for Synology DSM and Pi-hole
//!
//! Main entry point for the Homelab CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{cache, config, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Homelab - cached metrics API for Synology DSM and Pi-hole
#[derive(Parser)]
#[command(name = "homelab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "HOMELAB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve(serve::ServeArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),

    /// Response cache operations
    Cache(cache::CacheArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => homelab_config::load_config_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => homelab_config::load_config(None).context("Failed to load config")?,
    };

    // Held until exit so buffered file logs are flushed.
    let _guard = logging::init(&loaded.config.logging(), cli.verbose);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        config: loaded,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Cache(args) => cache::run(args, &ctx).await,
    }
}
