//! Cache command - response cache operations.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use homelab_server::connect_store;

use super::Context;

/// Arguments for the cache command.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Check that the configured cache store is reachable
    Ping,
}

/// Run the cache command.
pub async fn run(args: CacheArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CacheCommand::Ping => cmd_ping(ctx).await,
    }
}

async fn cmd_ping(ctx: &Context) -> Result<()> {
    let config = ctx.config.config.cache();
    let store = connect_store(&config)
        .await
        .with_context(|| format!("Cache store at {} is unreachable", config.url))?;
    store.ping().await.context("Cache store ping failed")?;

    if ctx.verbose {
        println!(
            "ok ({}, key prefix '{}', degrade on read error: {})",
            store.name(),
            config.key_prefix,
            config.degrade_on_read_error
        );
    } else {
        println!("ok ({})", store.name());
    }
    Ok(())
}
