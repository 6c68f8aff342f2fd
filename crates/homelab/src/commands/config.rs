//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use homelab_config::HomelabConfig;

use super::Context;

const REDACTED: &str = "********";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration with passwords redacted
    Show,

    /// Show which config files were checked and loaded
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let sources = ctx.config.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for path in sources {
            println!("# Loaded from {}", path.display());
        }
    }
    println!();
    print!("{}", redacted(&ctx.config.config).to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    for source in &ctx.config.sources {
        let marker = if source.loaded { "loaded" } else { "missing" };
        println!("{:8} {}", marker, source.path.display());
    }
    Ok(())
}

fn redacted(config: &HomelabConfig) -> HomelabConfig {
    let hide = |password: &Option<String>| password.as_ref().map(|_| REDACTED.to_string());

    let mut config = config.clone();
    if let Some(nas) = config.nas.as_mut() {
        nas.password = hide(&nas.password);
    }
    if let Some(pihole) = config.pihole.as_mut() {
        pihole.password = hide(&pihole.password);
    }
    config
}
