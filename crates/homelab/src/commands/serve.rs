//! Serve command - run the HTTP API.

use anyhow::Result;
use clap::Args;
use homelab_config::SecretResolver;
use homelab_server::{AppState, Server, connect_store};
use tracing::info;

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides `[server] bind`)
    #[arg(long, env = "HOMELAB_BIND")]
    pub bind: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config.config;

    let mut server_config = config.server();
    if let Some(bind) = args.bind {
        server_config.bind = bind;
    }

    let cache_config = config.cache();
    let store = connect_store(&cache_config).await?;
    info!(
        backend = store.name(),
        degrade_on_read_error = cache_config.degrade_on_read_error,
        "Response cache ready"
    );

    let state = AppState::from_config(config, store, &SecretResolver::new())?;
    if state.nas.is_none() && state.pihole.is_none() {
        tracing::warn!("No upstreams configured; only /health and /cache will answer");
    }

    Server::new(state, server_config).run().await?;
    Ok(())
}
