//! CLI command handlers.

pub mod cache;
pub mod config;
pub mod serve;

use homelab_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration and where it came from.
    pub config: LoadedConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}
