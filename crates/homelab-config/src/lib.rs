//! Configuration for the Homelab API.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (platform user config + project-local overrides)
//! - Per-upstream sections (`[nas]`, `[pihole]`) and cache settings (`[cache]`)
//! - Secret resolution (env var → Docker secret file → config file)
//!
//! A [`HomelabConfig`] is loaded once at startup and passed by reference to
//! whatever needs it.

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_from_path,
    load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{DOCKER_SECRETS_DIR, ResolvedSecret, SecretResolver, SecretSource};
pub use types::*;
