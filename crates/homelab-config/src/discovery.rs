//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/homelab/config.toml` (platform user config)
//! 2. `./homelab.toml` (project-local)
//!
//! An explicit `--config` path replaces discovery entirely.

use std::path::{Path, PathBuf};

use crate::{ConfigError, HomelabConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "homelab.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "homelab";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "HOMELAB_CONFIG_DIR";

/// One file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Merged configuration plus what went into it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Effective configuration.
    pub config: HomelabConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems worth logging once tracing is up.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `HOMELAB_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = HomelabConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    config.validate()?;
    check_plaintext_passwords(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load exactly one file, skipping discovery.
///
/// Unlike discovered layers, a missing or malformed explicit file is an error.
pub fn load_config_from_path(path: &Path) -> Result<LoadedConfig> {
    let config = load_config_file(path)?;
    config.validate()?;
    let mut warnings = Vec::new();
    check_plaintext_passwords(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings,
    })
}

/// Parse one TOML file.
pub fn load_config_file(path: &Path) -> Result<HomelabConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    HomelabConfig::from_toml(&contents)
}

/// Path of the user config file.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory.
///
/// Checks `HOMELAB_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge the file at `path` into `config` if it exists.
///
/// Missing files are skipped; unreadable or malformed ones become warnings.
fn load_layer(config: &mut HomelabConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };

    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

fn check_plaintext_passwords(config: &HomelabConfig, warnings: &mut Vec<String>) {
    if config.nas.as_ref().is_some_and(|n| n.password.is_some()) {
        warnings.push(
            "[nas] contains a plaintext password. \
             Consider NAS_API_PASSWORD or /run/secrets/nas_api_password instead."
                .to_string(),
        );
    }
    if config.pihole.as_ref().is_some_and(|p| p.password.is_some()) {
        warnings.push(
            "[pihole] contains a plaintext password. \
             Consider PIHOLE_API_PASSWORD or /run/secrets/pihole_api_password instead."
                .to_string(),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
