//! Secret resolution for upstream credentials.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Docker secret file (`/run/secrets/<name>`, first line)
//! 3. Config file (with warning)

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{ConfigError, Result};

/// Directory Docker mounts secrets into.
pub const DOCKER_SECRETS_DIR: &str = "/run/secrets";

/// A secret value with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Secret file mounted by the container runtime.
    SecretFile(PathBuf),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::SecretFile(path) => write!(f, "secret file {}", path.display()),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolves named secrets through the env → file → config chain.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    secrets_dir: PathBuf,
}

impl Default for SecretResolver {
    fn default() -> Self {
        Self {
            secrets_dir: PathBuf::from(DOCKER_SECRETS_DIR),
        }
    }
}

impl SecretResolver {
    /// Resolver reading secret files from [`DOCKER_SECRETS_DIR`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver reading secret files from `dir`.
    pub fn with_secrets_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            secrets_dir: dir.into(),
        }
    }

    /// Directory secret files are read from.
    pub fn secrets_dir(&self) -> &Path {
        &self.secrets_dir
    }

    /// Resolve `name`, checking `env_var`, then `<secrets_dir>/<name>`, then
    /// `config_value`. Empty values count as absent.
    pub fn resolve(
        &self,
        name: &str,
        env_var: &str,
        config_value: Option<&str>,
    ) -> Option<ResolvedSecret> {
        if let Ok(value) = std::env::var(env_var)
            && !value.is_empty()
        {
            return Some(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(env_var.to_string()),
            });
        }

        let path = self.secrets_dir.join(name);
        if let Some(value) = read_secret_file(&path) {
            return Some(ResolvedSecret {
                value,
                source: SecretSource::SecretFile(path),
            });
        }

        let value = config_value.filter(|v| !v.is_empty())?;
        warn!(secret = name, "Using plaintext secret from config file");
        Some(ResolvedSecret {
            value: value.to_string(),
            source: SecretSource::ConfigFile,
        })
    }

    /// Like [`resolve`](Self::resolve), but a missing secret is an error.
    pub fn require(
        &self,
        name: &str,
        env_var: &str,
        config_value: Option<&str>,
    ) -> Result<ResolvedSecret> {
        self.resolve(name, env_var, config_value)
            .ok_or_else(|| ConfigError::SecretNotFound {
                name: name.to_string(),
                env_var: env_var.to_string(),
            })
    }
}

fn read_secret_file(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let first = contents.lines().next()?.trim_end_matches('\r');
    if first.is_empty() {
        return None;
    }
    Some(first.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
