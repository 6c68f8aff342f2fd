//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration, one optional section per concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomelabConfig {
    /// HTTP server.
    pub server: Option<ServerConfig>,
    /// Response cache.
    pub cache: Option<CacheConfig>,
    /// Synology DSM upstream.
    pub nas: Option<NasConfig>,
    /// Pi-hole upstream.
    pub pihole: Option<PiholeConfig>,
    /// Log output.
    pub logging: Option<LoggingConfig>,
}

impl HomelabConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not merged field by field.
    pub fn merge(&mut self, other: HomelabConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.nas.is_some() {
            self.nas = other.nas;
        }
        if other.pihole.is_some() {
            self.pihole = other.pihole;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Server settings, or defaults.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Cache settings, or defaults.
    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    /// Logging settings, or defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values that parse but cannot work.
    ///
    /// Every cached namespace needs a non-zero TTL: the store refuses
    /// zero-TTL writes, which would otherwise surface only after each
    /// upstream call had already been made.
    pub fn validate(&self) -> Result<()> {
        if let Some(nas) = &self.nas {
            require_ttl("nas.versions_ttl_secs", nas.versions_ttl_secs)?;
            require_ttl("nas.folders_ttl_secs", nas.folders_ttl_secs)?;
            require_ttl("nas.system_ttl_secs", nas.system_ttl_secs)?;
        }
        if let Some(pihole) = &self.pihole {
            require_ttl("pihole.blocking_ttl_secs", pihole.blocking_ttl_secs)?;
            require_ttl("pihole.recent_ttl_secs", pihole.recent_ttl_secs)?;
        }
        Ok(())
    }
}

fn require_ttl(field: &'static str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "cache TTL must be at least one second",
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Enable per-request trace logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            cors_origins: Vec::new(),
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Which keyed store backs the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Networked Redis store.
    #[default]
    Redis,
    /// In-process store, lost on restart.
    Memory,
}

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store backend.
    pub backend: CacheBackend,
    /// Redis connection URL.
    pub url: String,
    /// Prefix prepended to every key.
    pub key_prefix: String,
    /// Treat store read failures as misses instead of errors.
    pub degrade_on_read_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: String::new(),
            degrade_on_read_error: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstreams
// ─────────────────────────────────────────────────────────────────────────────

/// Synology DSM configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NasConfig {
    /// Full URL of the DSM `entry.cgi` endpoint.
    pub base_url: String,
    /// Login account.
    pub username: String,
    /// Login password. Prefer the `NAS_API_PASSWORD` env var or Docker secret.
    pub password: Option<String>,
    /// Accept self-signed certificates.
    pub accept_invalid_certs: bool,
    /// TTL of negotiated API versions, in seconds.
    pub versions_ttl_secs: u64,
    /// TTL of folder listings, in seconds.
    pub folders_ttl_secs: u64,
    /// TTL of the system overview, in seconds.
    pub system_ttl_secs: u64,
    /// Status polls allowed per directory-size task.
    pub poll_max_attempts: u32,
    /// Delay unit between status polls, in milliseconds.
    pub poll_base_delay_ms: u64,
}

impl Default for NasConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: None,
            accept_invalid_certs: true,
            versions_ttl_secs: 7 * 24 * 60 * 60,
            folders_ttl_secs: 180,
            system_ttl_secs: 60,
            poll_max_attempts: 20,
            poll_base_delay_ms: 250,
        }
    }
}

impl NasConfig {
    /// TTL of negotiated API versions.
    pub fn versions_ttl(&self) -> Duration {
        Duration::from_secs(self.versions_ttl_secs)
    }

    /// TTL of folder listings.
    pub fn folders_ttl(&self) -> Duration {
        Duration::from_secs(self.folders_ttl_secs)
    }

    /// TTL of the system overview.
    pub fn system_ttl(&self) -> Duration {
        Duration::from_secs(self.system_ttl_secs)
    }

    /// Delay unit between status polls.
    pub fn poll_base_delay(&self) -> Duration {
        Duration::from_millis(self.poll_base_delay_ms)
    }
}

/// Pi-hole configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiholeConfig {
    /// Base URL, e.g. `https://pi.hole`.
    pub base_url: String,
    /// Web password. Prefer the `PIHOLE_API_PASSWORD` env var or Docker secret.
    pub password: Option<String>,
    /// Accept self-signed certificates.
    pub accept_invalid_certs: bool,
    /// TTL of the blocking status, in seconds.
    pub blocking_ttl_secs: u64,
    /// TTL of the 24-hour query summary, in seconds.
    pub recent_ttl_secs: u64,
}

impl Default for PiholeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            password: None,
            accept_invalid_certs: true,
            blocking_ttl_secs: 30,
            recent_ttl_secs: 30,
        }
    }
}

impl PiholeConfig {
    /// TTL of the blocking status.
    pub fn blocking_ttl(&self) -> Duration {
        Duration::from_secs(self.blocking_ttl_secs)
    }

    /// TTL of the 24-hour query summary.
    pub fn recent_ttl(&self) -> Duration {
        Duration::from_secs(self.recent_ttl_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rotated JSON log files. `None` uses the platform
    /// data directory.
    pub dir: Option<PathBuf>,
    /// Write the JSON file log at all.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            file: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = HomelabConfig::from_toml("").unwrap();
        assert_eq!(config, HomelabConfig::new());
        assert_eq!(config.server().bind, DEFAULT_BIND);
        assert_eq!(config.cache().backend, CacheBackend::Redis);
        assert!(!config.cache().degrade_on_read_error);
    }

    #[test]
    fn test_parse_full_config() {
        let config = HomelabConfig::from_toml(
            r#"
[server]
bind = "0.0.0.0:9000"
cors_origins = ["http://localhost:3000"]

[cache]
backend = "memory"
key_prefix = "homelab:"

[nas]
base_url = "https://nas.local:5001/webapi/entry.cgi"
username = "metrics"
folders_ttl_secs = 60

[pihole]
base_url = "https://pi.hole"
"#,
        )
        .unwrap();

        assert_eq!(config.server().bind, "0.0.0.0:9000");
        assert_eq!(config.cache().backend, CacheBackend::Memory);
        assert_eq!(config.cache().key_prefix, "homelab:");

        let nas = config.nas.as_ref().unwrap();
        assert_eq!(nas.username, "metrics");
        assert_eq!(nas.folders_ttl(), Duration::from_secs(60));
        assert_eq!(nas.versions_ttl(), Duration::from_secs(604_800));
        assert_eq!(nas.system_ttl(), Duration::from_secs(60));
        assert_eq!(nas.poll_max_attempts, 20);
        assert!(nas.password.is_none());

        let pihole = config.pihole.as_ref().unwrap();
        assert_eq!(pihole.blocking_ttl(), Duration::from_secs(30));
        assert_eq!(pihole.recent_ttl(), Duration::from_secs(30));
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = HomelabConfig::from_toml(
            r#"
[pihole]
base_url = "https://pi.hole"
blocking_ttl_secs = 0
"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "pihole.blocking_ttl_secs",
                ..
            }
        ));
        assert!(err.to_string().contains("pihole.blocking_ttl_secs"));
    }

    #[test]
    fn test_zero_ttl_in_absent_section_ignored() {
        let config = HomelabConfig::from_toml("[cache]\nbackend = \"memory\"\n").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_stale_default_ttl_key_is_dropped() {
        let config = HomelabConfig::from_toml(
            r#"
[cache]
backend = "memory"
default_ttl_secs = 0
"#,
        )
        .unwrap();

        config.validate().unwrap();
        assert!(!config.to_toml().unwrap().contains("default_ttl"));
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = HomelabConfig::from_toml(
            r#"
[server]
bind = "127.0.0.1:1"

[cache]
url = "redis://base"
"#,
        )
        .unwrap();
        let overlay = HomelabConfig::from_toml(
            r#"
[server]
bind = "127.0.0.1:2"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.server().bind, "127.0.0.1:2");
        assert_eq!(base.cache().url, "redis://base");
    }

    #[test]
    fn test_toml_roundtrip_keeps_sections() {
        let mut config = HomelabConfig::new();
        config.pihole = Some(PiholeConfig {
            base_url: "https://pi.hole".to_string(),
            ..Default::default()
        });

        let text = config.to_toml().unwrap();
        assert!(text.contains("[pihole]"));
        assert_eq!(HomelabConfig::from_toml(&text).unwrap(), config);
    }
}
