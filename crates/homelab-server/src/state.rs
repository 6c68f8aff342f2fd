//! Application state shared across handlers.

use std::sync::Arc;

use homelab_cache::{CacheAside, CacheError, MemoryStore, SharedFetch, SharedStore};
use homelab_config::{CacheBackend, CacheConfig, HomelabConfig, NasConfig, PiholeConfig, SecretResolver};
use homelab_session::{PollPolicy, SessionError, SessionScope, session_fetch};
use homelab_upstream::pihole::{blocking_status, recent_stats};
use homelab_upstream::synology::{folders_info, system_info};
use homelab_upstream::{
    BlockingStatus, FoldersInfo, PiholeClient, PiholeProtocol, RecentStats, SynologyClient,
    SynologyProtocol, SystemInfo, UpstreamError,
};
use tracing::info;

use crate::error::{Result, ServerError};

/// Error of a cached, session-wrapped upstream call.
pub type WrappedError = CacheError<SessionError<UpstreamError>>;

/// Folder listed when the request does not name one.
pub const DEFAULT_NAS_FOLDER: &str = "/";

/// Synology DSM routes' dependencies.
pub struct NasService {
    scope: SessionScope<SynologyProtocol>,
    folders: SharedFetch<FoldersInfo, WrappedError>,
    system: SharedFetch<SystemInfo, WrappedError>,
}

impl NasService {
    /// Wire the DSM protocol into its caches.
    ///
    /// API versions are cached under `nas:versions`, folder listings under
    /// `nas:folders` and the system overview under `nas:system`.
    pub fn new(store: SharedStore, protocol: SynologyProtocol, config: &NasConfig, degrade: bool) -> Self {
        let scope = SessionScope::new(protocol).with_metadata_cache(
            Arc::clone(&store),
            "nas:versions",
            config.versions_ttl(),
        );

        let system = CacheAside::new(Arc::clone(&store), "nas:system", config.system_ttl())
            .degrade_on_read_error(degrade)
            .wrap(session_fetch(scope.clone(), |live, _args| async move {
                system_info(&live).await
            }));

        let folders = CacheAside::new(store, "nas:folders", config.folders_ttl())
            .degrade_on_read_error(degrade)
            .wrap(session_fetch(scope.clone(), |live, args| async move {
                let folder = args
                    .get_str("folder")
                    .unwrap_or(DEFAULT_NAS_FOLDER)
                    .to_string();
                folders_info(&live, &folder).await
            }));

        Self {
            scope,
            folders: Arc::new(folders),
            system: Arc::new(system),
        }
    }

    /// Session scope, for metadata lookups.
    pub fn scope(&self) -> &SessionScope<SynologyProtocol> {
        &self.scope
    }

    /// Cached folder listing.
    pub fn folders(&self) -> &SharedFetch<FoldersInfo, WrappedError> {
        &self.folders
    }

    /// Cached system overview.
    pub fn system(&self) -> &SharedFetch<SystemInfo, WrappedError> {
        &self.system
    }
}

/// Pi-hole routes' dependencies.
pub struct PiholeService {
    blocking: SharedFetch<BlockingStatus, WrappedError>,
    recent: SharedFetch<RecentStats, WrappedError>,
}

impl PiholeService {
    /// Wire the Pi-hole protocol into its caches (`pihole:blocking`,
    /// `pihole:recent`).
    pub fn new(store: SharedStore, protocol: PiholeProtocol, config: &PiholeConfig, degrade: bool) -> Self {
        let scope = SessionScope::new(protocol);

        let blocking = CacheAside::new(Arc::clone(&store), "pihole:blocking", config.blocking_ttl())
            .degrade_on_read_error(degrade)
            .wrap(session_fetch(scope.clone(), |live, _args| async move {
                blocking_status(&live).await
            }));

        let recent = CacheAside::new(store, "pihole:recent", config.recent_ttl())
            .degrade_on_read_error(degrade)
            .wrap(session_fetch(scope, |live, _args| async move {
                recent_stats(&live).await
            }));

        Self {
            blocking: Arc::new(blocking),
            recent: Arc::new(recent),
        }
    }

    /// Cached blocking status.
    pub fn blocking(&self) -> &SharedFetch<BlockingStatus, WrappedError> {
        &self.blocking
    }

    /// Cached 24-hour query statistics.
    pub fn recent(&self) -> &SharedFetch<RecentStats, WrappedError> {
        &self.recent
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Response cache store.
    pub store: SharedStore,

    /// Synology routes (None when `[nas]` is absent).
    pub nas: Option<Arc<NasService>>,

    /// Pi-hole routes (None when `[pihole]` is absent).
    pub pihole: Option<Arc<PiholeService>>,
}

impl AppState {
    /// State with only the cache store wired.
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            nas: None,
            pihole: None,
        }
    }

    /// Add Synology routes.
    pub fn with_nas(mut self, service: NasService) -> Self {
        self.nas = Some(Arc::new(service));
        self
    }

    /// Add Pi-hole routes.
    pub fn with_pihole(mut self, service: PiholeService) -> Self {
        self.pihole = Some(Arc::new(service));
        self
    }

    /// Build the state from configuration.
    ///
    /// Upstreams without a config section are left out. A present section
    /// whose password cannot be resolved is an error, as is a zero TTL.
    pub fn from_config(config: &HomelabConfig, store: SharedStore, secrets: &SecretResolver) -> Result<Self> {
        config.validate()?;
        let degrade = config.cache().degrade_on_read_error;
        let mut state = Self::new(store);

        if let Some(nas) = &config.nas {
            let password = secrets.require(
                "nas_api_password",
                "NAS_API_PASSWORD",
                nas.password.as_deref(),
            )?;
            info!(source = %password.source, "Synology DSM configured");

            let client = SynologyClient::new(nas.base_url.clone(), nas.accept_invalid_certs)?
                .with_poll_policy(
                    PollPolicy::new()
                        .with_max_attempts(nas.poll_max_attempts)
                        .with_base_delay(nas.poll_base_delay()),
                );
            let protocol = SynologyProtocol::new(client, nas.username.clone(), password.value);
            let service = NasService::new(Arc::clone(&state.store), protocol, nas, degrade);
            state = state.with_nas(service);
        }

        if let Some(pihole) = &config.pihole {
            let password = secrets.require(
                "pihole_api_password",
                "PIHOLE_API_PASSWORD",
                pihole.password.as_deref(),
            )?;
            info!(source = %password.source, "Pi-hole configured");

            let client = PiholeClient::new(pihole.base_url.clone(), pihole.accept_invalid_certs)?;
            let protocol = PiholeProtocol::new(client, password.value);
            let service = PiholeService::new(Arc::clone(&state.store), protocol, pihole, degrade);
            state = state.with_pihole(service);
        }

        Ok(state)
    }
}

/// Open the configured cache store.
pub async fn connect_store(config: &CacheConfig) -> Result<SharedStore> {
    match config.backend {
        CacheBackend::Memory => {
            info!("Using in-memory cache store");
            Ok(Arc::new(MemoryStore::new()))
        }
        CacheBackend::Redis => {
            let store = homelab_cache::RedisStore::connect(&config.url, config.key_prefix.clone())
                .await
                .map_err(|e| ServerError::CacheUnavailable(e.to_string()))?;
            info!(url = %config.url, "Connected to Redis cache store");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_skips_absent_sections() {
        let state = AppState::from_config(
            &HomelabConfig::new(),
            Arc::new(MemoryStore::new()),
            &SecretResolver::new(),
        )
        .unwrap();

        assert!(state.nas.is_none());
        assert!(state.pihole.is_none());
    }

    #[test]
    fn test_from_config_reads_secret_file() {
        let secrets = TempDir::new().unwrap();
        fs::write(secrets.path().join("pihole_api_password"), "pw\n").unwrap();

        let config = HomelabConfig::from_toml(
            r#"
[pihole]
base_url = "https://pi.hole"
"#,
        )
        .unwrap();

        let state = AppState::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            &SecretResolver::with_secrets_dir(secrets.path()),
        )
        .unwrap();

        assert!(state.pihole.is_some());
    }

    #[test]
    fn test_from_config_requires_password() {
        let secrets = TempDir::new().unwrap();
        let config = HomelabConfig::from_toml(
            r#"
[nas]
base_url = "https://nas.local/webapi/entry.cgi"
username = "metrics"
"#,
        )
        .unwrap();

        let result = AppState::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            &SecretResolver::with_secrets_dir(secrets.path()),
        );

        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_from_config_rejects_zero_ttl() {
        let secrets = TempDir::new().unwrap();
        fs::write(secrets.path().join("pihole_api_password"), "pw").unwrap();
        let config = HomelabConfig::from_toml(
            r#"
[pihole]
base_url = "https://pi.hole"
blocking_ttl_secs = 0
"#,
        )
        .unwrap();

        let result = AppState::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            &SecretResolver::with_secrets_dir(secrets.path()),
        );

        match result {
            Err(ServerError::Config(message)) => {
                assert!(message.contains("pihole.blocking_ttl_secs"), "{message}")
            }
            Err(other) => panic!("expected config error, got {other:?}"),
            Ok(_) => panic!("zero TTL accepted"),
        }
    }

    #[tokio::test]
    async fn test_connect_memory_store() {
        let config = CacheConfig {
            backend: CacheBackend::Memory,
            ..Default::default()
        };
        let store = connect_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
        store.ping().await.unwrap();
    }
}
