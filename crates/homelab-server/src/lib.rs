//! HTTP API server for Homelab.
//!
//! Exposes cached Synology DSM and Pi-hole metrics over a small JSON API.
//! Every upstream call runs inside a login/logout session and its result
//! is stored in the response cache, so repeated requests inside the TTL
//! never touch the device.
//!
//! # Routes
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /health` | Version, cache backend and configured integrations |
//! | `GET /cache` | Cache store reachability |
//! | `GET /nas/versions` | Negotiated DSM API versions |
//! | `GET /nas/folders?folder=/volume1` | Sub-folder sizes and times |
//! | `GET /nas/system` | Hardware, storage, network and load |
//! | `GET /pihole/blocking` | DNS blocking state |
//! | `GET /pihole/recent` | Query totals for the last 24 hours |
//!
//! # Example
//!
//! ```ignore
//! use homelab_server::{AppState, Server, connect_store};
//!
//! let store = connect_store(&config.cache()).await?;
//! let state = AppState::from_config(&config, store, &SecretResolver::new())?;
//! Server::new(state, config.server()).run().await?;
//! ```

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ErrorResponse, Result, ServerError};
pub use middleware::request_logging_middleware;
pub use state::{AppState, NasService, PiholeService, WrappedError, connect_store};

use axum::{
    Router,
    http::{HeaderValue, Method},
};
use homelab_config::ServerConfig;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The Homelab HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
    /// Listener and middleware settings.
    config: ServerConfig,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .merge(routes::cache_routes())
            .merge(routes::nas_routes())
            .merge(routes::pihole_routes());

        if self.config.request_logging {
            router = router.layer(axum::middleware::from_fn(request_logging_middleware));
        }

        router
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods([Method::GET]);
        if self.config.cors_origins.is_empty() {
            return layer.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = self
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }

    /// Configured bind address.
    pub fn bind_address(&self) -> &str {
        &self.config.bind
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", self.config.bind);

        let listener = TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use homelab_cache::MemoryStore;
    use tower::ServiceExt;

    fn test_server(config: ServerConfig) -> Server {
        Server::new(AppState::new(Arc::new(MemoryStore::new())), config)
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let app = test_server(ServerConfig::default()).router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unconfigured_integrations_are_not_found() {
        let app = test_server(ServerConfig::default()).router();

        for uri in [
            "/nas/versions",
            "/nas/folders",
            "/nas/system",
            "/pihole/blocking",
            "/pihole/recent",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_cors_allows_listed_origin() {
        let config = ServerConfig {
            cors_origins: vec!["http://localhost:3000".to_string()],
            ..Default::default()
        };
        let app = test_server(config).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_bind_address_from_config() {
        let server = test_server(ServerConfig {
            bind: "0.0.0.0:9000".to_string(),
            ..Default::default()
        });
        assert_eq!(server.bind_address(), "0.0.0.0:9000");
    }
}
