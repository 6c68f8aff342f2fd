//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Which upstreams have a config section.
#[derive(Debug, Serialize, Deserialize)]
pub struct Integrations {
    pub nas: bool,
    pub pihole: bool,
}

/// `/health` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `memory` or `redis`.
    pub cache_backend: String,
    pub integrations: Integrations,
}

/// Liveness plus wiring. Never contacts the store or an upstream; use
/// `/cache` for store reachability.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_backend: state.store.name().to_string(),
        integrations: Integrations {
            nas: state.nas.is_some(),
            pihole: state.pihole.is_some(),
        },
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
