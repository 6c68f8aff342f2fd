//! Cache store ping.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

/// Cache health response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealthResponse {
    /// `ok` when the store answers a ping, `error` otherwise.
    pub status: String,
}

/// Ping the cache store. Always answers 200; the status field carries the
/// outcome.
pub async fn cache_health(State(state): State<AppState>) -> Json<CacheHealthResponse> {
    let status = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(store = state.store.name(), error = %e, "Cache ping failed");
            "error"
        }
    };
    Json(CacheHealthResponse {
        status: status.to_string(),
    })
}

/// Create cache routes.
pub fn cache_routes() -> Router<AppState> {
    Router::new().route("/cache", get(cache_health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use homelab_cache::MemoryStore;
    use homelab_cache::testing::CountingStore;
    use tower::ServiceExt;

    async fn ping(state: AppState) -> CacheHealthResponse {
        let response = cache_routes()
            .with_state(state)
            .oneshot(Request::builder().uri("/cache").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_cache_ok() {
        let body = ping(AppState::new(Arc::new(MemoryStore::new()))).await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_cache_unreachable() {
        let store = CountingStore::new();
        store.set_reads_offline(true);

        let body = ping(AppState::new(Arc::new(store))).await;
        assert_eq!(body.status, "error");
    }
}
