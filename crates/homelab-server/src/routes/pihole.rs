//! Pi-hole endpoints.

use axum::{Json, Router, extract::State, routing::get};
use homelab_cache::{CallArgs, RequestContext};
use homelab_upstream::{BlockingStatus, RecentStats};

use crate::error::{Result, ServerError};
use crate::state::{AppState, PiholeService};

fn service(state: &AppState) -> Result<&PiholeService> {
    state
        .pihole
        .as_deref()
        .ok_or_else(|| ServerError::NotConfigured("Pi-hole integration".to_string()))
}

/// Current DNS blocking state.
pub async fn blocking_handler(State(state): State<AppState>) -> Result<Json<BlockingStatus>> {
    let status = service(&state)?
        .blocking()
        .fetch(&RequestContext::new(), &CallArgs::new())
        .await?;
    Ok(Json(status))
}

/// Query totals for the last 24 hours.
pub async fn recent_handler(State(state): State<AppState>) -> Result<Json<RecentStats>> {
    let stats = service(&state)?
        .recent()
        .fetch(&RequestContext::new(), &CallArgs::new())
        .await?;
    Ok(Json(stats))
}

/// Create Pi-hole routes.
pub fn pihole_routes() -> Router<AppState> {
    Router::new()
        .route("/pihole/blocking", get(blocking_handler))
        .route("/pihole/recent", get(recent_handler))
}
