//! Synology DSM endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use homelab_cache::{CallArgs, RequestContext};
use homelab_upstream::{ApiVersions, FoldersInfo, SystemInfo};
use serde::Deserialize;

use crate::error::{Result, ServerError};
use crate::state::{AppState, DEFAULT_NAS_FOLDER, NasService};

/// Query for `/nas/folders`.
#[derive(Debug, Deserialize)]
pub struct FoldersQuery {
    /// Absolute folder path. Defaults to the volume root.
    pub folder: Option<String>,
}

fn service(state: &AppState) -> Result<&NasService> {
    state
        .nas
        .as_deref()
        .ok_or_else(|| ServerError::NotConfigured("Synology DSM integration".to_string()))
}

/// Negotiated DSM API versions.
pub async fn versions_handler(State(state): State<AppState>) -> Result<Json<ApiVersions>> {
    let nas = service(&state)?;
    let versions = nas.scope().metadata(&RequestContext::new()).await?;
    Ok(Json(versions))
}

/// Sub-folders of `folder` with their sizes.
pub async fn folders_handler(
    State(state): State<AppState>,
    Query(query): Query<FoldersQuery>,
) -> Result<Json<FoldersInfo>> {
    let nas = service(&state)?;
    let folder = query
        .folder
        .unwrap_or_else(|| DEFAULT_NAS_FOLDER.to_string());
    if !folder.starts_with('/') {
        return Err(ServerError::BadRequest(format!(
            "folder must be an absolute path, got '{}'",
            folder
        )));
    }

    let args = CallArgs::new().kwarg("folder", folder);
    let info = nas.folders().fetch(&RequestContext::new(), &args).await?;
    Ok(Json(info))
}

/// Hardware, storage, network and load of the NAS.
pub async fn system_handler(State(state): State<AppState>) -> Result<Json<SystemInfo>> {
    let nas = service(&state)?;
    let info = nas
        .system()
        .fetch(&RequestContext::new(), &CallArgs::new())
        .await?;
    Ok(Json(info))
}

/// Create Synology routes.
pub fn nas_routes() -> Router<AppState> {
    Router::new()
        .route("/nas/versions", get(versions_handler))
        .route("/nas/folders", get(folders_handler))
        .route("/nas/system", get(system_handler))
}
