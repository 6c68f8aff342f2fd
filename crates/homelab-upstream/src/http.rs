//! Shared HTTP plumbing.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;

use crate::error::{Result, UpstreamError};

/// Default timeout for upstream requests.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest error body kept in [`UpstreamError::Api`] messages.
const MAX_ERROR_BODY: usize = 512;

/// Build an HTTP client for a homelab appliance.
///
/// Appliances commonly serve self-signed certificates, hence the opt-in.
pub(crate) fn build_client(accept_invalid_certs: bool, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .timeout(timeout)
        .user_agent(format!("homelab/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| UpstreamError::Unavailable(format!("failed to build HTTP client: {}", e)))
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turn non-success statuses into errors.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        return Err(UpstreamError::RateLimited { retry_after });
    }

    let mut message = response.text().await.unwrap_or_default();
    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
    }
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }

    Err(UpstreamError::Api {
        status: status.as_u16(),
        message,
    })
}
