//! Pi-hole HTTP client and its session protocol.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use homelab_session::{LiveSession, SessionProtocol};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UpstreamError};
use crate::http::{self, DEFAULT_TIMEOUT};

/// Header carrying the session id on authenticated calls.
const SID_HEADER: &str = "X-FTL-SID";

/// Window covered by [`recent_stats`].
const RECENT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// DNS blocking state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingStatus {
    /// `enabled`, `disabled`, `failed` or `unknown`.
    pub blocking: String,
    /// Seconds until the current state flips back, if a timer is set.
    #[serde(default)]
    pub timer: Option<f64>,
}

/// Query totals for the last 24 hours plus FTL resource usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentStats {
    pub sum_queries: u64,
    pub sum_blocked: u64,
    pub percent_blocked: f64,
    pub total_clients: u64,
    /// Domains on the gravity list.
    pub gravity: u64,
    /// Queries per second.
    pub qps: f64,
    /// FTL uptime in seconds.
    pub uptime: f64,
    pub percent_mem: f64,
    pub percent_cpu: f64,
}

#[derive(Debug, Deserialize)]
struct DatabaseSummary {
    sum_queries: u64,
    sum_blocked: u64,
    percent_blocked: f64,
    total_clients: u64,
}

#[derive(Debug, Deserialize)]
struct FtlInfoResponse {
    ftl: FtlInfo,
}

#[derive(Debug, Deserialize)]
struct FtlInfo {
    database: FtlDatabase,
    query_frequency: f64,
    uptime: f64,
    #[serde(rename = "%mem")]
    percent_mem: f64,
    #[serde(rename = "%cpu")]
    percent_cpu: f64,
}

#[derive(Debug, Deserialize)]
struct FtlDatabase {
    gravity: u64,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: Option<SessionInfo>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    #[serde(default)]
    valid: bool,
    sid: Option<String>,
}

// ============================================================================
// PiholeClient
// ============================================================================

/// Low-level Pi-hole API client.
#[derive(Debug, Clone)]
pub struct PiholeClient {
    http: reqwest::Client,
    base_url: String,
}

impl PiholeClient {
    /// Client for the Pi-hole at `base_url` (e.g. `https://pi.hole`).
    pub fn new(base_url: impl Into<String>, accept_invalid_certs: bool) -> Result<Self> {
        Self::with_timeout(base_url, accept_invalid_certs, DEFAULT_TIMEOUT)
    }

    /// Client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        accept_invalid_certs: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            http: http::build_client(accept_invalid_certs, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Log in and return the session id.
    pub async fn login(&self, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("auth"))
            .json(&LoginRequest { password })
            .send()
            .await?;

        // Wrong passwords come back as 401 with a JSON body.
        if response.status().as_u16() == 401 {
            return Err(UpstreamError::Rejected(
                "Pi-hole login failed: invalid password".to_string(),
            ));
        }
        let body: LoginResponse = http::read_json(response).await?;

        if let Some(error) = body.error {
            return Err(UpstreamError::Rejected(format!(
                "Pi-hole login failed: {}",
                error
            )));
        }
        let session = body.session.ok_or_else(|| {
            UpstreamError::Rejected("Pi-hole login failed: no session returned".to_string())
        })?;
        match session.sid {
            Some(sid) if session.valid && !sid.is_empty() => Ok(sid),
            _ => Err(UpstreamError::Rejected(
                "Pi-hole login failed: session not valid".to_string(),
            )),
        }
    }

    /// Log out of `sid`.
    pub async fn logout(&self, sid: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url("auth"))
            .header(SID_HEADER, sid)
            .send()
            .await?;
        http::check_status(response).await?;
        Ok(())
    }

    /// Current DNS blocking state.
    pub async fn blocking(&self, sid: &str) -> Result<BlockingStatus> {
        let response = self
            .http
            .get(self.url("dns/blocking"))
            .query(&[("sid", sid)])
            .send()
            .await?;
        http::read_json(response).await
    }

    async fn database_summary(&self, sid: &str, from: u64, until: u64) -> Result<DatabaseSummary> {
        let response = self
            .http
            .get(self.url("stats/database/summary"))
            .query(&[
                ("from", from.to_string()),
                ("until", until.to_string()),
                ("sid", sid.to_string()),
            ])
            .send()
            .await?;
        http::read_json(response).await
    }

    async fn ftl_info(&self, sid: &str) -> Result<FtlInfo> {
        let response = self
            .http
            .get(self.url("info/ftl"))
            .query(&[("sid", sid)])
            .send()
            .await?;
        let body: FtlInfoResponse = http::read_json(response).await?;
        Ok(body.ftl)
    }
}

// ============================================================================
// PiholeProtocol
// ============================================================================

/// Pi-hole password login. There is no capability negotiation.
#[derive(Debug, Clone)]
pub struct PiholeProtocol {
    client: PiholeClient,
    password: String,
}

impl PiholeProtocol {
    /// Log in to `client` with the web `password`.
    pub fn new(client: PiholeClient, password: impl Into<String>) -> Self {
        Self {
            client,
            password: password.into(),
        }
    }

    /// The underlying API client.
    pub fn client(&self) -> &PiholeClient {
        &self.client
    }
}

#[async_trait]
impl SessionProtocol for PiholeProtocol {
    type Metadata = ();
    type Session = String;
    type Error = UpstreamError;

    fn name(&self) -> &'static str {
        "pihole"
    }

    async fn negotiate(&self) -> Result<()> {
        Ok(())
    }

    async fn authenticate(&self, _metadata: &()) -> Result<String> {
        let sid = self.client.login(&self.password).await?;
        debug!("Pi-hole login successful");
        Ok(sid)
    }

    async fn deauthenticate(&self, _metadata: &(), sid: &String) -> Result<()> {
        self.client.logout(sid).await
    }
}

/// DNS blocking state, read inside a live session.
pub async fn blocking_status(live: &LiveSession<PiholeProtocol>) -> Result<BlockingStatus> {
    live.protocol().client().blocking(live.session()).await
}

/// Last 24 hours of query totals plus FTL load, read inside a live session.
///
/// The two underlying calls share the session and run concurrently.
pub async fn recent_stats(live: &LiveSession<PiholeProtocol>) -> Result<RecentStats> {
    let client = live.protocol().client();
    let sid = live.session().as_str();

    let until = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let from = until.saturating_sub(RECENT_WINDOW.as_secs());

    let (summary, ftl) = futures::try_join!(
        client.database_summary(sid, from, until),
        client.ftl_info(sid),
    )?;

    Ok(RecentStats {
        sum_queries: summary.sum_queries,
        sum_blocked: summary.sum_blocked,
        percent_blocked: summary.percent_blocked,
        total_clients: summary.total_clients,
        gravity: ftl.database.gravity,
        qps: ftl.query_frequency,
        uptime: ftl.uptime,
        percent_mem: ftl.percent_mem,
        percent_cpu: ftl.percent_cpu,
    })
}
