//! DSM HTTP client and its session protocol.

use std::time::Duration;

use async_trait::async_trait;
use homelab_session::{LiveSession, PollPolicy, SessionProtocol, run_to_completion};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::dirsize::DirSizeTask;
use super::models::{
    AUTH_API, ApiInfoData, ApiVersions, CORE_SYSTEM_API, DirSize, DirSizeStatusData, Envelope,
    File, FolderInfo, FolderTimes, FoldersInfo, LIST_API, ListData, LoginData, TaskStartData,
    UTILIZATION_API,
};
use super::system::{CoreInfo, NetworkInfo, StorageInfo, SystemInfo, Utilization};
use crate::error::{Result, UpstreamError};
use crate::http::{self, DEFAULT_TIMEOUT};

const INFO_API: &str = "SYNO.API.Info";
const DIR_SIZE_API: &str = "SYNO.FileStation.DirSize";

type Params = Vec<(&'static str, String)>;

// ============================================================================
// SynologyClient
// ============================================================================

/// Low-level DSM Web API client.
#[derive(Debug, Clone)]
pub struct SynologyClient {
    http: reqwest::Client,
    base_url: String,
    poll_policy: PollPolicy,
}

impl SynologyClient {
    /// Client for the `entry.cgi` endpoint at `base_url`.
    pub fn new(base_url: impl Into<String>, accept_invalid_certs: bool) -> Result<Self> {
        Self::with_timeout(base_url, accept_invalid_certs, DEFAULT_TIMEOUT)
    }

    /// Client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        accept_invalid_certs: bool,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: http::build_client(accept_invalid_certs, timeout)?,
            base_url: base_url.into(),
            poll_policy: PollPolicy::default(),
        })
    }

    /// Set how directory-size tasks are polled.
    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    /// The `entry.cgi` URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Polling policy for directory-size tasks.
    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    async fn call<T: DeserializeOwned>(&self, params: &Params) -> Result<Envelope<T>> {
        let response = self.http.get(&self.base_url).query(params).send().await?;
        http::read_json(response).await
    }

    /// Query supported versions of the auth, FileStation and system APIs.
    pub async fn query_versions(&self) -> Result<ApiVersions> {
        let params = vec![
            ("api", INFO_API.to_string()),
            ("version", "1".to_string()),
            ("method", "query".to_string()),
            (
                "query",
                format!(
                    "{},SYNO.FileStation.,{},{}",
                    AUTH_API, CORE_SYSTEM_API, UTILIZATION_API
                ),
            ),
        ];
        let info: ApiInfoData = self.call(&params).await?.into_data("SYNO.API.Info.query")?;
        let versions = ApiVersions::from_info(&info)?;
        debug!(
            auth = versions.auth,
            file_station = versions.file_station,
            core_system = ?versions.core_system,
            "Negotiated DSM API versions"
        );
        Ok(versions)
    }

    /// Log in and return the session id.
    pub async fn login(&self, versions: &ApiVersions, account: &str, passwd: &str) -> Result<String> {
        let params = vec![
            ("api", AUTH_API.to_string()),
            ("version", versions.auth.to_string()),
            ("method", "login".to_string()),
            ("account", account.to_string()),
            ("passwd", passwd.to_string()),
            ("format", "sid".to_string()),
        ];
        let data: LoginData = self.call(&params).await?.into_data("SYNO.API.Auth.login")?;
        Ok(data.sid)
    }

    /// Log out of `sid`.
    pub async fn logout(&self, versions: &ApiVersions, sid: &str) -> Result<()> {
        let params = vec![
            ("api", AUTH_API.to_string()),
            ("version", versions.auth.to_string()),
            ("method", "logout".to_string()),
            ("sid", sid.to_string()),
        ];
        self.call::<serde_json::Value>(&params)
            .await?
            .into_unit("SYNO.API.Auth.logout")
    }

    pub(crate) async fn list_folder(
        &self,
        versions: &ApiVersions,
        sid: &str,
        folder: &str,
    ) -> Result<ListData> {
        let params = vec![
            ("api", LIST_API.to_string()),
            ("version", versions.file_station.to_string()),
            ("method", "list".to_string()),
            ("folder_path", folder.to_string()),
            ("additional", r#"["time"]"#.to_string()),
            ("_sid", sid.to_string()),
        ];
        self.call(&params).await?.into_data("SYNO.FileStation.List.list")
    }

    /// One `SYNO.Core.System*` call. `kind` selects the `type` variant of `info`.
    pub(crate) async fn system_call<T: DeserializeOwned>(
        &self,
        api: &'static str,
        version: u32,
        method: &'static str,
        kind: Option<&'static str>,
        sid: &str,
    ) -> Result<T> {
        let mut params = vec![
            ("api", api.to_string()),
            ("version", version.to_string()),
            ("method", method.to_string()),
        ];
        if let Some(kind) = kind {
            params.push(("type", kind.to_string()));
        }
        params.push(("_sid", sid.to_string()));

        let call = format!("{}.{}", api, method);
        self.call(&params).await?.into_data(&call)
    }

    /// Start a directory-size task for `path` and return its task id.
    pub async fn start_dir_size(&self, versions: &ApiVersions, sid: &str, path: &str) -> Result<String> {
        let params = vec![
            ("api", DIR_SIZE_API.to_string()),
            ("version", versions.file_station.to_string()),
            ("method", "start".to_string()),
            ("path", serde_json::to_string(&[path])?),
            ("_sid", sid.to_string()),
        ];
        let data: TaskStartData = self
            .call(&params)
            .await?
            .into_data("SYNO.FileStation.DirSize.start")?;
        Ok(data.taskid)
    }

    /// Status of a directory-size task. `None` while still running.
    pub async fn dir_size_status(
        &self,
        versions: &ApiVersions,
        sid: &str,
        task_id: &str,
    ) -> Result<Option<DirSize>> {
        let params = vec![
            ("api", DIR_SIZE_API.to_string()),
            ("version", versions.file_station.to_string()),
            ("method", "status".to_string()),
            ("taskid", serde_json::to_string(task_id)?),
            ("_sid", sid.to_string()),
        ];
        let data: DirSizeStatusData = self
            .call(&params)
            .await?
            .into_data("SYNO.FileStation.DirSize.status")?;

        Ok(data.finished.then_some(DirSize {
            num_dir: data.num_dir,
            num_file: data.num_file,
            total_size: data.total_size,
        }))
    }

    /// Stop and discard a directory-size task.
    pub async fn stop_dir_size(&self, versions: &ApiVersions, sid: &str, task_id: &str) -> Result<()> {
        let params = vec![
            ("api", DIR_SIZE_API.to_string()),
            ("version", versions.file_station.to_string()),
            ("method", "stop".to_string()),
            ("taskid", serde_json::to_string(task_id)?),
            ("_sid", sid.to_string()),
        ];
        self.call::<serde_json::Value>(&params)
            .await?
            .into_unit("SYNO.FileStation.DirSize.stop")
    }
}

// ============================================================================
// SynologyProtocol
// ============================================================================

/// DSM login/logout with version negotiation.
#[derive(Debug, Clone)]
pub struct SynologyProtocol {
    client: SynologyClient,
    account: String,
    password: String,
}

impl SynologyProtocol {
    /// Log in to `client` as `account`.
    pub fn new(client: SynologyClient, account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client,
            account: account.into(),
            password: password.into(),
        }
    }

    /// The underlying API client.
    pub fn client(&self) -> &SynologyClient {
        &self.client
    }
}

#[async_trait]
impl SessionProtocol for SynologyProtocol {
    type Metadata = ApiVersions;
    type Session = String;
    type Error = UpstreamError;

    fn name(&self) -> &'static str {
        "synology"
    }

    async fn negotiate(&self) -> Result<ApiVersions> {
        self.client.query_versions().await
    }

    async fn authenticate(&self, versions: &ApiVersions) -> Result<String> {
        self.client.login(versions, &self.account, &self.password).await
    }

    async fn deauthenticate(&self, versions: &ApiVersions, sid: &String) -> Result<()> {
        self.client.logout(versions, sid).await
    }
}

// ============================================================================
// Operations
// ============================================================================

/// List the sub-folders of `folder` with their sizes.
///
/// One directory-size task is started per sub-folder and all are polled
/// concurrently. Every started task is stopped, whatever the outcome.
pub async fn folders_info(live: &LiveSession<SynologyProtocol>, folder: &str) -> Result<FoldersInfo> {
    let client = live.protocol().client();
    let versions = live.metadata();
    let sid = live.session().as_str();

    let listing = client.list_folder(versions, sid, folder).await?;
    let dirs: Vec<&File> = listing.files.iter().filter(|f| f.isdir).collect();
    debug!(
        request_id = %live.context().request_id(),
        folder,
        subfolders = dirs.len(),
        "Sizing sub-folders"
    );

    let tasks = start_tasks(client, versions, sid, &dirs).await?;
    let policy = client.poll_policy();
    let polls: Vec<_> = tasks
        .iter()
        .map(|task| run_to_completion(task, policy))
        .collect();
    let sizes = futures::future::join_all(polls).await;

    let mut folders = Vec::with_capacity(dirs.len());
    for (file, size) in dirs.into_iter().zip(sizes) {
        let size = size?;
        folders.push(FolderInfo {
            name: file.name.clone(),
            path: file.path.clone(),
            is_dir: file.isdir,
            num_dir: size.num_dir,
            num_file: size.num_file,
            total_size: size.total_size,
            time: FolderTimes {
                last_accessed: file.additional.time.atime,
                last_changed: file.additional.time.ctime,
                last_modified: file.additional.time.mtime,
                created: file.additional.time.crtime,
            },
        });
    }

    Ok(FoldersInfo { folders })
}

/// Hardware, storage, network and load of the NAS.
///
/// The four DSM calls run concurrently inside the one session; any failure
/// fails the whole overview.
pub async fn system_info(live: &LiveSession<SynologyProtocol>) -> Result<SystemInfo> {
    let client = live.protocol().client();
    let (core_version, utilization_version) = live.metadata().system_versions()?;
    let sid = live.session().as_str();

    let core = client.system_call::<CoreInfo>(CORE_SYSTEM_API, core_version, "info", None, sid);
    let storage = client.system_call::<StorageInfo>(
        CORE_SYSTEM_API,
        core_version,
        "info",
        Some("storage"),
        sid,
    );
    let network = client.system_call::<NetworkInfo>(
        CORE_SYSTEM_API,
        core_version,
        "info",
        Some("network"),
        sid,
    );
    let utilization =
        client.system_call::<Utilization>(UTILIZATION_API, utilization_version, "get", None, sid);

    let (core, storage, network, utilization) =
        futures::try_join!(core, storage, network, utilization)?;
    debug!(
        request_id = %live.context().request_id(),
        model = %core.model,
        volumes = storage.volumes.len(),
        "Collected system overview"
    );

    Ok(SystemInfo {
        core,
        storage,
        network,
        utilization,
    })
}

/// Start one task per directory. If any start fails, stop the ones already
/// running before returning the error.
async fn start_tasks<'a>(
    client: &'a SynologyClient,
    versions: &ApiVersions,
    sid: &'a str,
    dirs: &[&File],
) -> Result<Vec<DirSizeTask<'a>>> {
    let mut tasks = Vec::with_capacity(dirs.len());
    for dir in dirs {
        match DirSizeTask::start(client, *versions, sid, &dir.path).await {
            Ok(task) => tasks.push(task),
            Err(e) => {
                for task in &tasks {
                    if let Err(stop_err) = client.stop_dir_size(versions, sid, task.task_id()).await {
                        warn!(task = task.task_id(), error = %stop_err, "Failed to stop remote task");
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(tasks)
}
