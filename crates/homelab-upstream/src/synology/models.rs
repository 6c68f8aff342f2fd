//! DSM response shapes and the records built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpstreamError};

/// API name of the auth endpoint.
pub(crate) const AUTH_API: &str = "SYNO.API.Auth";

/// API name of the folder listing endpoint.
pub(crate) const LIST_API: &str = "SYNO.FileStation.List";

/// API name of the system information endpoint.
pub(crate) const CORE_SYSTEM_API: &str = "SYNO.Core.System";

/// API name of the CPU and memory load endpoint.
pub(crate) const UTILIZATION_API: &str = "SYNO.Core.System.Utilization";

/// Common DSM response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: i64,
}

impl<T> Envelope<T> {
    /// Unwrap `data`, turning `success: false` into [`UpstreamError::Rejected`].
    pub fn into_data(self, call: &str) -> Result<T> {
        if !self.success {
            let code = self.error.map(|e| e.code).unwrap_or_default();
            return Err(UpstreamError::Rejected(format!(
                "{} failed with DSM error code {}",
                call, code
            )));
        }
        self.data
            .ok_or_else(|| UpstreamError::Decode(format!("{} returned no data", call)))
    }

    /// Check `success` for calls that return no data.
    pub fn into_unit(self, call: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let code = self.error.map(|e| e.code).unwrap_or_default();
        Err(UpstreamError::Rejected(format!(
            "{} failed with DSM error code {}",
            call, code
        )))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiInfo {
    #[serde(rename = "maxVersion")]
    pub max_version: u32,
}

pub(crate) type ApiInfoData = HashMap<String, ApiInfo>;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub sid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileTime {
    pub atime: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub crtime: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileAdditional {
    pub time: FileTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct File {
    pub name: String,
    pub path: String,
    pub isdir: bool,
    pub additional: FileAdditional,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListData {
    pub files: Vec<File>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskStartData {
    pub taskid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirSizeStatusData {
    pub finished: bool,
    #[serde(default)]
    pub num_dir: u64,
    #[serde(default)]
    pub num_file: u64,
    #[serde(default)]
    pub total_size: u64,
}

/// Negotiated API versions, cached long-term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersions {
    /// Highest supported `SYNO.API.Auth` version.
    pub auth: u32,
    /// Highest supported `SYNO.FileStation.*` version.
    pub file_station: u32,
    /// Highest supported `SYNO.Core.System` version, if the account may use it.
    #[serde(default)]
    pub core_system: Option<u32>,
    /// Highest supported `SYNO.Core.System.Utilization` version.
    #[serde(default)]
    pub utilization: Option<u32>,
}

impl ApiVersions {
    /// Pick versions out of a `SYNO.API.Info` query result.
    pub(crate) fn from_info(info: &ApiInfoData) -> Result<Self> {
        let max = |api: &str| {
            info.get(api)
                .map(|i| i.max_version)
                .ok_or_else(|| UpstreamError::Decode(format!("API info is missing {}", api)))
        };
        Ok(Self {
            auth: max(AUTH_API)?,
            file_station: max(LIST_API)?,
            core_system: max(CORE_SYSTEM_API).ok(),
            utilization: max(UTILIZATION_API).ok(),
        })
    }

    /// Versions of the system and utilization APIs, both required.
    pub(crate) fn system_versions(&self) -> Result<(u32, u32)> {
        match (self.core_system, self.utilization) {
            (Some(core), Some(utilization)) => Ok((core, utilization)),
            _ => Err(UpstreamError::Rejected(format!(
                "DSM does not offer {} and {} to this account",
                CORE_SYSTEM_API, UTILIZATION_API
            ))),
        }
    }
}

/// Result of a finished directory-size task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirSize {
    /// Number of directories below the path.
    pub num_dir: u64,
    /// Number of files below the path.
    pub num_file: u64,
    /// Total size in bytes.
    pub total_size: u64,
}

/// Timestamps of a folder, in Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTimes {
    pub last_accessed: i64,
    pub last_changed: i64,
    pub last_modified: i64,
    pub created: i64,
}

/// One sub-folder with its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub num_dir: u64,
    pub num_file: u64,
    pub total_size: u64,
    pub time: FolderTimes,
}

/// Sub-folders of a listed folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldersInfo {
    pub folders: Vec<FolderInfo>,
}
