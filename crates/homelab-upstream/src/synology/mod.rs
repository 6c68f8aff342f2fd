//! Synology DSM Web API.
//!
//! Every call is a GET against `entry.cgi` with `api`, `version` and
//! `method` query parameters. Versions come from a `SYNO.API.Info` query,
//! which [`SynologyProtocol`] exposes as its negotiated metadata.

mod client;
mod dirsize;
mod models;
mod system;

pub use client::{SynologyClient, SynologyProtocol, folders_info, system_info};
pub use dirsize::DirSizeTask;
pub use models::{ApiVersions, DirSize, FolderInfo, FolderTimes, FoldersInfo};
pub use system::{
    CoreInfo, CpuLoad, Disk, MemoryUsage, NetworkInfo, NetworkInterface, StorageInfo,
    SystemInfo, Utilization, Volume,
};
