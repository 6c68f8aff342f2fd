//! `SYNO.FileStation.DirSize` as a pollable remote task.

use async_trait::async_trait;
use homelab_session::RemoteTask;

use super::client::SynologyClient;
use super::models::{ApiVersions, DirSize};
use crate::error::{Result, UpstreamError};

/// A running directory-size computation on the NAS.
#[derive(Debug)]
pub struct DirSizeTask<'a> {
    client: &'a SynologyClient,
    versions: ApiVersions,
    sid: &'a str,
    task_id: String,
}

impl<'a> DirSizeTask<'a> {
    /// Start sizing `path`.
    pub async fn start(
        client: &'a SynologyClient,
        versions: ApiVersions,
        sid: &'a str,
        path: &str,
    ) -> Result<Self> {
        let task_id = client.start_dir_size(&versions, sid, path).await?;
        Ok(Self {
            client,
            versions,
            sid,
            task_id,
        })
    }

    /// DSM task id.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

#[async_trait]
impl RemoteTask for DirSizeTask<'_> {
    type Output = DirSize;
    type Error = UpstreamError;

    fn id(&self) -> &str {
        &self.task_id
    }

    async fn poll(&self) -> Result<Option<DirSize>> {
        self.client
            .dir_size_status(&self.versions, self.sid, &self.task_id)
            .await
    }

    async fn stop(&self) -> Result<()> {
        self.client
            .stop_dir_size(&self.versions, self.sid, &self.task_id)
            .await
    }
}
