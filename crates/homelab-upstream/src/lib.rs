//! Clients for the session-based homelab upstreams.
//!
//! - [`synology`]: Synology DSM. Capability negotiation, login/logout,
//!   folder listing, directory-size tasks and the system overview.
//! - [`pihole`]: Pi-hole v6. Login/logout, DNS blocking status and
//!   recent query statistics.
//!
//! Both expose a [`SessionProtocol`](homelab_session::SessionProtocol) so
//! callers can run them inside a
//! [`SessionScope`](homelab_session::SessionScope).

mod error;
mod http;
pub mod pihole;
pub mod synology;

pub use error::{Result, UpstreamError};
pub use pihole::{BlockingStatus, PiholeClient, PiholeProtocol, RecentStats};
pub use synology::{
    ApiVersions, FolderInfo, FolderTimes, FoldersInfo, SynologyClient, SynologyProtocol,
    SystemInfo,
};
