//! Session lifecycle for stateful upstream APIs.
//!
//! Some upstreams (Synology DSM, Pi-hole) hand out a session id on login and
//! expect it back on logout. This crate brackets work against them:
//!
//! - negotiate protocol metadata, optionally cached with a long TTL
//! - authenticate, run the operation with a [`LiveSession`]
//! - deauthenticate exactly once, even if the operation fails or the caller
//!   is cancelled
//!
//! It also provides bounded polling for remote asynchronous tasks
//! ([`run_to_completion`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use homelab_session::{SessionScope, DEFAULT_METADATA_TTL};
//!
//! let scope = SessionScope::new(protocol)
//!     .with_metadata_cache(store, "nas:versions", DEFAULT_METADATA_TTL);
//!
//! let shares = scope
//!     .run(&ctx, |live| async move { list_shares(&live).await })
//!     .await?;
//! ```

mod error;
mod poll;
mod protocol;
mod scope;

pub use error::SessionError;
pub use poll::{PollError, PollPolicy, RemoteTask, run_to_completion};
pub use protocol::SessionProtocol;
pub use scope::{
    DEFAULT_METADATA_TTL, LiveSession, SessionFetch, SessionScope, TeardownGuard, session_fetch,
};
