//! Pi-hole v6 REST API.

mod client;

pub use client::{
    BlockingStatus, PiholeClient, PiholeProtocol, RecentStats, blocking_status, recent_stats,
};
