//! Tracing setup: human-readable console plus a rotating JSON file.

use std::path::PathBuf;

use homelab_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const CRATES: &[&str] = &[
    "homelab",
    "homelab_cache",
    "homelab_config",
    "homelab_session",
    "homelab_upstream",
    "homelab_server",
];

fn directives(level: &str, fallback: &str) -> String {
    let mut parts: Vec<String> = CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
    parts.push(fallback.to_string());
    parts.join(",")
}

/// Console filter: `RUST_LOG` wins, then `--verbose`, then the configured level.
fn console_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::try_new(directives(level, "warn"))
        .unwrap_or_else(|_| EnvFilter::new(directives("info", "warn")))
}

fn log_dir(config: &LoggingConfig) -> PathBuf {
    config.dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .map(|d| d.join("homelab").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    })
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is on; drop it last.
pub fn init(config: &LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter(config, verbose));

    if !config.file {
        tracing_subscriber::registry().with(console).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir(config), "homelab.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(directives("trace", "info"))),
        )
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_cover_workspace_crates() {
        let d = directives("debug", "warn");
        assert!(d.starts_with("homelab=debug,"));
        assert!(d.contains("homelab_server=debug"));
        assert!(d.ends_with(",warn"));
    }

    #[test]
    fn test_log_dir_prefers_config() {
        let config = LoggingConfig {
            dir: Some(PathBuf::from("/var/log/homelab")),
            ..Default::default()
        };
        assert_eq!(log_dir(&config), PathBuf::from("/var/log/homelab"));
    }
}
