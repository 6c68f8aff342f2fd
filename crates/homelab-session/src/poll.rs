//! Bounded polling of remote asynchronous tasks.
//!
//! Upstreams like Synology's `DirSize` work as start / poll status / stop.
//! [`run_to_completion`] drives the middle step with linearly increasing
//! delays and a hard attempt ceiling, and always issues the stop.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// A task started on a remote system that must be polled for its result.
#[async_trait]
pub trait RemoteTask: Send + Sync {
    /// Result reported once the task finishes.
    type Output: Send;

    /// Error raised by poll or stop calls.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Remote task identifier, for logs and timeout errors.
    fn id(&self) -> &str;

    /// Query status. `None` while still running.
    async fn poll(&self) -> Result<Option<Self::Output>, Self::Error>;

    /// Stop the task and release it on the remote side.
    async fn stop(&self) -> Result<(), Self::Error>;
}

/// Retry ceiling and backoff for [`run_to_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of status polls.
    pub max_attempts: u32,
    /// Delay unit; the wait after `n` unfinished polls is `base_delay * (n + 1)`,
    /// so the first re-poll waits two units.
    pub base_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl PollPolicy {
    /// Create the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt ceiling. Values below one are raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the delay unit.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Wait after `polls` unfinished status polls.
    pub fn delay_for(&self, polls: u32) -> Duration {
        self.base_delay.saturating_mul(polls.saturating_add(1))
    }
}

/// Failure of [`run_to_completion`].
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// The task never reported completion within the attempt ceiling.
    #[error("Remote task {task} did not finish after {attempts} polls")]
    Timeout {
        /// Remote task identifier.
        task: String,
        /// Number of polls made.
        attempts: u32,
    },

    /// A status poll failed.
    #[error(transparent)]
    Task(E),
}

/// Poll `task` until it finishes or `policy` gives up, then stop it.
///
/// `stop` is called exactly once on every exit path. A failing stop is
/// logged and does not replace the polling outcome.
pub async fn run_to_completion<T: RemoteTask>(
    task: &T,
    policy: &PollPolicy,
) -> Result<T::Output, PollError<T::Error>> {
    let outcome = poll_until_done(task, policy).await;

    match task.stop().await {
        Ok(()) => debug!(task = task.id(), "Remote task stopped"),
        Err(e) => warn!(task = task.id(), error = %e, "Failed to stop remote task"),
    }

    outcome
}

async fn poll_until_done<T: RemoteTask>(
    task: &T,
    policy: &PollPolicy,
) -> Result<T::Output, PollError<T::Error>> {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
        if let Some(output) = task.poll().await.map_err(PollError::Task)? {
            debug!(task = task.id(), attempts = attempt + 1, "Remote task finished");
            return Ok(output);
        }
    }

    warn!(
        task = task.id(),
        attempts = max_attempts,
        "Remote task did not finish in time"
    );
    Err(PollError::Timeout {
        task: task.id().to_string(),
        attempts: max_attempts,
    })
}
