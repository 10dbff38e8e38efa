//! Bounded polling for reads that lag behind writes.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

const MAX_ATTEMPTS: u32 = 50;
const MAX_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Attempts are clamped to `1..=50` and the interval to at most 5 s.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        PollPolicy {
            interval: interval.min(MAX_INTERVAL),
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::new(Duration::from_millis(300), 10)
    }
}

/// Waits one interval, fetches, and repeats until `done` accepts the fetched
/// value. Fetch errors end the loop immediately; running out of attempts is
/// an [`Error::Timeout`].
pub async fn poll_until<T, E, F, Fut, P>(
    what: &str,
    policy: &PollPolicy,
    mut fetch: F,
    mut done: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
    P: FnMut(&T) -> bool,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;
        let value = fetch().await.map_err(Into::into)?;
        if done(&value) {
            return Ok(value);
        }
        debug!(what, attempt, "not converged yet");
    }
    Err(Error::Timeout {
        what: what.to_string(),
        attempts: policy.max_attempts,
    })
}
