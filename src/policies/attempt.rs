//! # Attempt policy: how many times and for how long one action may run.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Default per-attempt timeout of a worker.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bundle of the knobs the supervisor needs for one invocation.
///
/// - `timeout`: per-attempt bound (`None` = unbounded)
/// - `max_retries`: extra attempts after the first one
/// - `backoff`: delay between attempts
#[derive(Clone, Debug)]
pub struct AttemptPolicy {
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Number of retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for AttemptPolicy {
    /// 10s timeout, no retries, default backoff.
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            max_retries: 0,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl AttemptPolicy {
    /// Total number of attempts (`max_retries + 1`).
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Timeout filtered for the `0s = none` sentinel.
    #[inline]
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|d| *d > Duration::ZERO)
    }
}
