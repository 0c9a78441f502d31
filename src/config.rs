//! # Global engine configuration.
//!
//! [`EngineConfig`] centralizes runtime settings. It is used in two ways:
//! 1. **Engine creation**: `Engine::new(config)` / `Engine::builder(config)`
//! 2. **Unit defaults**: `Worker::with_defaults(id, action, &config)`,
//!    `Process::with_defaults(id, &config)`
//!
//! ## Sentinel values
//! - `timeout = 0s` → no per-attempt timeout
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::{AttemptPolicy, BackoffPolicy, DEFAULT_TIMEOUT};
use crate::pool::PoolConfig;
use crate::units::{DEFAULT_BATCH_SIZE, DEFAULT_ISOLATION_DELAY};

/// Global configuration for the engine.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (lagging subscribers skip old events)
/// - `timeout`, `max_retries`, `backoff`: default attempt policy for workers
/// - `isolation_delay`, `batch_size`: default run-mode settings for processes
/// - `pool`: worker pool sizing, tick interval and attempt policy
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Default per-attempt timeout (`0s` = none).
    pub timeout: Duration,

    /// Default number of retries after the first attempt.
    pub max_retries: u32,

    /// Default delay policy between attempts.
    pub backoff: BackoffPolicy,

    /// Default pause between workers of an isolated process.
    pub isolation_delay: Duration,

    /// Default chunk size of a batched process.
    pub batch_size: usize,

    /// Worker pool settings.
    pub pool: PoolConfig,
}

impl EngineConfig {
    /// Returns the default per-attempt timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Attempt policy inherited by [`Worker::with_defaults`](crate::Worker::with_defaults).
    pub fn attempt_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            timeout: self.default_timeout(),
            max_retries: self.max_retries,
            backoff: self.backoff.clone(),
        }
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `timeout = 10s`, `max_retries = 0`, `backoff = Fixed(100ms)`
    /// - `isolation_delay = 100ms`, `batch_size = 2`
    /// - `pool = PoolConfig::default()`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            backoff: BackoffPolicy::default(),
            isolation_delay: DEFAULT_ISOLATION_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
            pool: PoolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_none() {
        let cfg = EngineConfig {
            timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.default_timeout(), None);
        assert_eq!(cfg.attempt_policy().timeout, None);
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = EngineConfig {
            bus_capacity: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
