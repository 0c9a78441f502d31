//! Error types used by the engine, its workers and the worker pool.
//!
//! - [`TaskError`]: failure of a single action attempt (consumed by the supervisor).
//! - [`EngineError`]: hard failure of a whole process run (cycle, terminal failure in a graph).
//!
//! Pool and storage errors live next to their components
//! ([`PoolError`](crate::PoolError), [`StoreError`](crate::StoreError)).
//! Every enum offers `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by one action attempt.
///
/// `Timeout` and `Fail` are retryable; `Fatal` and `Canceled` stop the retry loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Attempt exceeded the worker timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (never retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Attempt failed but may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Attempt was cancelled because the engine is shutting down.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for a retryable [`TaskError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Shorthand for a non-retryable [`TaskError::Fatal`].
    pub fn fatal(error: impl std::fmt::Display) -> Self {
        TaskError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Indicates whether another attempt may be scheduled after this error.
    ///
    /// ```
    /// use flowvisor::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. } | TaskError::Timeout { .. })
    }
}

/// # Errors that abort a whole process run.
///
/// Worker failures in run-mode executions never surface here: they become
/// `error` statuses and events. Only graph runs propagate a terminal failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The dependency graph of a process contains a cycle; nothing was executed.
    #[error("dependency cycle detected at worker {id:?} ({})", .path.join(" -> "))]
    CycleDetected {
        /// Worker that was revisited while still on the DFS path.
        id: String,
        /// The cycle, starting and ending with `id`.
        path: Vec<String>,
    },

    /// A worker exhausted its attempts during a dependency-graph run.
    #[error("worker {id:?} failed: {error}")]
    WorkerFailed {
        /// Failed worker id.
        id: String,
        /// Error of the last attempt.
        error: TaskError,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::CycleDetected { .. } => "engine_cycle_detected",
            EngineError::WorkerFailed { .. } => "engine_worker_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = EngineError::CycleDetected {
            id: "a".into(),
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle detected at worker \"a\" (a -> b -> a)"
        );
        assert_eq!(err.as_label(), "engine_cycle_detected");
    }

    #[test]
    fn canceled_is_not_retryable() {
        assert!(!TaskError::Canceled.is_retryable());
        assert!(TaskError::Timeout {
            timeout: Duration::from_millis(5)
        }
        .is_retryable());
    }
}
