//! # Backoff policy between retry attempts.
//!
//! [`BackoffPolicy`] maps the 1-based number of the attempt that just failed to the
//! delay before the next one:
//! - [`BackoffPolicy::Fixed`]: the same delay every time;
//! - [`BackoffPolicy::Exponential`]: `base × factor^(attempt-1)`, clamped to `max`, then jittered;
//! - [`BackoffPolicy::Custom`]: any `Fn(attempt) -> Duration`.
//!
//! The exponential base is derived purely from the attempt number, so jitter output
//! never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use flowvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy::Exponential {
//!     base: Duration::from_millis(100),
//!     factor: 2.0,
//!     max: Duration::from_secs(10),
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! // 100ms × 2^10 → capped at max
//! assert_eq!(backoff.delay(11), Duration::from_secs(10));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay strategy invoked by [`BackoffPolicy::Custom`].
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Retry delay policy.
#[derive(Clone)]
pub enum BackoffPolicy {
    /// Constant delay.
    Fixed(Duration),
    /// Geometric growth from `base`, capped at `max`.
    Exponential {
        /// Delay after the first failed attempt.
        base: Duration,
        /// Multiplicative growth factor (`>= 1.0` recommended).
        factor: f64,
        /// Upper bound for the computed delay.
        max: Duration,
        /// Randomization applied after clamping.
        jitter: JitterPolicy,
    },
    /// Caller-provided function of the 1-based attempt number.
    Custom(DelayFn),
}

impl Default for BackoffPolicy {
    /// `Fixed(100ms)`.
    fn default() -> Self {
        BackoffPolicy::Fixed(Duration::from_millis(100))
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffPolicy::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            BackoffPolicy::Exponential {
                base,
                factor,
                max,
                jitter,
            } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("factor", factor)
                .field("max", max)
                .field("jitter", jitter)
                .finish(),
            BackoffPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl BackoffPolicy {
    /// Exponential policy without jitter, capped at 30s.
    pub fn exponential(base: Duration, factor: f64) -> Self {
        BackoffPolicy::Exponential {
            base,
            factor,
            max: Duration::from_secs(30),
            jitter: JitterPolicy::None,
        }
    }

    /// Wraps a delay function.
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        BackoffPolicy::Custom(Arc::new(f))
    }

    /// Computes the delay after the failure of attempt number `attempt` (1-based).
    ///
    /// `attempt = 0` is treated like `1`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Custom(f) => f(attempt.max(1)),
            BackoffPolicy::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = base.as_secs_f64() * factor.powi(exp);
                let clamped = if !secs.is_finite() || secs < 0.0 || secs > max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs)
                };
                jitter.apply(clamped, (*base).min(*max), *max)
            }
        }
    }
}
