//! Retry and timeout policies.
//!
//! ## Contents
//! - [`AttemptPolicy`] timeout + retry count + backoff for one invocation
//! - [`BackoffPolicy`] how the delay between attempts evolves (fixed / exponential / custom)
//! - [`JitterPolicy`]  randomization of exponential delays
//!
//! ## Quick wiring
//! ```text
//! Worker { policy: AttemptPolicy { timeout, max_retries, backoff } }
//!      └─► core::Supervisor uses:
//!           - timeout to race each attempt
//!           - attempts() to bound the loop
//!           - backoff.delay(attempt) between attempts
//! ```

mod attempt;
mod backoff;
mod jitter;

pub use attempt::{AttemptPolicy, DEFAULT_TIMEOUT};
pub use backoff::{BackoffPolicy, DelayFn};
pub use jitter::JitterPolicy;
