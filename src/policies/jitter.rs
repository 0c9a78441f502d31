//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] randomizes exponential backoff delays so that workers failing
//! together do not retry in lock-step.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[floor, delay * 3]`, capped

use rand::Rng;
use std::time::Duration;

/// Randomization strategy applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: predictable delays (tests, single worker).
    #[default]
    None,
    /// Random delay in `[0, delay]`; widest spread.
    Full,
    /// Half of the delay is kept, the other half is randomized.
    Equal,
    /// Random delay in `[floor, delay * 3]`, capped at the policy maximum.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `floor` and `cap` only matter for [`JitterPolicy::Decorrelated`]; the other
    /// variants never exceed `delay`.
    pub fn apply(&self, delay: Duration, floor: Duration, cap: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                if ms == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rand::rng().random_range(0..=ms))
            }
            JitterPolicy::Equal => {
                let half = ms / 2;
                if half == 0 {
                    return delay;
                }
                Duration::from_millis(half + rand::rng().random_range(0..=half))
            }
            JitterPolicy::Decorrelated => {
                let floor_ms = floor.as_millis() as u64;
                let upper = ms.saturating_mul(3).min(cap.as_millis() as u64);
                if floor_ms >= upper {
                    return floor.min(cap);
                }
                Duration::from_millis(rand::rng().random_range(floor_ms..=upper))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: Duration = Duration::from_secs(30);

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(250);
        assert_eq!(JitterPolicy::None.apply(d, Duration::ZERO, CAP), d);
    }

    #[test]
    fn full_stays_below_delay() {
        let d = Duration::from_millis(400);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(d, Duration::ZERO, CAP) <= d);
        }
        assert_eq!(
            JitterPolicy::Full.apply(Duration::ZERO, Duration::ZERO, CAP),
            Duration::ZERO
        );
    }

    #[test]
    fn equal_keeps_half() {
        let d = Duration::from_millis(1000);
        for _ in 0..100 {
            let j = JitterPolicy::Equal.apply(d, Duration::ZERO, CAP);
            assert!(j >= Duration::from_millis(500) && j <= d, "{j:?}");
        }
    }

    #[test]
    fn decorrelated_respects_floor_and_cap() {
        let floor = Duration::from_millis(100);
        let cap = Duration::from_millis(900);
        for _ in 0..100 {
            let j = JitterPolicy::Decorrelated.apply(Duration::from_millis(500), floor, cap);
            assert!(j >= floor && j <= cap, "{j:?}");
        }
    }
}
